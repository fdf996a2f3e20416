use std::cell::OnceCell;

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::unix_time_now;

/// Sentinel written into the hash preimage wherever a field is absent.
pub const ABSENT: &str = "null";

/// A single block in the ledger: an opaque payload, a link to the
/// predecessor's hash, and a Proof-of-Work nonce.
///
/// The hash is computed lazily and cached; every mutation of a hash input
/// clears the cache first, so a stale hash can never be observed. Once a
/// block has been appended to a chain the chain only hands out shared
/// references, which seals it against further mutation.
#[derive(Debug, Clone)]
pub struct Block {
    timestamp: f64, // Unix timestamp, fractional seconds (UTC)
    data: Option<Value>,
    previous_hash: Option<String>,
    nonce: u64,
    cached_hash: OnceCell<String>,
}

impl Block {
    /// Create a new block, capturing the current time as its timestamp.
    /// Call `mine()` to perform PoW.
    pub fn new(data: Option<Value>, previous_hash: Option<String>) -> Self {
        Self::with_timestamp(data, previous_hash, unix_time_now())
    }

    /// Create a new block with an explicit timestamp. The payload is opaque:
    /// any JSON shape (or none) is accepted and only ever hashed.
    pub fn with_timestamp(
        data: Option<Value>,
        previous_hash: Option<String>,
        timestamp: f64,
    ) -> Self {
        log::debug!("creating block (previous_hash: {:?})", previous_hash);
        Self {
            timestamp,
            data,
            previous_hash,
            nonce: 0,
            cached_hash: OnceCell::new(),
        }
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The SHA-256 hash of this block as lowercase hex, computed on first
    /// read and cached until a hash input changes.
    pub fn hash(&self) -> &str {
        self.cached_hash.get_or_init(|| self.compute_hash())
    }

    /// Compute the hash from scratch: the textual representations of
    /// `previous_hash`, `timestamp`, `data` and `nonce` are concatenated in
    /// that order, with no separators, and digested as UTF-8. Absent fields
    /// contribute the fixed sentinel [`ABSENT`]; payloads contribute their
    /// compact JSON encoding (key order is stable, so equal payloads hash
    /// equally across instances).
    fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.previous_hash.as_deref().unwrap_or(ABSENT));
        hasher.update(self.timestamp.to_string());
        match &self.data {
            Some(data) => hasher.update(data.to_string()),
            None => hasher.update(ABSENT),
        }
        hasher.update(self.nonce.to_string());
        hex::encode(hasher.finalize())
    }

    /// Drop the cached hash so the next read recomputes it. Must be called
    /// whenever `previous_hash`, `timestamp`, `data` or `nonce` changes.
    fn invalidate(&mut self) {
        self.cached_hash = OnceCell::new();
    }

    /// Perform Proof-of-Work: increment the nonce until the hash starts
    /// with `difficulty` leading zeros (in hex).
    ///
    /// A difficulty of 0 is satisfied by any hash, so the nonce is left
    /// untouched. Blocking loop with no internal yield; expected to take
    /// around 16^difficulty iterations.
    pub fn mine(&mut self, difficulty: u32) {
        log::debug!("mining at difficulty {difficulty}...");
        let target_prefix = "0".repeat(difficulty as usize);
        while !self.hash().starts_with(&target_prefix) {
            self.nonce += 1;
            self.invalidate();
        }
        log::debug!("mined: nonce={} hash={}", self.nonce, self.hash());
    }

    /// Overwrite the predecessor link. Breaks the sealed-block convention,
    /// which is exactly its purpose: chain tests use it to simulate
    /// tampering that `Chain::is_valid` must detect.
    pub(crate) fn set_previous_hash(&mut self, previous_hash: Option<String>) {
        self.previous_hash = previous_hash;
        self.invalidate();
    }
}

/// Equality over block contents; whether the hash happens to be cached is
/// not observable state.
impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.data == other.data
            && self.previous_hash == other.previous_hash
            && self.nonce == other.nonce
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Block;

    #[test]
    fn hash_is_deterministic_across_reads_and_instances() {
        let a = Block::with_timestamp(Some(json!({"k": 1})), Some("prev".into()), 42.5);
        let b = Block::with_timestamp(Some(json!({"k": 1})), Some("prev".into()), 42.5);
        let first = a.hash().to_owned();
        assert_eq!(first, a.hash());
        assert_eq!(first, b.hash());
        assert_eq!(first.len(), 64);
        assert_eq!(first, first.to_lowercase());
    }

    #[test]
    fn absent_fields_hash_differently_from_present_ones() {
        let empty = Block::with_timestamp(None, None, 1.0);
        let with_data = Block::with_timestamp(Some(json!({})), None, 1.0);
        let with_prev = Block::with_timestamp(None, Some("00".into()), 1.0);
        assert_ne!(empty.hash(), with_data.hash());
        assert_ne!(empty.hash(), with_prev.hash());
    }

    #[test]
    fn mining_produces_leading_zeros() {
        let mut b = Block::with_timestamp(Some(json!({"n": 7})), Some("prev".into()), 100.0);
        b.mine(2);
        assert!(b.hash().starts_with("00"));
    }

    #[test]
    fn zero_difficulty_mines_without_iterating() {
        let mut b = Block::with_timestamp(None, None, 100.0);
        b.mine(0);
        assert_eq!(b.nonce(), 0);
    }

    #[test]
    fn hash_is_never_stale_after_mutation() {
        let mut b = Block::with_timestamp(Some(json!({"n": 1})), Some("prev".into()), 100.0);
        let before = b.hash().to_owned();
        b.mine(1);
        // Whatever mining did to the nonce, the cached hash tracks it.
        assert_eq!(b.hash(), b.compute_hash());
        if b.nonce() > 0 {
            assert_ne!(before, b.hash());
        }

        let mined = b.hash().to_owned();
        b.set_previous_hash(Some("other".into()));
        assert_ne!(mined, b.hash());
        assert_eq!(b.hash(), b.compute_hash());
    }

    #[test]
    fn equality_ignores_cache_state() {
        let a = Block::with_timestamp(Some(json!({"k": 1})), None, 5.0);
        let b = a.clone();
        let _ = a.hash(); // cache filled on one side only
        assert_eq!(a, b);
    }
}
