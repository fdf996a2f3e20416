use std::fmt;
use std::ops::Index;

use serde::Serialize;
use serde_json::Value;

use super::{Block, INITIAL_DIFFICULTY, TARGET_BLOCK_TIME_SECS, unix_time_now};

/// Append-only in-memory ledger with Proof-of-Work.
///
/// Index 0 is always the genesis block. Blocks are owned exclusively by
/// their chain position and only shared references are handed out, so an
/// accepted block can never be mutated again through the public API.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
    target_block_time: f64,
}

impl Chain {
    /// Initialize a chain with an unmined genesis block and the default
    /// target block time.
    pub fn new() -> Self {
        Self::with_target_block_time(TARGET_BLOCK_TIME_SECS)
    }

    /// Initialize a chain with an explicit target block time in seconds.
    pub fn with_target_block_time(target_block_time: f64) -> Self {
        log::debug!("creating chain (target block time: {target_block_time}s)");
        Self {
            blocks: vec![Block::new(None, None)],
            difficulty: INITIAL_DIFFICULTY,
            target_block_time,
        }
    }

    /// Mine and append a new block holding `data`, timestamped now.
    pub fn append(&mut self, data: Option<Value>) {
        self.append_at(data, unix_time_now());
    }

    /// Mine and append a new block holding `data` with an explicit
    /// timestamp.
    ///
    /// Reading the tail's hash here seals the tail: once a block has a
    /// successor its fields never change again. After the block is
    /// attached, difficulty is retargeted from the wall-clock time the
    /// mining call took (not from the block's own timestamp, which the
    /// caller controls and may backdate).
    pub fn append_at(&mut self, data: Option<Value>, timestamp: f64) {
        let previous_hash = self.tail().hash().to_owned();
        let mut block = Block::with_timestamp(data, Some(previous_hash), timestamp);

        let started = unix_time_now();
        block.mine(self.difficulty);
        let elapsed = unix_time_now() - started;

        self.blocks.push(block);
        self.difficulty = next_difficulty(self.difficulty, elapsed, self.target_block_time);
        log::debug!("appended block {}; difficulty now {}", self.blocks.len() - 1, self.difficulty);
    }

    /// Validate linkage across the whole chain: every block's
    /// `previous_hash` must equal its predecessor's hash. Total predicate,
    /// trivially true for a single block; does not re-verify Proof-of-Work.
    pub fn is_valid(&self) -> bool {
        self.blocks
            .windows(2)
            .all(|pair| pair[1].previous_hash() == Some(pair[0].hash()))
    }

    /// The most recently appended block.
    pub fn tail(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always holds at least the genesis block")
    }

    /// Positional lookup; a negative index counts from the end, so `-1` is
    /// the tail. `None` when out of range either way.
    pub fn block(&self, index: isize) -> Option<&Block> {
        let resolved = if index < 0 {
            self.blocks.len().checked_sub(index.unsigned_abs())?
        } else {
            index as usize
        };
        self.blocks.get(resolved)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: the genesis block is constructed with the chain.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn target_block_time(&self) -> f64 {
        self.target_block_time
    }

    /// Blocks in chain order, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    #[cfg(test)]
    pub(crate) fn corrupt_previous_hash(&mut self, index: usize, previous_hash: &str) {
        self.blocks[index].set_previous_hash(Some(previous_hash.to_owned()));
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

/// Retargeting rule applied after every append: finishing under the target
/// raises difficulty by one, anything else lowers it by one, clamped at
/// zero so the chain never reaches an always-valid difficulty below it.
pub fn next_difficulty(current: u32, elapsed_secs: f64, target_secs: f64) -> u32 {
    if elapsed_secs < target_secs {
        current + 1
    } else {
        current.saturating_sub(1)
    }
}

impl Index<usize> for Chain {
    type Output = Block;

    fn index(&self, index: usize) -> &Block {
        &self.blocks[index]
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One block's diagnostic view, in the field order the rendering promises.
#[derive(Serialize)]
struct BlockRecord<'a> {
    data: Option<&'a Value>,
    timestamp: f64,
    nonce: u64,
    hash: &'a str,
    previous_hash: Option<&'a str>,
}

/// Pretty JSON rendering of the whole chain, oldest block first. For
/// inspection and tests only.
impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let records: Vec<BlockRecord> = self
            .iter()
            .map(|block| BlockRecord {
                data: block.data(),
                timestamp: block.timestamp(),
                nonce: block.nonce(),
                hash: block.hash(),
                previous_hash: block.previous_hash(),
            })
            .collect();
        let rendered = serde_json::to_string_pretty(&records).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}
