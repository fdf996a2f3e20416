pub mod block;
pub mod model;

pub use block::Block;
pub use model::Chain;

/// Difficulty every new chain starts at.
pub const INITIAL_DIFFICULTY: u32 = 1;

/// Target seconds per block for difficulty retargeting.
pub const TARGET_BLOCK_TIME_SECS: f64 = 30.0;

/// Current wall-clock time as fractional seconds since the Unix epoch.
///
/// Captured at every call site that needs "now"; a timestamp is never
/// reused across constructions.
pub fn unix_time_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
