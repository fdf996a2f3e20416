pub mod blockchain;

pub use blockchain::{Block, Chain};
