// Data Structures: Block
use super::coin::{Coin, Hash32};

/// Everything a block contributes to the coin set: the coins it spends
/// (referenced by name) and the coins it confirms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpendInfo {
    pub index: u64,
    pub timestamp: u64,
    pub spends: Vec<Hash32>,
    pub confirms: Vec<Coin>,
}
