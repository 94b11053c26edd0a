// Data Structures: Coin
use crate::crypto::hash::hash_sha256_concat3;

pub const HASH_BYTES: usize = 32;

/// A coin name, puzzle hash or any other 32-byte digest
pub type Hash32 = [u8; HASH_BYTES];

/// An unspent-output-like record. Its identity (the coin name) is derived
/// from the three fields, so two coins with equal fields are the same coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coin {
    pub parent_coin_name: Hash32,
    pub puzzle_hash: Hash32,
    pub amount: u64,
}

impl Coin {
    /// The coin name: SHA-256(parent ‖ puzzle ‖ compact amount)
    pub fn name(&self) -> Hash32 {
        hash_sha256_concat3(
            &self.parent_coin_name,
            &self.puzzle_hash,
            &compact_amount(self.amount),
        )
    }
}

/// A coin plus the block indices bounding its lifetime.
/// `spent_index` is 0 while the coin is unspent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinInfo {
    pub coin: Coin,
    pub confirmed_index: u64,
    pub spent_index: u64,
}

/// Canonical variable-length amount encoding used inside the coin name
/// preimage:
///   0          → empty
///   1..=127    → one byte
///   otherwise  → minimal signed big-endian, 1 + bit_length/8 bytes
pub fn compact_amount(v: u64) -> Vec<u8> {
    if v == 0 {
        return Vec::new();
    }
    if v < 128 {
        return vec![v as u8];
    }
    let bit_length = 64 - v.leading_zeros() as usize;
    let size = 1 + bit_length / 8;
    // 9-byte staging buffer covers the size == 9 case (top bit of v set)
    let mut buf = [0u8; 9];
    buf[1..].copy_from_slice(&v.to_be_bytes());
    buf[9 - size..].to_vec()
}
