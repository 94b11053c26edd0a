// Cryptographic Hashing Wrappers
use sha2::{Digest, Sha256};

/// SHA-256: Used for coin name derivation
pub fn hash_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 Concat: Hashes a, b, then c without allocating a temporary Vec
pub fn hash_sha256_concat3(a: &[u8], b: &[u8], c: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.update(c);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_length() {
        let hash = hash_sha256(b"coindb");
        assert_eq!(hash.len(), 32);
    }

    #[test]
    fn test_concat3_matches_single_buffer() {
        let joined = hash_sha256(b"abcdef");
        let parts = hash_sha256_concat3(b"ab", b"cd", b"ef");
        assert_eq!(joined, parts);
    }
}
