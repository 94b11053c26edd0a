/// Flush the ingest buffer once this many confirms are pending
pub const DEFAULT_CACHE_SIZE: u64 = 50_000;

/// Merge the two smallest row files once the forest holds this many files
pub const DEFAULT_MERGE_THRESHOLD: usize = 10;

/// Row-file name prefix; files match `hashdb-[0-9]{6}.db`
pub const HASHDB_PREFIX: &str = "hashdb-";

/// Subdirectory of a store root holding the RocksDB coin/block rows
pub const COIN_STORE_DIR: &str = "coin_store";

#[derive(Debug, Clone, Copy)]
pub struct DbConfig {
    pub cache_size: u64,
    pub merge_threshold: usize,
}

impl DbConfig {
    /// Defaults, with `COINDB_CACHE_SIZE` / `COINDB_MERGE_THRESHOLD`
    /// environment overrides applied when set and parseable.
    pub fn from_env() -> Self {
        DbConfig {
            cache_size: env_u64("COINDB_CACHE_SIZE").unwrap_or(DEFAULT_CACHE_SIZE),
            merge_threshold: env_u64("COINDB_MERGE_THRESHOLD")
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_MERGE_THRESHOLD),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            cache_size: DEFAULT_CACHE_SIZE,
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let v = std::env::var(key).ok()?;
    let v = v.trim();
    if v.is_empty() {
        return None;
    }
    v.parse().ok()
}
