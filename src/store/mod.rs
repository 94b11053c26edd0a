pub mod coin_store;
pub mod forest;
pub mod row_file;

pub use coin_store::{CoinRow, CoinStore, StoreTxn};
pub use forest::RowForest;
pub use row_file::{FlatFileStore, Row, RowStorage, ROW_SIZE};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),

    #[error("corrupt row file {path}: {size} bytes is not a whole number of records")]
    CorruptFile { path: PathBuf, size: u64 },

    #[error("row {index} out of range: file holds {count} rows")]
    RowOutOfRange { index: u64, count: u64 },

    #[error("row count mismatch after {op}: expected {expected}, found {found}")]
    CountMismatch {
        op: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("corrupt record: {0}")]
    Corrupt(&'static str),
}
