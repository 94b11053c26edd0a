// RocksDB-backed coin/block row store
//
// Column Families:
//   "coin"   : id[8] BE      → parent[8] BE signed ‖ puzzle[32] ‖ amount[8] ‖ confirmed[8] BE ‖ spent[8] BE
//   "block"  : index[8] BE   → timestamp[8] BE ‖ spend_count[4] BE ‖ spend ids ‖ confirm ids (8-byte BE signed each)
//   "names"  : id[8] BE      → coin name[32]
//   "meta"   : "coin_count"  → u64 BE
//
// Coin ids are dense and 1-based. All writes of one flush are staged into a
// single WriteBatch and committed with sync, so a crash mid-flush leaves the
// row store exactly as it was before the flush began.

use std::collections::BTreeMap;
use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch, WriteOptions};

use super::row_file::Row;
use super::StoreError;
use crate::primitives::Hash32;

const CF_COIN: &str = "coin";
const CF_BLOCK: &str = "block";
const CF_NAMES: &str = "names";
const CF_META: &str = "meta";

const KEY_COIN_COUNT: &[u8] = b"coin_count";

const COIN_ROW_BYTES: usize = 64;

/// One persisted coin. `parent` is signed: positive values reference
/// another coin row, non-positive values fold a coinbase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinRow {
    pub parent: i64,
    pub puzzle: Hash32,
    pub amount: [u8; 8],
    pub confirmed: u64,
    pub spent: u64,
}

impl CoinRow {
    fn to_bytes(&self) -> [u8; COIN_ROW_BYTES] {
        let mut b = [0u8; COIN_ROW_BYTES];
        b[..8].copy_from_slice(&self.parent.to_be_bytes());
        b[8..40].copy_from_slice(&self.puzzle);
        b[40..48].copy_from_slice(&self.amount);
        b[48..56].copy_from_slice(&self.confirmed.to_be_bytes());
        b[56..64].copy_from_slice(&self.spent.to_be_bytes());
        b
    }

    fn from_bytes(d: &[u8]) -> Result<Self, StoreError> {
        if d.len() != COIN_ROW_BYTES {
            return Err(StoreError::Corrupt("coin row has wrong length"));
        }
        let mut puzzle = [0u8; 32];
        puzzle.copy_from_slice(&d[8..40]);
        let mut amount = [0u8; 8];
        amount.copy_from_slice(&d[40..48]);
        Ok(CoinRow {
            parent: i64::from_be_bytes(d[..8].try_into().unwrap()),
            puzzle,
            amount,
            confirmed: u64::from_be_bytes(d[48..56].try_into().unwrap()),
            spent: u64::from_be_bytes(d[56..64].try_into().unwrap()),
        })
    }
}

/// One persisted block: timestamp plus the signed coin ids it spends and
/// confirms, in the order the ingest pipeline resolved them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub timestamp: u64,
    pub spend_ids: Vec<i64>,
    pub confirm_ids: Vec<i64>,
}

impl BlockRow {
    fn to_bytes(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(12 + 8 * (self.spend_ids.len() + self.confirm_ids.len()));
        b.extend_from_slice(&self.timestamp.to_be_bytes());
        b.extend_from_slice(&(self.spend_ids.len() as u32).to_be_bytes());
        b.extend_from_slice(&ids_to_bytes(&self.spend_ids));
        b.extend_from_slice(&ids_to_bytes(&self.confirm_ids));
        b
    }

    fn from_bytes(d: &[u8]) -> Result<Self, StoreError> {
        if d.len() < 12 || (d.len() - 12) % 8 != 0 {
            return Err(StoreError::Corrupt("block row has wrong length"));
        }
        let timestamp = u64::from_be_bytes(d[..8].try_into().unwrap());
        let spend_count = u32::from_be_bytes(d[8..12].try_into().unwrap()) as usize;
        let ids = ids_from_bytes(&d[12..]);
        if spend_count > ids.len() {
            return Err(StoreError::Corrupt("block row spend count exceeds id blob"));
        }
        let confirm_ids = ids[spend_count..].to_vec();
        let mut spend_ids = ids;
        spend_ids.truncate(spend_count);
        Ok(BlockRow {
            timestamp,
            spend_ids,
            confirm_ids,
        })
    }
}

/// Concatenated 8-byte big-endian signed ids
pub fn ids_to_bytes(ids: &[i64]) -> Vec<u8> {
    let mut b = Vec::with_capacity(ids.len() * 8);
    for id in ids {
        b.extend_from_slice(&id.to_be_bytes());
    }
    b
}

/// Inverse of `ids_to_bytes`; the caller guarantees `b.len() % 8 == 0`
pub fn ids_from_bytes(b: &[u8]) -> Vec<i64> {
    b.chunks_exact(8)
        .map(|c| i64::from_be_bytes(c.try_into().unwrap()))
        .collect()
}

pub struct CoinStore {
    db: DB,
    coin_count: u64,
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a rocksdb::ColumnFamily, StoreError> {
    db.cf_handle(name)
        .ok_or(StoreError::Corrupt("column family not found"))
}

impl CoinStore {
    /// Open or create the row store. Write-heavy bulk ingest settings:
    /// large memtables, LZ4 for the on-disk levels.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(3);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_COIN, opts.clone()),
            ColumnFamilyDescriptor::new(CF_BLOCK, opts.clone()),
            ColumnFamilyDescriptor::new(CF_NAMES, opts.clone()),
            ColumnFamilyDescriptor::new(CF_META, opts.clone()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        let coin_count = match db.get_cf(cf(&db, CF_META)?, KEY_COIN_COUNT)? {
            Some(d) if d.len() == 8 => u64::from_be_bytes(d[..8].try_into().unwrap()),
            Some(_) => return Err(StoreError::Corrupt("coin count has wrong length")),
            None => 0,
        };
        Ok(CoinStore { db, coin_count })
    }

    /// Number of coin rows ever inserted; also the highest assigned id
    pub fn coin_count(&self) -> u64 {
        self.coin_count
    }

    pub fn coin_row(&self, id: u64) -> Result<Option<CoinRow>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_COIN)?, id.to_be_bytes())? {
            Some(d) => Ok(Some(CoinRow::from_bytes(&d)?)),
            None => Ok(None),
        }
    }

    pub fn coin_name(&self, id: u64) -> Result<Option<Hash32>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_NAMES)?, id.to_be_bytes())? {
            Some(d) => {
                if d.len() != 32 {
                    return Err(StoreError::Corrupt("coin name has wrong length"));
                }
                let mut name = [0u8; 32];
                name.copy_from_slice(&d);
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    pub fn block_row(&self, index: u64) -> Result<Option<BlockRow>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_BLOCK)?, index.to_be_bytes())? {
            Some(d) => Ok(Some(BlockRow::from_bytes(&d)?)),
            None => Ok(None),
        }
    }

    /// Highest block index on disk, if any
    pub fn last_block_index(&self) -> Result<Option<u64>, StoreError> {
        let mut iter = self.db.iterator_cf(cf(&self.db, CF_BLOCK)?, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                Ok(Some(decode_index_key(&key)?))
            }
            None => Ok(None),
        }
    }

    /// Lazy scan of all block rows in ascending index order
    pub fn block_rows(&self) -> Result<BlockRows<'_>, StoreError> {
        Ok(BlockRows {
            inner: self.db.iterator_cf(cf(&self.db, CF_BLOCK)?, IteratorMode::Start),
        })
    }

    /// Start a transaction covering one flush. Nothing touches disk until
    /// `commit`; dropping the transaction discards it.
    pub fn begin(&mut self) -> StoreTxn<'_> {
        let next_id = self.coin_count;
        StoreTxn {
            store: self,
            batch: WriteBatch::default(),
            staged: BTreeMap::new(),
            next_id,
        }
    }
}

fn decode_index_key(key: &[u8]) -> Result<u64, StoreError> {
    if key.len() != 8 {
        return Err(StoreError::Corrupt("block key has wrong length"));
    }
    Ok(u64::from_be_bytes(key.try_into().unwrap()))
}

pub struct BlockRows<'a> {
    inner: rocksdb::DBIteratorWithThreadMode<'a, DB>,
}

impl Iterator for BlockRows<'_> {
    type Item = Result<(u64, BlockRow), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(item.map_err(StoreError::from).and_then(|(key, value)| {
            Ok((decode_index_key(&key)?, BlockRow::from_bytes(&value)?))
        }))
    }
}

/// One flush worth of writes. Coin rows stay staged in memory so a spend
/// landing in the same flush as its confirm can still update the row; the
/// whole batch reaches RocksDB only at commit.
pub struct StoreTxn<'a> {
    store: &'a mut CoinStore,
    batch: WriteBatch,
    staged: BTreeMap<u64, CoinRow>,
    next_id: u64,
}

impl StoreTxn<'_> {
    /// Insert a coin row, returning its dense 1-based id
    pub fn insert_coin(&mut self, parent: i64, puzzle: Hash32, amount: [u8; 8], confirmed: u64) -> u64 {
        self.next_id += 1;
        self.staged.insert(
            self.next_id,
            CoinRow {
                parent,
                puzzle,
                amount,
                confirmed,
                spent: 0,
            },
        );
        self.next_id
    }

    /// Mark a coin spent. The row may have been inserted in this
    /// transaction or in any earlier committed one.
    pub fn set_spent(&mut self, id: u64, spent: u64) -> Result<(), StoreError> {
        if let Some(row) = self.staged.get_mut(&id) {
            row.spent = spent;
            return Ok(());
        }
        let mut row = self
            .store
            .coin_row(id)?
            .ok_or(StoreError::Corrupt("spent update references unknown coin id"))?;
        row.spent = spent;
        self.staged.insert(id, row);
        Ok(())
    }

    pub fn insert_block(
        &mut self,
        index: u64,
        timestamp: u64,
        spend_ids: &[i64],
        confirm_ids: &[i64],
    ) -> Result<(), StoreError> {
        let row = BlockRow {
            timestamp,
            spend_ids: spend_ids.to_vec(),
            confirm_ids: confirm_ids.to_vec(),
        };
        let handle = cf(&self.store.db, CF_BLOCK)?;
        self.batch.put_cf(handle, index.to_be_bytes(), row.to_bytes());
        Ok(())
    }

    /// Record the id → name reverse mapping for this flush's new coins
    pub fn record_coin_names(&mut self, rows: &[Row]) -> Result<(), StoreError> {
        let handle = cf(&self.store.db, CF_NAMES)?;
        for row in rows {
            self.batch.put_cf(handle, row.id.to_be_bytes(), row.hash);
        }
        Ok(())
    }

    /// Serialize staged rows and the id counter into the batch and write
    /// it atomically with sync
    pub fn commit(mut self) -> Result<(), StoreError> {
        let cf_coin = cf(&self.store.db, CF_COIN)?;
        for (id, row) in &self.staged {
            self.batch.put_cf(cf_coin, id.to_be_bytes(), row.to_bytes());
        }
        let cf_meta = cf(&self.store.db, CF_META)?;
        self.batch.put_cf(cf_meta, KEY_COIN_COUNT, self.next_id.to_be_bytes());

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.store.db.write_opt(self.batch, &write_opts)?;
        self.store.coin_count = self.next_id;
        Ok(())
    }
}
