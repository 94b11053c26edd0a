// Ingest pipeline
//
// CoinDb buffers incoming blocks in memory and drains them in one atomic
// flush: coin rows and block rows go to the RocksDB side-store inside a
// single transaction, and the flush's (name → id) map is appended to the
// row-file forest as the last step before commit.
//
// Parent and spend references resolve through three tiers, cheapest
// first: coinbase folding, the current flush's unflushed map, then the
// forest. A reference that survives all three is a hard error.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::config::{COIN_STORE_DIR, DbConfig, HASHDB_PREFIX};
use crate::primitives::coinbase;
use crate::primitives::{BlockSpendInfo, Coin, CoinInfo, Hash32};
use crate::store::coin_store::BlockRow;
use crate::store::{CoinStore, FlatFileStore, Row, RowForest, RowStorage, StoreError, StoreTxn};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("block {block}: parent {parent} is neither coinbase, in-block, nor indexed")]
    DanglingParent { block: u64, parent: String },

    #[error("block {block}: spend {spend} does not name any known coin")]
    UnknownSpend { block: u64, spend: String },

    #[error("block {0}: dependency cycle among its confirms")]
    Cycle(u64),

    #[error("block {got} arrived after block {last}; indices must be strictly increasing")]
    OutOfOrder { last: u64, got: u64 },

    #[error("rewind is declared but not implemented")]
    RewindUnsupported,

    #[error("name index and coin rows disagree ({forest_rows} indexed names, {coin_rows} coin rows); the store needs a rebuild")]
    StateMismatch { forest_rows: u64, coin_rows: u64 },

    #[error("store spec {0:?} is not of the form tag:path")]
    BadStoreSpec(String),

    #[error("unknown storage tag {0:?} (known: flatfile)")]
    UnknownStorageTag(String),

    #[error("corrupt store: {0}")]
    Corrupt(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CoinDb<S: RowStorage> {
    forest: RowForest<S>,
    store: CoinStore,
    pending_blocks: Vec<BlockSpendInfo>,
    pending_coin_count: u64,
    cache_size: u64,
    last_block_index: u64,
}

impl<S: RowStorage> std::fmt::Debug for CoinDb<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinDb")
            .field("pending_blocks", &self.pending_blocks.len())
            .field("pending_coin_count", &self.pending_coin_count)
            .field("cache_size", &self.cache_size)
            .field("last_block_index", &self.last_block_index)
            .finish()
    }
}

impl<S: RowStorage> CoinDb<S> {
    /// Open (or create) a store rooted at `path`: the row-file forest in
    /// the directory itself, the coin/block rows in a subdirectory. A
    /// crash between forest append and row commit leaves the two out of
    /// step; that is detected here and reported as `StateMismatch`.
    pub fn open(path: &Path, config: DbConfig) -> Result<Self, DbError> {
        std::fs::create_dir_all(path).map_err(StoreError::from)?;
        let forest = RowForest::open(path, HASHDB_PREFIX, config.merge_threshold)?;
        let store = CoinStore::open(&path.join(COIN_STORE_DIR))?;
        if forest.row_count() != store.coin_count() {
            return Err(DbError::StateMismatch {
                forest_rows: forest.row_count(),
                coin_rows: store.coin_count(),
            });
        }
        let last_block_index = store.last_block_index()?.unwrap_or(0);
        Ok(CoinDb {
            forest,
            store,
            pending_blocks: Vec::new(),
            pending_coin_count: 0,
            cache_size: config.cache_size,
            last_block_index,
        })
    }

    /// Number of coin rows ever persisted
    pub fn coin_count(&self) -> u64 {
        self.store.coin_count()
    }

    /// Number of (name, id) rows in the forest
    pub fn indexed_row_count(&self) -> u64 {
        self.forest.row_count()
    }

    /// Buffer one block, flushing when the pending confirm count tops the
    /// configured cache size
    pub fn accept_block(&mut self, block: BlockSpendInfo) -> Result<(), DbError> {
        let last = self
            .pending_blocks
            .last()
            .map(|b| b.index)
            .unwrap_or(self.last_block_index);
        if block.index <= last {
            return Err(DbError::OutOfOrder {
                last,
                got: block.index,
            });
        }
        self.pending_coin_count += block.confirms.len() as u64;
        self.pending_blocks.push(block);
        if self.pending_coin_count > self.cache_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Drain the buffer in one transaction. On any error nothing is
    /// committed; the in-progress batch is discarded.
    pub fn flush(&mut self) -> Result<(), DbError> {
        if self.pending_blocks.is_empty() {
            return Ok(());
        }
        let mut unflushed: HashMap<Hash32, u64> = HashMap::new();
        let mut txn = self.store.begin();
        for block in &self.pending_blocks {
            store_block(&self.forest, &mut txn, block, &mut unflushed)?;
        }
        if !unflushed.is_empty() {
            let rows: Vec<Row> = unflushed
                .iter()
                .map(|(&hash, &id)| Row { hash, id })
                .collect();
            txn.record_coin_names(&rows)?;
            self.forest.add_rows(rows)?;
        }
        txn.commit()?;
        if let Some(block) = self.pending_blocks.last() {
            self.last_block_index = block.index;
        }
        self.pending_blocks.clear();
        self.pending_coin_count = 0;
        Ok(())
    }

    /// Reserved; requirements do not exist yet
    pub fn rewind_to_block_index(&mut self, _block_index: u64) -> Result<(), DbError> {
        Err(DbError::RewindUnsupported)
    }

    /// Lazy scan of every stored block in ascending index order, with
    /// spend names and confirm coins reconstructed from their ids.
    /// Reflects flushed state only.
    pub fn blocks(&self) -> Result<impl Iterator<Item = Result<BlockSpendInfo, DbError>> + '_, DbError> {
        let rows = self.store.block_rows()?;
        Ok(rows.map(move |item| {
            let (index, row) = item?;
            self.block_from_row(index, row)
        }))
    }

    /// One stored block, or None when the index is unknown
    pub fn block_info_for_index(&self, index: u64) -> Result<Option<BlockSpendInfo>, DbError> {
        match self.store.block_row(index)? {
            Some(row) => Ok(Some(self.block_from_row(index, row)?)),
            None => Ok(None),
        }
    }

    /// Per-name coin metadata; None for names the index does not hold.
    /// Reflects flushed state only.
    pub fn coin_infos_for_names(&self, names: &[Hash32]) -> Result<Vec<Option<CoinInfo>>, DbError> {
        let (found, _missing) = self.forest.find_hashes(names)?;
        let id_by_name: HashMap<Hash32, u64> = found.into_iter().map(|r| (r.hash, r.id)).collect();
        names
            .iter()
            .map(|name| {
                let Some(&id) = id_by_name.get(name) else {
                    return Ok(None);
                };
                let Some(row) = self.store.coin_row(id)? else {
                    return Err(DbError::Corrupt("indexed coin id has no coin row"));
                };
                Ok(Some(CoinInfo {
                    coin: Coin {
                        parent_coin_name: self.name_for_id(row.parent)?,
                        puzzle_hash: row.puzzle,
                        amount: u64::from_be_bytes(row.amount),
                    },
                    confirmed_index: row.confirmed,
                    spent_index: row.spent,
                }))
            })
            .collect()
    }

    fn block_from_row(&self, index: u64, row: BlockRow) -> Result<BlockSpendInfo, DbError> {
        let spends = row
            .spend_ids
            .iter()
            .map(|&id| self.name_for_id(id))
            .collect::<Result<Vec<_>, _>>()?;
        let confirms = row
            .confirm_ids
            .iter()
            .map(|&id| self.coin_for_id(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BlockSpendInfo {
            index,
            timestamp: row.timestamp,
            spends,
            confirms,
        })
    }

    fn name_for_id(&self, id: i64) -> Result<Hash32, DbError> {
        if id <= 0 {
            coinbase::name_for_coinbase_index(id)
                .ok_or(DbError::Corrupt("non-positive id does not decode to a coinbase name"))
        } else {
            self.store
                .coin_name(id as u64)?
                .ok_or(DbError::Corrupt("coin id has no recorded name"))
        }
    }

    fn coin_for_id(&self, id: i64) -> Result<Coin, DbError> {
        if id <= 0 {
            return Err(DbError::Corrupt("confirm id is not positive"));
        }
        let row = self
            .store
            .coin_row(id as u64)?
            .ok_or(DbError::Corrupt("confirm id has no coin row"))?;
        Ok(Coin {
            parent_coin_name: self.name_for_id(row.parent)?,
            puzzle_hash: row.puzzle,
            amount: u64::from_be_bytes(row.amount),
        })
    }
}

/// Open a store from a `tag:path` spec, e.g. `flatfile:./replay_db`.
/// Tags pick the row-file backing; only the flat-file variant ships.
pub fn open_with_tag(spec: &str) -> Result<CoinDb<FlatFileStore>, DbError> {
    let Some((tag, path)) = spec.split_once(':') else {
        return Err(DbError::BadStoreSpec(spec.to_string()));
    };
    match tag {
        "flatfile" => CoinDb::open(Path::new(path), DbConfig::from_env()),
        _ => Err(DbError::UnknownStorageTag(tag.to_string())),
    }
}

/// Write one block's coins, spends and block row into the transaction,
/// extending `unflushed` with the flush-wide (name → id) map.
fn store_block<S: RowStorage>(
    forest: &RowForest<S>,
    txn: &mut StoreTxn<'_>,
    block: &BlockSpendInfo,
    unflushed: &mut HashMap<Hash32, u64>,
) -> Result<(), DbError> {
    // Confirms deduplicated by name; a coin's identity is its name, so a
    // repeated confirm is the same coin.
    let mut confirms: Vec<&Coin> = Vec::with_capacity(block.confirms.len());
    let mut names: Vec<Hash32> = Vec::with_capacity(block.confirms.len());
    let mut in_block: HashSet<Hash32> = HashSet::with_capacity(block.confirms.len());
    for coin in &block.confirms {
        let name = coin.name();
        if !in_block.insert(name) {
            continue;
        }
        confirms.push(coin);
        names.push(name);
    }

    // Parent resolution tiers 1 and 2; the rest go to the forest in one
    // batch. Whatever the forest cannot find must be an in-block parent.
    let mut parent_ids: HashMap<Hash32, i64> = HashMap::new();
    let mut needs_lookup: HashSet<Hash32> = HashSet::new();
    for coin in &confirms {
        let parent = coin.parent_coin_name;
        if parent_ids.contains_key(&parent) {
            continue;
        }
        if let Some(v) = coinbase::as_coinbase_index(&parent) {
            parent_ids.insert(parent, v);
        } else if let Some(&id) = unflushed.get(&parent) {
            parent_ids.insert(parent, id as i64);
        } else {
            needs_lookup.insert(parent);
        }
    }
    let query: Vec<Hash32> = needs_lookup.into_iter().collect();
    let (found, missing) = forest.find_hashes(&query)?;
    for row in found {
        parent_ids.insert(row.hash, row.id as i64);
    }
    for name in missing {
        if !in_block.contains(&name) {
            return Err(DbError::DanglingParent {
                block: block.index,
                parent: hex::encode(name),
            });
        }
    }

    let parent_names: Vec<Hash32> = confirms.iter().map(|c| c.parent_coin_name).collect();
    let order = topological_order(&parent_names, &names, block.index)?;

    let mut confirm_ids: Vec<i64> = Vec::with_capacity(order.len());
    for slot in order {
        let coin = confirms[slot];
        let parent_id = parent_ids
            .get(&coin.parent_coin_name)
            .copied()
            .ok_or_else(|| DbError::DanglingParent {
                block: block.index,
                parent: hex::encode(coin.parent_coin_name),
            })?;
        let id = txn.insert_coin(
            parent_id,
            coin.puzzle_hash,
            coin.amount.to_be_bytes(),
            block.index,
        );
        unflushed.insert(names[slot], id);
        parent_ids.insert(names[slot], id as i64);
        confirm_ids.push(id as i64);
    }

    // Spends resolve through the same tiers, in input order. Coins
    // confirmed above are visible through the unflushed map.
    let mut resolved: HashMap<Hash32, i64> = HashMap::new();
    let mut needs_lookup: HashSet<Hash32> = HashSet::new();
    for name in &block.spends {
        if resolved.contains_key(name) || needs_lookup.contains(name) {
            continue;
        }
        if let Some(v) = coinbase::as_coinbase_index(name) {
            resolved.insert(*name, v);
        } else if let Some(&id) = unflushed.get(name) {
            resolved.insert(*name, id as i64);
        } else {
            needs_lookup.insert(*name);
        }
    }
    let query: Vec<Hash32> = needs_lookup.into_iter().collect();
    let (found, missing) = forest.find_hashes(&query)?;
    if let Some(name) = missing.first() {
        return Err(DbError::UnknownSpend {
            block: block.index,
            spend: hex::encode(name),
        });
    }
    for row in found {
        resolved.insert(row.hash, row.id as i64);
    }
    let mut spend_ids: Vec<i64> = Vec::with_capacity(block.spends.len());
    for name in &block.spends {
        let id = resolved
            .get(name)
            .copied()
            .ok_or_else(|| DbError::UnknownSpend {
                block: block.index,
                spend: hex::encode(name),
            })?;
        spend_ids.push(id);
        if id > 0 {
            txn.set_spent(id as u64, block.index)?;
        }
    }

    txn.insert_block(block.index, block.timestamp, &spend_ids, &confirm_ids)?;
    Ok(())
}

/// Order confirm slots so every slot whose parent name is also in `names`
/// comes after that parent. Depth-first with a temporary mark for cycle
/// detection; roots are taken in ascending name order so the result is
/// reproducible.
fn topological_order(
    parent_names: &[Hash32],
    names: &[Hash32],
    block_index: u64,
) -> Result<Vec<usize>, DbError> {
    let slot_by_name: HashMap<&Hash32, usize> =
        names.iter().enumerate().map(|(i, n)| (n, i)).collect();
    let mut visit_order: Vec<usize> = (0..names.len()).collect();
    visit_order.sort_unstable_by(|&a, &b| names[a].cmp(&names[b]));

    const NEW: u8 = 0;
    const ON_STACK: u8 = 1;
    const DONE: u8 = 2;
    let mut state = vec![NEW; names.len()];
    let mut order = Vec::with_capacity(names.len());
    for &start in &visit_order {
        if state[start] != NEW {
            continue;
        }
        let mut stack = vec![(start, false)];
        while let Some((slot, children_done)) = stack.pop() {
            if children_done {
                state[slot] = DONE;
                order.push(slot);
                continue;
            }
            if state[slot] == DONE {
                continue;
            }
            state[slot] = ON_STACK;
            stack.push((slot, true));
            if let Some(&parent) = slot_by_name.get(&parent_names[slot]) {
                match state[parent] {
                    NEW => stack.push((parent, false)),
                    ON_STACK => return Err(DbError::Cycle(block_index)),
                    _ => {}
                }
            }
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::coinbase::COINBASE_PREFIXES;

    fn tmp_db() -> (tempfile::TempDir, CoinDb<FlatFileStore>) {
        tmp_db_with(DbConfig::default())
    }

    fn tmp_db_with(config: DbConfig) -> (tempfile::TempDir, CoinDb<FlatFileStore>) {
        let dir = tempfile::tempdir().unwrap();
        let db = CoinDb::open(&dir.path().join("replay_db"), config).unwrap();
        (dir, db)
    }

    fn coinbase_parent(prefix_index: usize, tail: u64) -> Hash32 {
        let mut name = [0u8; 32];
        name[..16].copy_from_slice(&COINBASE_PREFIXES[prefix_index]);
        name[24..].copy_from_slice(&tail.to_be_bytes());
        name
    }

    fn coinbase_coin(tail: u64, amount: u64) -> Coin {
        Coin {
            parent_coin_name: coinbase_parent(0, tail),
            puzzle_hash: [0x11; 32],
            amount,
        }
    }

    fn block(index: u64, spends: Vec<Hash32>, confirms: Vec<Coin>) -> BlockSpendInfo {
        BlockSpendInfo {
            index,
            timestamp: index * 1000,
            spends,
            confirms,
        }
    }

    #[test]
    fn test_empty_flush_is_a_no_op() {
        let (_dir, mut db) = tmp_db();
        db.flush().unwrap();
        assert_eq!(db.coin_count(), 0);
        assert_eq!(db.indexed_row_count(), 0);
        assert_eq!(db.blocks().unwrap().count(), 0);
    }

    #[test]
    fn test_singleton_coinbase_block() {
        let (_dir, mut db) = tmp_db();
        let coin = Coin {
            parent_coin_name: coinbase_parent(0, 0),
            puzzle_hash: [0x11; 32],
            amount: 250,
        };
        db.accept_block(block(1, vec![], vec![coin])).unwrap();
        db.flush().unwrap();

        assert_eq!(db.indexed_row_count(), 1);
        assert_eq!(db.coin_count(), 1);
        let row = db.store.coin_row(1).unwrap().unwrap();
        assert_eq!(row.parent, 0);
        assert_eq!(row.amount, 250u64.to_be_bytes());
        assert_eq!(row.confirmed, 1);
        assert_eq!(row.spent, 0);

        let infos = db.coin_infos_for_names(&[coin.name()]).unwrap();
        let info = infos[0].unwrap();
        assert_eq!(info.coin, coin);
        assert_eq!(info.confirmed_index, 1);
        assert_eq!(info.spent_index, 0);

        let stored = db.block_info_for_index(1).unwrap().unwrap();
        assert_eq!(stored.timestamp, 1000);
        assert_eq!(stored.confirms, vec![coin]);
        assert!(stored.spends.is_empty());
    }

    #[test]
    fn test_intra_block_parent_orders_and_numbers() {
        let (_dir, mut db) = tmp_db();
        let parent = coinbase_coin(1, 100);
        let child = Coin {
            parent_coin_name: parent.name(),
            puzzle_hash: [0x22; 32],
            amount: 40,
        };
        // child listed first; the insertion order must still put the
        // parent's row before the child's
        db.accept_block(block(1, vec![], vec![child, parent])).unwrap();
        db.flush().unwrap();

        let row = db.store.block_row(1).unwrap().unwrap();
        assert_eq!(row.confirm_ids.len(), 2);
        let (parent_id, child_id) = (row.confirm_ids[0], row.confirm_ids[1]);
        assert_eq!((parent_id, child_id), (1, 2));
        let child_row = db.store.coin_row(child_id as u64).unwrap().unwrap();
        assert_eq!(child_row.parent, parent_id);
        assert_eq!(child_row.puzzle, [0x22; 32]);
    }

    #[test]
    fn test_cross_block_spend_in_same_flush() {
        let (_dir, mut db) = tmp_db();
        let minted = coinbase_coin(2, 77);
        db.accept_block(block(2, vec![], vec![minted])).unwrap();
        db.accept_block(block(3, vec![minted.name()], vec![])).unwrap();
        db.flush().unwrap();

        let info = db.coin_infos_for_names(&[minted.name()]).unwrap()[0].unwrap();
        assert_eq!(info.confirmed_index, 2);
        assert_eq!(info.spent_index, 3);
    }

    #[test]
    fn test_cross_block_spend_across_flushes() {
        let (_dir, mut db) = tmp_db();
        let minted = coinbase_coin(3, 88);
        db.accept_block(block(2, vec![], vec![minted])).unwrap();
        db.flush().unwrap();
        db.accept_block(block(3, vec![minted.name()], vec![])).unwrap();
        db.flush().unwrap();

        let info = db.coin_infos_for_names(&[minted.name()]).unwrap()[0].unwrap();
        assert_eq!(info.spent_index, 3);
        let spends = db.block_info_for_index(3).unwrap().unwrap().spends;
        assert_eq!(spends, vec![minted.name()]);
    }

    #[test]
    fn test_dangling_parent_commits_nothing() {
        let (_dir, mut db) = tmp_db();
        let orphan = Coin {
            parent_coin_name: [0xAB; 32],
            puzzle_hash: [0x01; 32],
            amount: 5,
        };
        db.accept_block(block(1, vec![], vec![orphan])).unwrap();
        let err = db.flush().unwrap_err();
        assert!(matches!(err, DbError::DanglingParent { block: 1, .. }));
        assert_eq!(db.coin_count(), 0);
        assert_eq!(db.indexed_row_count(), 0);
        assert_eq!(db.blocks().unwrap().count(), 0);
    }

    #[test]
    fn test_unknown_spend_commits_nothing() {
        let (_dir, mut db) = tmp_db();
        db.accept_block(block(1, vec![[0xEE; 32]], vec![coinbase_coin(4, 1)]))
            .unwrap();
        let err = db.flush().unwrap_err();
        assert!(matches!(err, DbError::UnknownSpend { block: 1, .. }));
        assert_eq!(db.coin_count(), 0);
        assert_eq!(db.indexed_row_count(), 0);
    }

    #[test]
    fn test_block_indices_must_increase() {
        let (_dir, mut db) = tmp_db();
        db.accept_block(block(5, vec![], vec![])).unwrap();
        let err = db.accept_block(block(5, vec![], vec![])).unwrap_err();
        assert!(matches!(err, DbError::OutOfOrder { last: 5, got: 5 }));
        db.flush().unwrap();
        let err = db.accept_block(block(4, vec![], vec![])).unwrap_err();
        assert!(matches!(err, DbError::OutOfOrder { last: 5, got: 4 }));
    }

    #[test]
    fn test_ids_stay_dense_across_flushes() {
        let (_dir, mut db) = tmp_db();
        db.accept_block(block(1, vec![], vec![coinbase_coin(1, 1), coinbase_coin(2, 2)]))
            .unwrap();
        db.flush().unwrap();
        db.accept_block(block(2, vec![], vec![coinbase_coin(3, 3)])).unwrap();
        db.flush().unwrap();

        let mut ids: Vec<i64> = Vec::new();
        for item in db.blocks().unwrap() {
            let info = item.unwrap();
            let row = db.store.block_row(info.index).unwrap().unwrap();
            ids.extend(row.confirm_ids);
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_cache_size_triggers_auto_flush() {
        let (_dir, mut db) = tmp_db_with(DbConfig {
            cache_size: 1,
            merge_threshold: 10,
        });
        db.accept_block(block(1, vec![], vec![coinbase_coin(1, 1), coinbase_coin(2, 2)]))
            .unwrap();
        // two pending confirms exceeded the cache size, so the block is
        // already on disk
        assert_eq!(db.coin_count(), 2);
        assert!(db.pending_blocks.is_empty());
    }

    #[test]
    fn test_rewind_is_declared_but_errors() {
        let (_dir, mut db) = tmp_db();
        assert!(matches!(
            db.rewind_to_block_index(1),
            Err(DbError::RewindUnsupported)
        ));
    }

    #[test]
    fn test_orphaned_forest_rows_detected_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("replay_db");
        {
            let mut db: CoinDb<FlatFileStore> = CoinDb::open(&root, DbConfig::default()).unwrap();
            db.accept_block(block(1, vec![], vec![coinbase_coin(1, 9)])).unwrap();
            db.flush().unwrap();
        }
        // a row file the coin table knows nothing about, as left behind
        // by a crash between forest append and commit
        let rogue = Row {
            hash: [0x5A; 32],
            id: 999,
        };
        std::fs::write(root.join("hashdb-000099.db"), rogue.to_bytes()).unwrap();
        let err = CoinDb::<FlatFileStore>::open(&root, DbConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            DbError::StateMismatch {
                forest_rows: 2,
                coin_rows: 1
            }
        ));
    }

    #[test]
    fn test_unknown_storage_tag() {
        assert!(matches!(
            open_with_tag("sqlite:/nowhere"),
            Err(DbError::UnknownStorageTag(_))
        ));
        assert!(matches!(
            open_with_tag("no-separator"),
            Err(DbError::BadStoreSpec(_))
        ));
    }

    mod topological {
        use super::*;

        fn fake_name(n: u8) -> Hash32 {
            [n; 32]
        }

        #[test]
        fn test_independent_slots_order_by_name() {
            let names = vec![fake_name(3), fake_name(1), fake_name(2)];
            let parents = vec![fake_name(0xF0), fake_name(0xF1), fake_name(0xF2)];
            let order = topological_order(&parents, &names, 1).unwrap();
            assert_eq!(order, vec![1, 2, 0]);
        }

        #[test]
        fn test_parent_precedes_child() {
            // slot 0 is the child of slot 1
            let names = vec![fake_name(1), fake_name(2)];
            let parents = vec![fake_name(2), fake_name(0xF0)];
            let order = topological_order(&parents, &names, 1).unwrap();
            assert_eq!(order, vec![1, 0]);
        }

        #[test]
        fn test_chain_of_three() {
            let names = vec![fake_name(1), fake_name(2), fake_name(3)];
            // 1's parent is 2, 2's parent is 3
            let parents = vec![fake_name(2), fake_name(3), fake_name(0xF0)];
            let order = topological_order(&parents, &names, 1).unwrap();
            assert_eq!(order, vec![2, 1, 0]);
        }

        #[test]
        fn test_two_cycle_is_rejected() {
            let names = vec![fake_name(1), fake_name(2)];
            let parents = vec![fake_name(2), fake_name(1)];
            assert!(matches!(
                topological_order(&parents, &names, 7),
                Err(DbError::Cycle(7))
            ));
        }

        #[test]
        fn test_self_cycle_is_rejected() {
            let names = vec![fake_name(1)];
            let parents = vec![fake_name(1)];
            assert!(matches!(
                topological_order(&parents, &names, 3),
                Err(DbError::Cycle(3))
            ));
        }
    }
}
