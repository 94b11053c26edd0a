// Row-file forest
//
// A directory of write-once sorted row files named `<prefix>NNNNNN.db`.
// Every (name, id) pair ever added lives in exactly one file. New batches
// become new files; once the file count reaches the merge threshold, the
// two smallest files are stream-merged into one, so the number of
// non-maximal files grows only logarithmically with the row count.
//
// Lookups probe files in descending sequence order. That order is fixed,
// documented, and survives restarts (it is re-derived from file names, not
// from in-memory insertion history).

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::path::{Path, PathBuf};

use super::row_file::{Row, RowStorage};
use super::StoreError;
use crate::primitives::Hash32;

pub struct RowForest<S: RowStorage> {
    dir: PathBuf,
    prefix: String,
    merge_threshold: usize,
    files: BTreeMap<u32, S>,
    row_count: u64,
}

impl<S: RowStorage> RowForest<S> {
    /// Open (or create) a forest directory, adopting every file that
    /// matches `<prefix>[0-9]{6}.db`. Other directory entries are ignored.
    pub fn open(dir: &Path, prefix: &str, merge_threshold: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let mut files = BTreeMap::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(seq) = parse_sequence(&name.to_string_lossy(), prefix) else {
                continue;
            };
            files.insert(seq, S::open(&entry.path())?);
        }
        let row_count = files.values().map(|f| f.row_count()).sum();
        Ok(RowForest {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            merge_threshold,
            files,
            row_count,
        })
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    fn file_path(&self, seq: u32) -> PathBuf {
        self.dir.join(format!("{}{:06}.db", self.prefix, seq))
    }

    /// Lowest unused sequence number, scanned from 1
    fn next_seq(&self) -> u32 {
        let mut seq = 1;
        while self.files.contains_key(&seq) {
            seq += 1;
        }
        seq
    }

    /// Sort a batch by hash, write it as a new file, then give the merge
    /// policy one chance to fire. Total row count is re-checked against
    /// the per-file counts before returning.
    pub fn add_rows(&mut self, mut rows: Vec<Row>) -> Result<(), StoreError> {
        let expected = self.row_count + rows.len() as u64;
        rows.sort_unstable_by(|a, b| a.hash.cmp(&b.hash));
        let seq = self.next_seq();
        let file = S::create(&self.file_path(seq), rows.into_iter().map(Ok))?;
        self.files.insert(seq, file);
        self.row_count = expected;
        self.merge_once()?;
        let found: u64 = self.files.values().map(|f| f.row_count()).sum();
        if found != expected {
            return Err(StoreError::CountMismatch {
                op: "add_rows",
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Merge the two smallest files when the forest is at or over the
    /// threshold. Runs at most once per call; `add_rows` invokes it once
    /// per batch.
    fn merge_once(&mut self) -> Result<(), StoreError> {
        if self.files.len() < self.merge_threshold.max(2) {
            return Ok(());
        }
        let mut sizes: Vec<(u64, u32)> = self
            .files
            .iter()
            .map(|(&seq, f)| (f.row_count(), seq))
            .collect();
        sizes.sort_unstable();
        let (count_a, seq_a) = sizes[0];
        let (count_b, seq_b) = sizes[1];
        let expected = count_a + count_b;

        let merged_seq = self.next_seq();
        let merged_path = self.file_path(merged_seq);
        let merged = {
            let sources = vec![
                self.files[&seq_a].all_rows()?,
                self.files[&seq_b].all_rows()?,
            ];
            S::create(&merged_path, MergedRows::new(sources)?)?
        };
        if merged.row_count() != expected {
            return Err(StoreError::CountMismatch {
                op: "merge",
                expected,
                found: merged.row_count(),
            });
        }

        for seq in [seq_a, seq_b] {
            self.files.remove(&seq);
            std::fs::remove_file(self.file_path(seq))?;
        }
        self.files.insert(merged_seq, merged);

        for file in self.files.values() {
            let actual = file.requery_count()?;
            if actual != file.row_count() {
                return Err(StoreError::CountMismatch {
                    op: "merge audit",
                    expected: file.row_count(),
                    found: actual,
                });
            }
        }
        Ok(())
    }

    /// Look up a batch of names across the whole forest. Returns the rows
    /// that were found and the names that were not; a missing name is not
    /// an error at this layer.
    pub fn find_hashes(&self, names: &[Hash32]) -> Result<(Vec<Row>, Vec<Hash32>), StoreError> {
        let mut found = Vec::new();
        let mut pending: Vec<Hash32> = names.to_vec();
        for file in self.files.values().rev() {
            if pending.is_empty() {
                break;
            }
            let mut missing = Vec::new();
            descend(file, pending, 0, file.row_count(), &mut found, &mut missing)?;
            pending = missing;
        }
        Ok((found, pending))
    }
}

/// Multi-key descent over one file: probe the middle row, emit exact
/// matches, recurse on the queries below it, and keep walking the upper
/// window with the rest. Each file is traversed once per batch, so the
/// log factor amortises over large query sets. A single remaining query
/// degenerates to classical binary search.
fn descend<S: RowStorage>(
    file: &S,
    mut queries: Vec<Hash32>,
    mut lo: u64,
    mut hi: u64,
    found: &mut Vec<Row>,
    missing: &mut Vec<Hash32>,
) -> Result<(), StoreError> {
    loop {
        if lo >= hi {
            missing.extend(queries);
            return Ok(());
        }
        if queries.len() == 1 {
            match search_one(file, &queries[0], lo, hi)? {
                Some(row) => found.push(row),
                None => missing.push(queries[0]),
            }
            return Ok(());
        }
        let mid = (lo + hi) / 2;
        let row = file.read_row(mid)?;
        let mut below = Vec::new();
        let mut above = Vec::new();
        for hash in queries {
            match hash.cmp(&row.hash) {
                std::cmp::Ordering::Equal => found.push(Row { hash, id: row.id }),
                std::cmp::Ordering::Less => below.push(hash),
                std::cmp::Ordering::Greater => above.push(hash),
            }
        }
        if !below.is_empty() {
            descend(file, below, lo, mid, found, missing)?;
        }
        if above.is_empty() {
            return Ok(());
        }
        queries = above;
        lo = mid + 1;
    }
}

fn search_one<S: RowStorage>(
    file: &S,
    hash: &Hash32,
    mut lo: u64,
    mut hi: u64,
) -> Result<Option<Row>, StoreError> {
    while lo < hi {
        let mid = (lo + hi) / 2;
        let row = file.read_row(mid)?;
        match row.hash.cmp(hash) {
            std::cmp::Ordering::Equal => return Ok(Some(row)),
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
        }
    }
    Ok(None)
}

/// N-way merge over already-sorted sources with one row of lookahead per
/// source, heap-keyed by the current hash.
struct MergedRows<I: Iterator<Item = Result<Row, StoreError>>> {
    sources: Vec<I>,
    heap: BinaryHeap<Reverse<(Hash32, u64, usize)>>,
    failed: bool,
}

impl<I: Iterator<Item = Result<Row, StoreError>>> MergedRows<I> {
    fn new(mut sources: Vec<I>) -> Result<Self, StoreError> {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (index, source) in sources.iter_mut().enumerate() {
            if let Some(row) = source.next() {
                let row = row?;
                heap.push(Reverse((row.hash, row.id, index)));
            }
        }
        Ok(MergedRows {
            sources,
            heap,
            failed: false,
        })
    }
}

impl<I: Iterator<Item = Result<Row, StoreError>>> Iterator for MergedRows<I> {
    type Item = Result<Row, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let Reverse((hash, id, index)) = self.heap.pop()?;
        match self.sources[index].next() {
            Some(Ok(row)) => self.heap.push(Reverse((row.hash, row.id, index))),
            Some(Err(e)) => {
                self.failed = true;
                return Some(Err(e));
            }
            None => {}
        }
        Some(Ok(Row { hash, id }))
    }
}

fn parse_sequence(file_name: &str, prefix: &str) -> Option<u32> {
    let rest = file_name.strip_prefix(prefix)?;
    let digits = rest.strip_suffix(".db")?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
