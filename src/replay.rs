// Textual block stream
//
// Line format (UTF-8, newline-delimited, strict):
//   B <block_index> <timestamp> <spend_count> <confirm_count>
//   S <spend_hash_hex>                   × spend_count
//   C <parent_hex> <puzzle_hex> <amount> × confirm_count
//
// Hashes are 64 hex characters; amounts are unsigned decimal. Field counts
// are exact; anything else on a line is a parse error.

use std::io::{BufRead, Write};

use crate::db::{CoinDb, DbError};
use crate::primitives::{BlockSpendInfo, Coin, Hash32};
use crate::store::RowStorage;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {msg}")]
    Malformed { line: u64, msg: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lazy block parser over any buffered reader. Stops at the first error.
pub struct BlockReader<R: BufRead> {
    reader: R,
    line_no: u64,
    failed: bool,
}

impl<R: BufRead> BlockReader<R> {
    pub fn new(reader: R) -> Self {
        BlockReader {
            reader,
            line_no: 0,
            failed: false,
        }
    }

    fn malformed(&self, msg: impl Into<String>) -> ParseError {
        ParseError::Malformed {
            line: self.line_no,
            msg: msg.into(),
        }
    }

    /// Next line without its terminator; None at end of input
    fn next_line(&mut self) -> Result<Option<String>, ParseError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn parse_u64(&self, token: &str, what: &str) -> Result<u64, ParseError> {
        token
            .parse()
            .map_err(|_| self.malformed(format!("{what} {token:?} is not an unsigned integer")))
    }

    fn parse_hash(&self, token: &str) -> Result<Hash32, ParseError> {
        if token.len() != 64 {
            return Err(self.malformed(format!("hash {token:?} is not 64 hex characters")));
        }
        let bytes =
            hex::decode(token).map_err(|_| self.malformed(format!("hash {token:?} is not hex")))?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(hash)
    }

    fn read_block(&mut self) -> Result<Option<BlockSpendInfo>, ParseError> {
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() != Some(&"B") {
            return Err(self.malformed(format!("expected a B line, got {line:?}")));
        }
        if fields.len() != 5 {
            return Err(self.malformed("B line takes exactly 4 fields"));
        }
        let index = self.parse_u64(fields[1], "block index")?;
        let timestamp = self.parse_u64(fields[2], "timestamp")?;
        let spend_count = self.parse_u64(fields[3], "spend count")?;
        let confirm_count = self.parse_u64(fields[4], "confirm count")?;

        // counts come straight from the input; sizing from them is not safe
        let mut spends = Vec::new();
        for _ in 0..spend_count {
            let line = self
                .next_line()?
                .ok_or_else(|| self.malformed("stream ends inside a spend list"))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 2 || fields[0] != "S" {
                return Err(self.malformed(format!("expected an S line, got {line:?}")));
            }
            spends.push(self.parse_hash(fields[1])?);
        }

        let mut confirms = Vec::new();
        for _ in 0..confirm_count {
            let line = self
                .next_line()?
                .ok_or_else(|| self.malformed("stream ends inside a confirm list"))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 || fields[0] != "C" {
                return Err(self.malformed(format!("expected a C line, got {line:?}")));
            }
            confirms.push(Coin {
                parent_coin_name: self.parse_hash(fields[1])?,
                puzzle_hash: self.parse_hash(fields[2])?,
                amount: self.parse_u64(fields[3], "amount")?,
            });
        }

        Ok(Some(BlockSpendInfo {
            index,
            timestamp,
            spends,
            confirms,
        }))
    }
}

impl<R: BufRead> Iterator for BlockReader<R> {
    type Item = Result<BlockSpendInfo, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Emit one block in canonical order: spends ascending by hash, confirms
/// ascending by (parent, puzzle, amount)
pub fn print_block<W: Write>(out: &mut W, block: &BlockSpendInfo) -> std::io::Result<()> {
    writeln!(
        out,
        "B {} {} {} {}",
        block.index,
        block.timestamp,
        block.spends.len(),
        block.confirms.len()
    )?;
    let mut spends = block.spends.clone();
    spends.sort_unstable();
    for spend in &spends {
        writeln!(out, "S {}", hex::encode(spend))?;
    }
    let mut confirms = block.confirms.clone();
    confirms.sort_unstable_by(|a, b| {
        (a.parent_coin_name, a.puzzle_hash, a.amount).cmp(&(
            b.parent_coin_name,
            b.puzzle_hash,
            b.amount,
        ))
    });
    for coin in &confirms {
        writeln!(
            out,
            "C {} {} {}",
            hex::encode(coin.parent_coin_name),
            hex::encode(coin.puzzle_hash),
            coin.amount
        )?;
    }
    Ok(())
}

/// Feed a block stream into the store, flushing at end of input. Blocks
/// beyond `max_block_index` are ignored. Returns the accepted count.
pub fn load_blocks<R: BufRead, S: RowStorage>(
    reader: R,
    db: &mut CoinDb<S>,
    max_block_index: u64,
) -> Result<u64, ReplayError> {
    let mut accepted = 0u64;
    let mut last_index = 0u64;
    for item in BlockReader::new(reader) {
        let block = item?;
        if block.index > max_block_index {
            break;
        }
        if last_index / 1000 < block.index / 1000 {
            println!("accepted block {}", block.index);
        }
        last_index = block.index;
        db.accept_block(block)?;
        accepted += 1;
    }
    db.flush()?;
    Ok(accepted)
}

/// Write every stored block up to `max_block_index` in canonical order.
/// Returns the emitted count.
pub fn dump_blocks<W: Write, S: RowStorage>(
    out: &mut W,
    db: &CoinDb<S>,
    max_block_index: u64,
) -> Result<u64, ReplayError> {
    let mut emitted = 0u64;
    for item in db.blocks()? {
        let block = item?;
        if block.index > max_block_index {
            break;
        }
        print_block(out, &block)?;
        emitted += 1;
    }
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(text: &str) -> Vec<Result<BlockSpendInfo, ParseError>> {
        BlockReader::new(text.as_bytes()).collect()
    }

    const SPEND: &str = "75043187b316d5f8d5a9dd8bfb26058e57db4f741e3404557b14525600685c94";

    #[test]
    fn test_parse_empty_stream() {
        assert!(parse_all("").is_empty());
    }

    #[test]
    fn test_parse_single_block() {
        let text = format!(
            "B 1 1000 1 1\nS {SPEND}\nC {} {} 250\n",
            "11".repeat(32),
            "22".repeat(32)
        );
        let blocks = parse_all(&text);
        assert_eq!(blocks.len(), 1);
        let block = blocks[0].as_ref().unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(block.timestamp, 1000);
        assert_eq!(block.spends.len(), 1);
        assert_eq!(hex::encode(block.spends[0]), SPEND);
        assert_eq!(
            block.confirms,
            vec![Coin {
                parent_coin_name: [0x11; 32],
                puzzle_hash: [0x22; 32],
                amount: 250,
            }]
        );
    }

    #[test]
    fn test_parse_rejects_unknown_leading_token() {
        let blocks = parse_all("X 1 2 0 0\n");
        assert!(matches!(
            blocks[0],
            Err(ParseError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_trailing_fields() {
        let blocks = parse_all("B 1 1000 0 0 extra\n");
        assert!(matches!(blocks[0], Err(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_parse_rejects_short_hash() {
        let blocks = parse_all("B 1 1000 1 0\nS abcd\n");
        assert!(matches!(
            blocks[0],
            Err(ParseError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_block() {
        let blocks = parse_all("B 1 1000 2 0\nS\n");
        assert!(matches!(blocks[0], Err(ParseError::Malformed { .. })));
        // iteration ends after the first error
        assert_eq!(parse_all("B 1 1000 2 0\n").len(), 1);
    }

    #[test]
    fn test_parse_rejects_non_decimal_amount() {
        let text = format!("B 1 1 0 1\nC {} {} -4\n", "11".repeat(32), "22".repeat(32));
        assert!(matches!(
            parse_all(&text)[0],
            Err(ParseError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_print_sorts_canonically() {
        let block = BlockSpendInfo {
            index: 4,
            timestamp: 9,
            spends: vec![[0xBB; 32], [0xAA; 32]],
            confirms: vec![
                Coin {
                    parent_coin_name: [2; 32],
                    puzzle_hash: [0; 32],
                    amount: 1,
                },
                Coin {
                    parent_coin_name: [1; 32],
                    puzzle_hash: [9; 32],
                    amount: 5,
                },
            ],
        };
        let mut out = Vec::new();
        print_block(&mut out, &block).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "B 4 9 2 2");
        assert!(lines[1].starts_with("S aaaa"));
        assert!(lines[2].starts_with("S bbbb"));
        assert!(lines[3].starts_with(&format!("C {}", "01".repeat(32))));
        assert!(lines[4].starts_with(&format!("C {}", "02".repeat(32))));
    }

    #[test]
    fn test_print_parse_roundtrip() {
        let block = BlockSpendInfo {
            index: 12,
            timestamp: 34,
            spends: vec![[0x0F; 32]],
            confirms: vec![Coin {
                parent_coin_name: [0xA0; 32],
                puzzle_hash: [0xB0; 32],
                amount: u64::MAX,
            }],
        };
        let mut out = Vec::new();
        print_block(&mut out, &block).unwrap();
        let parsed = BlockReader::new(out.as_slice())
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(parsed, block);
    }
}
