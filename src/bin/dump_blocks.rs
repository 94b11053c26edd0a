// dump_blocks — write a coindb store back out as a textual replay stream
//
// Usage: dump_blocks [--max-blocks N] TAG:PATH
//
// The stream goes to stdout; status goes to stderr so the output can be
// piped or diffed against the original replay file.

use std::io::{self, BufWriter, Write};

use colored::*;

use coindb::db::open_with_tag;
use coindb::replay::dump_blocks;

const DEFAULT_MAX_BLOCKS: u64 = 1_000_000_000_000;

fn print_usage() {
    eprintln!(
        "{}",
        "Usage: dump_blocks [--max-blocks N] TAG:PATH"
            .bright_yellow()
            .bold()
    );
    eprintln!();
    eprintln!(
        "  Writes the store named by TAG:PATH (e.g. {}) to stdout",
        "flatfile:./replay_db".bright_green()
    );
    eprintln!();
    eprintln!("  --max-blocks N   stop after block index N");
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut max_blocks = DEFAULT_MAX_BLOCKS;
    let mut spec: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--max-blocks" => {
                i += 1;
                max_blocks = args
                    .get(i)
                    .ok_or("--max-blocks needs a number")?
                    .parse()
                    .map_err(|_| "--max-blocks needs an unsigned number".to_string())?;
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other if spec.is_none() && !other.starts_with('-') => {
                spec = Some(other.to_string());
            }
            other => return Err(format!("unexpected argument {other:?}")),
        }
        i += 1;
    }

    let Some(spec) = spec else {
        print_usage();
        return Err("missing TAG:PATH argument".to_string());
    };

    let db = open_with_tag(&spec).map_err(|e| e.to_string())?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let emitted = dump_blocks(&mut out, &db, max_blocks).map_err(|e| e.to_string())?;
    out.flush().map_err(|e| e.to_string())?;
    eprintln!(
        "{} {} blocks written",
        "done:".bright_green().bold(),
        emitted
    );
    Ok(())
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("{} {}", "error:".bright_red().bold(), msg);
        std::process::exit(1);
    }
}
