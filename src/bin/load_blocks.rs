// load_blocks — feed a textual block replay stream into a coindb store
//
// Usage: load_blocks [--input FILE] [--max-blocks N] TAG:PATH

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use colored::*;

use coindb::db::open_with_tag;
use coindb::replay::load_blocks;

const DEFAULT_MAX_BLOCKS: u64 = 300_000;

fn print_usage() {
    println!(
        "{}",
        "Usage: load_blocks [--input FILE] [--max-blocks N] TAG:PATH"
            .bright_yellow()
            .bold()
    );
    println!();
    println!("  Reads a block replay stream (default: stdin) and ingests it into");
    println!(
        "  the store named by TAG:PATH, e.g. {}",
        "flatfile:./replay_db".bright_green()
    );
    println!();
    println!("  --input FILE     read the stream from FILE instead of stdin");
    println!(
        "  --max-blocks N   ignore blocks with index above N (default {})",
        DEFAULT_MAX_BLOCKS
    );
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut input: Option<String> = None;
    let mut max_blocks = DEFAULT_MAX_BLOCKS;
    let mut spec: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => {
                i += 1;
                input = Some(args.get(i).ok_or("--input needs a file argument")?.clone());
            }
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

    let mut db = open_with_tag(&spec).map_err(|e| e.to_string())?;
    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(&path).map_err(|e| format!("cannot open {path}: {e}"))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let started = std::time::Instant::now();
    let accepted = load_blocks(reader, &mut db, max_blocks).map_err(|e| e.to_string())?;
    println!(
        "{} {} blocks accepted, {} coins indexed, {:.1}s",
        "done:".bright_green().bold(),
        accepted,
        db.coin_count(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("{} {}", "error:".bright_red().bold(), msg);
        std::process::exit(1);
    }
}
