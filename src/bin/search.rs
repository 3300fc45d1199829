//! Interactive query binary.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use pilum::search::{QueryMode, SearchEngine};

/// Query a built index interactively with BM25 ranking.
#[derive(Parser, Debug)]
#[command(name = "pilum-search")]
#[command(about = "Query a built index interactively with BM25 ranking")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct SearchArgs {
    /// Directory containing the index files.
    #[arg(long, default_value = ".")]
    index_dir: PathBuf,

    /// Verbosity level (repeat for more detail).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = parse_args();
    init_logging(args.verbose);

    let engine = match SearchEngine::open(&args.index_dir) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = prompt_loop(&engine) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn prompt_loop(engine: &SearchEngine) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("Enter your search query (or 'q' to exit): ");
        io::stdout().flush()?;
        let Some(query) = lines.next().transpose()? else {
            break;
        };
        let query = query.trim().to_string();
        if query == "q" {
            break;
        }
        if query.is_empty() {
            continue;
        }

        print!("Enter search mode (0 for disjunctive, 1 for conjunctive): ");
        io::stdout().flush()?;
        let Some(mode_line) = lines.next().transpose()? else {
            break;
        };
        let mode = match mode_line.trim() {
            "0" => QueryMode::Disjunctive,
            "1" => QueryMode::Conjunctive,
            other => {
                eprintln!("unrecognized mode {other:?}, expected 0 or 1");
                continue;
            }
        };

        match engine.search(&query, mode) {
            Ok(hits) => {
                println!("Top 10 results:");
                for hit in hits {
                    println!("Doc ID: {}, Score: {:.6}", hit.doc_id, hit.score);
                }
            }
            Err(e) => eprintln!("query failed: {e}"),
        }
    }

    Ok(())
}

/// Parse arguments, exiting 1 on usage errors and 0 for help/version.
fn parse_args() -> SearchArgs {
    match SearchArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}
