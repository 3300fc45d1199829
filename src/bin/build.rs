//! Index builder binary.

use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use pilum::index::builder::DEFAULT_MEMORY_LIMIT;
use pilum::index::{IndexBuilder, IndexBuilderConfig};

/// Build a block-compressed inverted index from a gzipped tar corpus.
#[derive(Parser, Debug)]
#[command(name = "pilum-build")]
#[command(about = "Build a block-compressed inverted index from a gzipped tar corpus")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct BuildArgs {
    /// Path to the gzipped tar archive of documents.
    archive: PathBuf,

    /// Soft cap in bytes on the in-memory posting estimate.
    #[arg(long, default_value_t = DEFAULT_MEMORY_LIMIT)]
    memory_limit: usize,

    /// Directory receiving the index files.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Verbosity level (repeat for more detail).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = parse_args();
    init_logging(args.verbose);

    let config = IndexBuilderConfig {
        memory_limit: args.memory_limit,
        output_dir: args.output_dir,
    };
    if let Err(e) = IndexBuilder::new(config).build(&args.archive) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Parse arguments, exiting 1 on usage errors and 0 for help/version.
fn parse_args() -> BuildArgs {
    match BuildArgs::try_parse() {
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
