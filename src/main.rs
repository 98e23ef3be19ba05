use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    ops::Deref,
    path::{Path, PathBuf},
    thread,
    time::Instant,
};

use anyhow::Context;
use clap::Parser;
use memmap2::Mmap;
use onebrc_agg::{
    config::{DEFAULT_CHUNK_SIZE, MAX_NAME_LEN},
    process, EngineConfig, Split,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Min, mean and max per name over `name;value` lines,
/// printed as `{name=min/mean/max, ...}`
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input file. Standard input is read to the end when omitted
    input: Option<PathBuf>,

    /// Worker threads [default: available parallelism]
    #[arg(short, long)]
    threads: Option<usize>,

    /// Bytes claimed per worker step
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Each worker table has 2^EXP slots
    #[arg(long, value_name = "EXP", default_value_t = 16)]
    table_exp: u32,

    /// Distinct names accepted per table [default: half the slots]
    #[arg(long)]
    max_names: Option<usize>,

    /// Longest accepted name, in bytes
    #[arg(long, default_value_t = MAX_NAME_LEN)]
    name_cap: usize,

    /// Name storage per worker [default: max names * name cap]
    #[arg(long)]
    arena_bytes: Option<usize>,

    /// Split the input into one span per worker up front instead of claiming chunks
    #[arg(long)]
    static_split: bool,
}

/// The whole input, either mapped or read into memory.
enum Input {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Input {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Input::Mapped(mmap) => &mmap[..],
            Input::Owned(bytes) => &bytes[..],
        }
    }
}

fn load(path: Option<&Path>) -> anyhow::Result<Input> {
    let Some(path) = path else {
        let mut bytes = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("reading standard input")?;
        return Ok(Input::Owned(bytes));
    };
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    // mapping an empty file fails on some platforms
    if file.metadata()?.len() == 0 {
        return Ok(Input::Owned(Vec::new()));
    }
    // SAFETY: the file is only read, and is assumed not to be modified while mapped
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("mapping {}", path.display()))?;
    Ok(Input::Mapped(mmap))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let workers = args.threads.unwrap_or_else(|| match thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            warn!(error = %e, "couldn't query the available parallelism, going single-threaded");
            1
        }
    });
    let mut config = EngineConfig::new(workers, args.table_exp)
        .with_chunk_size(args.chunk_size)
        .with_name_cap(args.name_cap);
    if let Some(max_names) = args.max_names {
        config = config.with_max_names(max_names);
    }
    if let Some(arena_bytes) = args.arena_bytes {
        config = config.with_arena_bytes(arena_bytes);
    }
    if args.static_split {
        config = config.with_split(Split::Static);
    }

    let started = Instant::now();
    let input = load(args.input.as_deref())?;
    info!(bytes = input.len(), elapsed = ?started.elapsed(), "input loaded");

    // nothing reaches the writer until every worker has finished cleanly
    let mut buffered_stdout = BufWriter::with_capacity(2 * 1024 * 1024, std::io::stdout());
    process(&input, &config, &mut buffered_stdout)?;
    writeln!(buffered_stdout)?;
    buffered_stdout.flush()?;
    info!(workers, elapsed = ?started.elapsed(), "done");
    Ok(())
}
