use std::io::{BufWriter, Read, Write};

use anyhow::Context;
use clap::Parser;
use onebrc_agg::gen::{parse_stations, pick_stations, write_rows};
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Generates `name;value` rows. Reads `name;mean` station lines on stdin
/// (`#` comments allowed) and writes the rows to stdout.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of rows to write
    rows: u64,

    /// Distinct stations drawn from the list
    #[arg(long, default_value_t = 10_000)]
    cities: usize,

    /// Seed for reproducible output [default: random]
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut text = String::new();
    std::io::stdin()
        .lock()
        .read_to_string(&mut text)
        .context("reading station list from standard input")?;
    let stations = parse_stations(&text)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let picked = pick_stations(&stations, args.cities, &mut rng);
    info!(available = stations.len(), picked = picked.len(), rows = args.rows, "generating");

    let mut out = BufWriter::with_capacity(1 << 20, std::io::stdout().lock());
    write_rows(&picked, args.rows, &mut rng, &mut out)?;
    out.flush()?;
    Ok(())
}
