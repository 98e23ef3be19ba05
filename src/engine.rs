//! The parse phase and its join barrier.
//!
//! Each worker owns one [AggregateTable] and pulls chunks from its [Assignment] until the input
//! runs dry or some worker fails. The per-worker tables are merged once every thread has joined.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::debug;

use crate::config::{EngineConfig, Split};
use crate::dispense::{static_spans, Assignment, Chunk, ChunkCursor};
use crate::error::{BrcError, Result};
use crate::parse::parse_line;
use crate::report::{sorted_entries, write_report};
use crate::table::{merge_tables, Aggregate, AggregateTable};

/// Aggregates every line of `input` and writes the sorted report to `out`.
/// Nothing is written unless the whole input parsed cleanly.
pub fn process(input: &[u8], config: &EngineConfig, out: &mut impl Write) -> Result<()> {
    let table = aggregate(input, config)?;
    write_report(&sorted_entries(&table), out)?;
    Ok(())
}

/// Runs the parse phase on `config.workers` threads, then merges their tables into one.
pub fn aggregate(input: &[u8], config: &EngineConfig) -> Result<AggregateTable> {
    config.validate()?;
    let window = config.max_line_len();
    let cursor = ChunkCursor::new(config.chunk_size, window);
    let assignments = match config.split {
        Split::Dynamic => (0..config.workers)
            .map(|_| Assignment::Shared(&cursor))
            .collect::<Vec<_>>(),
        Split::Static => static_spans(input, config.workers, window)?
            .into_iter()
            .map(|span| Assignment::Fixed(Some(span)))
            .collect(),
    };
    let abort = AtomicBool::new(false);

    let (spawn_error, joined) = thread::scope(|s| {
        let mut handles = Vec::with_capacity(assignments.len());
        let mut spawn_error = None;
        for (worker, assignment) in assignments.into_iter().enumerate() {
            let abort = &abort;
            let spawned = thread::Builder::new()
                .name(format!("brc-worker-{worker}"))
                .spawn_scoped(s, move || run_worker(worker, input, assignment, config, abort));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    abort.store(true, Ordering::Relaxed);
                    spawn_error = Some(BrcError::Spawn { worker, source });
                    break;
                }
            }
        }
        let joined = handles
            .into_iter()
            .enumerate()
            .map(|(worker, handle)| {
                handle
                    .join()
                    .map_err(|_| BrcError::WorkerPanicked { worker })
                    .and_then(|table| table)
            })
            .collect::<Vec<_>>();
        (spawn_error, joined)
    }); // scope ends, all threads were joined

    if let Some(e) = spawn_error {
        return Err(e);
    }
    let tables = joined.into_iter().collect::<Result<Vec<_>>>()?;
    Ok(merge_tables(tables)?.unwrap_or_else(|| AggregateTable::new(config)))
}

/// Claims chunks until the assignment runs dry, folding each line into a fresh table.
/// Any failure raises `abort` so the other workers stop claiming.
fn run_worker(
    worker: usize,
    input: &[u8],
    mut assignment: Assignment<'_>,
    config: &EngineConfig,
    abort: &AtomicBool,
) -> Result<AggregateTable> {
    let mut table = AggregateTable::new(config);
    let mut chunks = 0usize;
    let mut bytes = 0usize;
    let mut rows = 0u64;

    let outcome = loop {
        if abort.load(Ordering::Relaxed) {
            break Ok(());
        }
        match assignment.next_chunk(input) {
            Ok(Some(chunk)) => match parse_chunk_and_record(input, chunk, config, &mut table) {
                Ok(n) => {
                    rows += n;
                    chunks += 1;
                    bytes += chunk.len();
                }
                Err(e) => break Err(e),
            },
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    if let Err(e) = outcome {
        abort.store(true, Ordering::Relaxed);
        debug!(worker, error = %e, "worker failed");
        return Err(e);
    }

    debug!(worker, chunks, bytes, rows, names = table.len(), "worker finished");
    Ok(table)
}

/// Parses every line starting inside `chunk` into `table`; returns the number of lines.
/// `chunk` is aligned, so the last line's newline is its final byte.
fn parse_chunk_and_record(
    input: &[u8],
    chunk: Chunk,
    config: &EngineConfig,
    table: &mut AggregateTable,
) -> Result<u64> {
    let mut pos = chunk.start;
    let mut rows = 0;
    while pos < chunk.end {
        let row = parse_line(input, pos, config.name_cap)?;
        table.upsert(row.name, row.hash, &Aggregate::single(row.measurement))?;
        pos = row.next;
        rows += 1;
    }
    Ok(rows)
}
