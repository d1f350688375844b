//! Command handlers: book building and probing.

use std::fs::File;
use std::time::Instant;

use memmap2::Mmap;
use serde::Serialize;

use super::parser::parse_command;
use super::{CliError, Command};
use crate::book::{book_path, process, write_book, BookEntry, PolyglotBook, ENTRY_SIZE};
use crate::pgn::{parse_pgn, replay_game, BoardEngine, Engine, ReplayMode};
use crate::types::Hash;

/// Report printed by the `book` command
#[derive(Debug, Serialize)]
pub struct BookReport {
    #[serde(rename = "Games")]
    pub games: u64,
    #[serde(rename = "Moves")]
    pub moves: u64,
    #[serde(rename = "Incorrect moves")]
    pub incorrect_moves: u64,
    #[serde(rename = "Unique positions (%)")]
    pub unique_positions_pct: u64,
    #[serde(rename = "Games/second")]
    pub games_per_second: u64,
    #[serde(rename = "Moves/second")]
    pub moves_per_second: u64,
    #[serde(rename = "MBytes/second")]
    pub mbytes_per_second: f64,
    #[serde(rename = "Size of index file (bytes)")]
    pub book_size: u64,
    #[serde(rename = "Book file")]
    pub book_file: String,
    #[serde(rename = "Processing time (ms)")]
    pub processing_ms: u64,
}

/// Report printed by the `find` command
#[derive(Debug, Serialize)]
pub struct FindReport {
    pub fen: String,
    pub key: Hash,
    pub moves: Vec<MoveReport>,
}

/// Per-move aggregation within a probed position
#[derive(Debug, Serialize)]
pub struct MoveReport {
    #[serde(rename = "move")]
    pub uci: String,
    pub weight: u16,
    pub games: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    #[serde(rename = "pgn offsets")]
    pub pgn_offsets: Vec<u64>,
}

/// Parse the command line and run the selected command, printing its JSON
/// report to standard output.
pub fn run(args: &[String]) -> Result<(), CliError> {
    let report = match parse_command(args)? {
        Command::Book { pgn, full } => serde_json::to_string_pretty(&build_report(&pgn, full)?)?,
        Command::Find { book, limit, skip, fen } => {
            serde_json::to_string_pretty(&find_report(&book, limit, skip, &fen)?)?
        }
    };
    println!("{}", report);
    Ok(())
}

fn open_err(path: &str) -> impl FnOnce(std::io::Error) -> CliError + '_ {
    move |source| CliError::Open { path: path.to_string(), source }
}

/// Build `<pgn-without-ext>.bin` from a PGN file and report on the run.
///
/// The input is mapped read-only for the duration of the parse and released
/// before the book is written.
pub fn build_report(pgn: &str, full: bool) -> Result<BookReport, CliError> {
    let file = File::open(pgn).map_err(open_err(pgn))?;
    let size = file.metadata().map_err(open_err(pgn))?.len();
    // A zero-length file cannot be mapped
    let mmap = if size > 0 {
        Some(unsafe { Mmap::map(&file) }.map_err(open_err(pgn))?)
    } else {
        None
    };
    let data: &[u8] = mmap.as_deref().unwrap_or(&[]);

    // Crude capacity estimate from the file size, assuming the record table
    // ends up about twice the size of the PGN text
    let mut table: Vec<BookEntry> = Vec::with_capacity(2 * size as usize / ENTRY_SIZE);

    eprint!("\nProcessing...");
    let start = Instant::now();
    let mut engine = BoardEngine::new();
    let mut fixed = 0;
    let stats = parse_pgn(data, |game| {
        replay_game(&mut engine, &game, ReplayMode::Emit, &mut table, &mut fixed);
    });
    // Ensure positivity to avoid a divide by zero
    let elapsed = (start.elapsed().as_millis() as u64).max(1);
    drop(mmap);
    eprintln!("done");

    eprint!("Sorting...");
    let unique_keys = process(&mut table);
    eprintln!("done");

    eprint!("Writing Polyglot book...");
    let out_path = book_path(pgn);
    let book_size =
        write_book(&table, &out_path, full).map_err(open_err(&out_path.display().to_string()))?;
    eprintln!("done\n");

    Ok(BookReport {
        games: stats.games,
        moves: stats.moves,
        incorrect_moves: fixed,
        unique_positions_pct: if stats.moves > 0 { 100 * unique_keys / stats.moves } else { 0 },
        games_per_second: 1000 * stats.games / elapsed,
        moves_per_second: 1000 * stats.moves / elapsed,
        mbytes_per_second: size as f64 / elapsed as f64 / 1000.0,
        book_size,
        book_file: out_path.display().to_string(),
        processing_ms: elapsed,
    })
}

/// Probe a book for the position given by `fen`.
pub fn find_report(
    book_file: &str,
    limit: usize,
    skip: usize,
    fen: &str,
) -> Result<FindReport, CliError> {
    let mut engine = BoardEngine::new();
    if !engine.set_fen(fen) {
        return Err(CliError::InvalidFen(fen.to_string()));
    }
    let key = engine.key();

    let mut book = PolyglotBook::open(book_file).map_err(open_err(book_file))?;
    let moves = match book.find_key(key)? {
        Some(idx) => probe_key(&mut book, idx, limit, skip)?,
        None => Vec::new(),
    };

    Ok(FindReport { fen: engine.fen(), key, moves })
}

/// Stream the records of one key starting at `idx`, grouping consecutive
/// records with the same move and aggregating their result buckets.
///
/// Per-game statistics only carry information when the book was built in
/// full mode; a deduplicated book shows one game per move.
fn probe_key(
    book: &mut PolyglotBook,
    mut idx: u64,
    limit: usize,
    skip: usize,
) -> Result<Vec<MoveReport>, CliError> {
    let mut out = Vec::new();
    let mut entry = match book.read_entry(idx)? {
        Some(entry) => entry,
        None => return Ok(out),
    };
    let key = entry.key;

    loop {
        let first = entry;
        let mut results = [0u64; 4];
        let mut offsets = Vec::new();
        let mut skip_counter = skip;
        let mut next;

        loop {
            if skip_counter == 0 {
                if offsets.len() < limit {
                    offsets.push(entry.game_offset());
                }
            } else {
                skip_counter -= 1;
            }
            results[entry.result_bucket() as usize] += 1;

            idx += 1;
            next = book.read_entry(idx)?;
            match next {
                Some(n) if n.key == key && n.raw_move == first.raw_move => entry = n,
                _ => break,
            }
        }

        out.push(MoveReport {
            uci: first.uci(),
            weight: first.weight,
            games: results.iter().sum(),
            wins: results[0],
            losses: results[1],
            draws: results[2],
            pgn_offsets: offsets,
        });

        match next {
            Some(n) if n.key == key => entry = n,
            _ => break,
        }
    }

    Ok(out)
}
