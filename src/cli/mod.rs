//! Command-line surface of the indexer.
//!
//! Two commands are understood:
//!
//! - `book <pgn-file> [full]` builds `<pgn-file-without-ext>.bin`; `full`
//!   keeps every record instead of deduplicating repeated position/move
//!   pairs, which preserves per-game statistics for probing.
//! - `find <bin-file> [limit N] [skip N] <fen ...>` probes a book by FEN.
//!
//! Both commands print a JSON report to standard output; progress and
//! warnings go to standard error.

mod handler;
mod parser;

pub use handler::{build_report, find_report, run, BookReport, FindReport, MoveReport};
pub use parser::parse_command;

use std::io;
use thiserror::Error;

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// "book <pgn-file> [full]"
    Book { pgn: String, full: bool },
    /// "find <bin-file> [limit N] [skip N] <fen ...>"
    Find { book: String, limit: usize, skip: usize, fen: String },
}

/// Errors that abort a command
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Missing command (expected 'book' or 'find')")]
    MissingCommand,
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Missing PGN file name...")]
    MissingFileName,
    #[error("Missing FEN string...")]
    MissingFen,
    #[error("limit must be at least 1")]
    InvalidLimit,
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),
    #[error("Could not open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
