//! Polyglot opening book support.
//!
//! This module implements the Polyglot format (.bin) side of the indexer:
//! the 16-byte entry codec and move encoding, the post-processing pass that
//! turns the raw record table into a sorted, frequency-weighted book, and
//! the offset-based reader used for probing.

mod polyglot;
mod writer;

pub use polyglot::{to_polyglot, BookEntry, PolyglotBook, ENTRY_SIZE};
pub use writer::{book_path, process, write_book};
