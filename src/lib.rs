//! PGN to Polyglot book indexer.
//!
//! Converts collections of chess games in PGN notation into Polyglot
//! opening-book binary indexes and answers lookups against them by position
//! key. The PGN side is a table-driven, malformation-tolerant streaming
//! parser over a memory-mapped file; the rules side (move legality, SAN
//! resolution, position hashing) is delegated to the `chess` crate behind a
//! narrow engine trait.
//!
//! # Usage
//!
//! ```ignore
//! pgnbook book games.pgn        # build games.bin, deduplicated
//! pgnbook book games.pgn full   # keep per-game records for statistics
//! pgnbook find games.bin limit 5 <fen>
//! ```

pub mod book;
pub mod cli;
pub mod pgn;
pub mod types;
