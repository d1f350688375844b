//! Core types for the book indexer.
//!
//! This module re-exports the `chess` crate types as the canonical
//! board/move types, so the rest of the crate has a single source of truth,
//! and defines the small set of indexer-specific aliases on top of them.

// Re-export chess crate types as canonical types
pub use chess::{
    Board,
    ChessMove as Move,
    Square,
    Piece,
    Color,
    File,
    Rank,
    MoveGen,
};

/// Position hash type (the engine's Zobrist key)
pub type Hash = u64;

/// Byte offset of a game inside the source PGN file
pub type GameOffset = u64;

// Game result codes, stored in the upper two bits of a book entry's
// `learn` field so that sorting by `learn` groups results together.
pub const RESULT_WHITE_WIN: u8 = 0;
pub const RESULT_BLACK_WIN: u8 = 1;
pub const RESULT_DRAW: u8 = 2;
pub const RESULT_UNKNOWN: u8 = 3;
