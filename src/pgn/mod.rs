//! Streaming PGN parsing.
//!
//! A table-driven lexer walks the input byte by byte ([`tables`],
//! [`parser`]) and hands each finalised game to the SAN replayer
//! ([`replay`]), which turns move text into Polyglot records against a
//! rules engine.

mod parser;
mod replay;
mod tables;

pub use parser::{parse_pgn, ParserStats, RawGame, MAX_NESTING};
pub use replay::{replay_game, BoardEngine, Engine, ReplayMode};
pub use tables::{action, classify, Action, State, Token};
