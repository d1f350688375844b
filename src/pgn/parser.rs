//! Streaming PGN parser driver.
//!
//! Walks the input one byte at a time through the tables in
//! [`super::tables`], accumulating the current game's SAN tokens, FEN tag,
//! result and file offset, and hands each finalised game to a sink. The
//! driver is deliberately tolerant of real-world PGN damage: missing
//! results, unclosed brace comments, tag blocks interleaved with move text
//! and duplicated dots all recover without losing the surrounding games.

use arrayvec::ArrayVec;

use super::tables::{action, classify, Action, State};
use crate::types::{Color, GameOffset, RESULT_BLACK_WIN, RESULT_DRAW, RESULT_UNKNOWN, RESULT_WHITE_WIN};

/// Maximum nesting depth of parser scopes (braces, parentheses, tags, NAGs)
pub const MAX_NESTING: usize = 16;

const FEN_MAX: usize = 256;

/// Counters reported by one parse run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Games handed to the sink
    pub games: u64,
    /// SAN tokens collected across all games
    pub moves: u64,
}

/// One finalised game as collected by the driver.
///
/// `moves` holds the game's SAN tokens as consecutive NUL-terminated byte
/// strings; `fen` is empty when the game starts from the standard position.
#[derive(Debug, Clone, Copy)]
pub struct RawGame<'a> {
    pub moves: &'a [u8],
    pub fen: &'a [u8],
    pub offset: GameOffset,
    pub result: u8,
}

impl<'a> RawGame<'a> {
    /// Iterate the SAN tokens in source order
    pub fn tokens(&self) -> impl Iterator<Item = &'a [u8]> {
        self.moves.split(|&b| b == 0).filter(|t| !t.is_empty())
    }
}

/// Decode a result token from the byte at `i` plus up to two preceding
/// bytes. Triggered by `/`, `*`, `0` or `-`.
fn get_result(data: &[u8], i: usize) -> u8 {
    let prev = |n: usize| if i >= n { data[i - n] } else { 0 };
    match data[i] {
        b'/' => RESULT_DRAW,
        b'0' => RESULT_BLACK_WIN,
        b'-' => {
            if prev(1) == b'1' || (prev(1) == b' ' && prev(2) == b'1') {
                // Like '1 - 0'
                RESULT_WHITE_WIN
            } else if prev(1) == b'0' || (prev(1) == b' ' && prev(2) == b'0') {
                RESULT_BLACK_WIN
            } else {
                RESULT_UNKNOWN
            }
        }
        _ => RESULT_UNKNOWN,
    }
}

fn starts_with_at(data: &[u8], at: usize, pat: &[u8]) -> bool {
    data.get(at..).map_or(false, |rest| rest.starts_with(pat))
}

fn warn_state(state: State, data: &[u8], i: usize) {
    let end = (i + 50).min(data.len());
    let what = String::from_utf8_lossy(&data[i..end]);
    eprintln!("Wrong {:?}: '{}'", state, what);
}

/// Parse a PGN buffer, handing each finalised game to `sink`.
///
/// A game is finalised on its result token, on the `[Event` tag of the next
/// game when the result is missing (also from inside an unclosed brace
/// comment), and at end of input when move text is still pending. Games with
/// a non-standard `Variant` tag are dropped without reaching the sink.
pub fn parse_pgn(data: &[u8], mut sink: impl FnMut(RawGame<'_>)) -> ParserStats {
    let mut stack: ArrayVec<State, MAX_NESTING> = ArrayVec::new();
    let mut fen: Vec<u8> = Vec::with_capacity(FEN_MAX);
    let mut moves: Vec<u8> = Vec::with_capacity(8 * 1024);
    let mut stats = ParserStats::default();
    let mut stm = Color::White;
    let mut result = RESULT_UNKNOWN;
    let mut game_ofs: GameOffset = 0;
    let mut state = State::Header;

    let mut i = 0;
    while i < data.len() {
        let b = data[i];

        match action(state, classify(b)) {
            Action::Fail => warn_state(state, data, i),

            Action::Continue => {}

            Action::GameStart => {
                // Only meaningful inside SKIP_GAME: the byte is an 'E', and
                // if it opens an `[Event ` tag the bracket is re-parsed.
                if i >= 1 && starts_with_at(data, i - 1, b"[Event ") {
                    state = State::Header;
                    i -= 1;
                    continue;
                }
            }

            Action::OpenTag => {
                if starts_with_at(data, i + 1, b"FEN \"") {
                    stack.push(state);
                    state = State::FenTag;
                    i += 5; // Land on the opening quote
                } else if starts_with_at(data, i + 1, b"Variant ")
                    && !starts_with_at(data, i + 9, b"\"Standard\"")
                {
                    state = State::SkipGame;
                } else {
                    stack.push(state);
                    state = State::Tag;
                }
            }

            Action::OpenBraceComment => {
                if state == State::ReadSan {
                    // Finalise the pending token, as END_MOVE would
                    moves.push(0);
                    stats.moves += 1;
                    state = if stm == Color::White { State::NextSan } else { State::NextMove };
                    stm = !stm;
                }
                stack.push(state);
                state = State::BraceComment;
            }

            Action::ReadFen => {
                if fen.len() < FEN_MAX {
                    fen.push(b);
                }
            }

            Action::CloseFenTag => {
                state = State::Tag;
                if fen.windows(3).any(|w| w == b" b ") {
                    stm = Color::Black;
                }
            }

            Action::OpenVariation => {
                stack.push(state);
                state = State::Variation;
            }

            Action::StartNag => {
                stack.push(state);
                state = State::NumericAnnotationGlyph;
            }

            Action::PopState => match stack.pop() {
                Some(s) => state = s,
                None => {
                    warn_state(state, data, i);
                    state = State::Header;
                }
            },

            Action::StartMoveNumber => state = State::MoveNumber,

            Action::StartNextSan => state = State::NextSan,

            Action::CastleOrResult => {
                if data.get(i + 2) != Some(&b'0') {
                    debug_assert_eq!(result, RESULT_UNKNOWN);
                    result = get_result(data, i);
                    state = State::Result;
                } else {
                    // A castle written with zeros, read it as a SAN token
                    moves.push(b);
                    state = State::ReadSan;
                }
            }

            Action::StartReadSan => {
                moves.push(b);
                state = State::ReadSan;
            }

            Action::ReadMoveChar => moves.push(b),

            Action::EndMove => {
                moves.push(0); // Zero-terminating string
                stats.moves += 1;
                state = if stm == Color::White { State::NextSan } else { State::NextMove };
                stm = !stm;
            }

            Action::StartResult => {
                debug_assert_eq!(result, RESULT_UNKNOWN);
                result = get_result(data, i);
                state = State::Result;
            }

            Action::EndGame => {
                if b != b'\n' {
                    // Handle spaces in the result, like 1/2 - 1/2
                    state = State::Result;
                } else {
                    sink(RawGame { moves: &moves, fen: &fen, offset: game_ofs, result });
                    stats.games += 1;
                    result = RESULT_UNKNOWN;
                    game_ofs = i as GameOffset + 1; // Beginning of next game
                    moves.clear();
                    fen.clear();
                    state = State::Header;
                    stm = Color::White;
                }
            }

            a @ (Action::TagInBrace | Action::MissingResult) => {
                // TAG_IN_BRACE fires on any '[' inside an unclosed brace
                // comment; only the start of the next game closes the
                // pending one.
                if a == Action::TagInBrace && !starts_with_at(data, i, b"[Event ") {
                    // Some other tag-looking text inside the comment
                } else {
                    // Missing result, next game already started
                    sink(RawGame { moves: &moves, fen: &fen, offset: game_ofs, result });
                    stats.games += 1;
                    result = RESULT_UNKNOWN;
                    game_ofs = i as GameOffset; // The '[' of the next game
                    moves.clear();
                    fen.clear();
                    stm = Color::White;

                    // Fast forward into the tag
                    stack.clear();
                    stack.push(State::Header);
                    state = State::Tag;
                }
            }
        }

        i += 1;
    }

    // Force accounting of the last game if still pending. Many reasons for
    // this to trigger: no newline at EOF, missing result, missing closing
    // brace, etc.
    if state != State::Header && state != State::SkipGame && !moves.is_empty() {
        sink(RawGame { moves: &moves, fen: &fen, offset: game_ofs, result });
        stats.games += 1;
    }

    stats
}
