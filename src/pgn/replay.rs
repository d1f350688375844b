//! SAN replay against a rules engine.
//!
//! The replayer walks a finalised game's SAN tokens left to right, asks the
//! engine to resolve each token in the running position, and emits one book
//! record per successful move. The engine sits behind the narrow [`Engine`]
//! trait so the replayer can be driven by a scripted mock in tests; the
//! production implementation wraps a `chess::Board`.

use std::str;

use super::parser::RawGame;
use crate::book::{to_polyglot, BookEntry};
use crate::types::{Board, Color, File, Hash, Move, MoveGen, Piece, Rank, Square};

/// Null move token, passing the turn without moving a piece
const NULL_MOVE: &[u8] = b"--";

/// The rules-engine capability set consumed by the replayer.
pub trait Engine {
    /// Reset to the standard starting position
    fn set_start(&mut self);
    /// Load a position from FEN; false if the FEN does not parse
    fn set_fen(&mut self, fen: &str) -> bool;
    /// Resolve one SAN token in the current position. `fixed` is bumped
    /// when the token was only accepted after repair.
    fn san_to_move(&self, san: &str, fixed: &mut u64) -> Option<Move>;
    /// Encode a resolved move in Polyglot wire form
    fn encode_move(&self, m: Move) -> u16;
    /// Play a move
    fn do_move(&mut self, m: Move);
    /// Pass the turn; false if the position does not admit a null move
    fn do_null_move(&mut self) -> bool;
    /// Position key of the current position
    fn key(&self) -> Hash;
    fn side_to_move(&self) -> Color;
    fn fen(&self) -> String;
}

/// Production engine backed by the `chess` crate.
pub struct BoardEngine {
    board: Board,
}

impl BoardEngine {
    pub fn new() -> Self {
        Self { board: Board::default() }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }
}

impl Default for BoardEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize SAN spellings the decoder rejects: castling written with
/// zeros or lowercase o's, and trailing en-passant markers.
fn repair_san(san: &str) -> Option<String> {
    match san {
        "0-0" | "o-o" => return Some("O-O".to_string()),
        "0-0-0" | "o-o-o" => return Some("O-O-O".to_string()),
        _ => {}
    }
    for suffix in ["e.p.", "ep"] {
        if let Some(stripped) = san.strip_suffix(suffix) {
            return Some(stripped.to_string());
        }
    }
    None
}

/// Decode one SAN token against the legal moves of `board`.
///
/// The `chess` crate offers no SAN parsing, so the matching is driven by
/// move generation: the candidates are the legal moves filtered by
/// destination square, moving piece, and promotion, then narrowed by
/// whatever file/rank disambiguation the token carries. A token that
/// matches no candidate, or still more than one, decodes to nothing.
/// Castling is recognised as the king's two-file move.
fn decode_san(board: &Board, san: &str) -> Option<Move> {
    let clean = san.trim_end_matches(|c: char| matches!(c, '+' | '#' | '!' | '?'));

    if clean == "O-O" || clean == "O-O-O" {
        let long = clean == "O-O-O";
        return MoveGen::new_legal(board).find(|m| {
            let src = m.get_source().get_file().to_index();
            let dst = m.get_dest().get_file().to_index();
            board.piece_on(m.get_source()) == Some(Piece::King)
                && if long { src == dst + 2 } else { dst == src + 2 }
        });
    }

    let (piece, rest) = match clean.bytes().next()? {
        b'K' => (Piece::King, &clean[1..]),
        b'Q' => (Piece::Queen, &clean[1..]),
        b'R' => (Piece::Rook, &clean[1..]),
        b'B' => (Piece::Bishop, &clean[1..]),
        b'N' => (Piece::Knight, &clean[1..]),
        _ => (Piece::Pawn, clean),
    };

    let (rest, promotion) = match rest.split_once('=') {
        Some((head, tail)) => {
            let p = match tail.bytes().next() {
                Some(b'Q') => Piece::Queen,
                Some(b'R') => Piece::Rook,
                Some(b'B') => Piece::Bishop,
                Some(b'N') => Piece::Knight,
                _ => return None,
            };
            (head, Some(p))
        }
        None => (rest, None),
    };

    let rest = rest.replace('x', "");
    if rest.len() < 2 {
        return None;
    }
    let (disambig, square) = rest.split_at(rest.len() - 2);
    let file = square.as_bytes()[0];
    let rank = square.as_bytes()[1];
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    let dest = Square::make_square(
        Rank::from_index((rank - b'1') as usize),
        File::from_index((file - b'a') as usize),
    );

    let mut candidates: Vec<Move> = MoveGen::new_legal(board)
        .filter(|m| {
            m.get_dest() == dest
                && board.piece_on(m.get_source()) == Some(piece)
                && m.get_promotion() == promotion
        })
        .collect();

    // A pawn move without a file marker is a push on the destination file
    if piece == Piece::Pawn && disambig.is_empty() {
        candidates.retain(|m| m.get_source().get_file() == dest.get_file());
    }

    if candidates.len() == 1 {
        return Some(candidates[0]);
    }

    for b in disambig.bytes() {
        if (b'a'..=b'h').contains(&b) {
            candidates.retain(|m| m.get_source().get_file().to_index() == (b - b'a') as usize);
        } else if (b'1'..=b'8').contains(&b) {
            candidates.retain(|m| m.get_source().get_rank().to_index() == (b - b'1') as usize);
        }
    }

    match candidates.as_slice() {
        [m] => Some(*m),
        _ => None,
    }
}

impl Engine for BoardEngine {
    fn set_start(&mut self) {
        self.board = Board::default();
    }

    fn set_fen(&mut self, fen: &str) -> bool {
        use std::str::FromStr;
        match Board::from_str(fen) {
            Ok(board) => {
                self.board = board;
                true
            }
            Err(_) => false,
        }
    }

    fn san_to_move(&self, san: &str, fixed: &mut u64) -> Option<Move> {
        if let Some(m) = decode_san(&self.board, san) {
            return Some(m);
        }
        let repaired = repair_san(san)?;
        let m = decode_san(&self.board, &repaired)?;
        *fixed += 1;
        Some(m)
    }

    fn encode_move(&self, m: Move) -> u16 {
        to_polyglot(&self.board, m)
    }

    fn do_move(&mut self, m: Move) {
        self.board = self.board.make_move_new(m);
    }

    fn do_null_move(&mut self) -> bool {
        match self.board.null_move() {
            Some(board) => {
                self.board = board;
                true
            }
            None => false,
        }
    }

    fn key(&self) -> Hash {
        self.board.get_hash()
    }

    fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    fn fen(&self) -> String {
        self.board.to_string()
    }
}

/// Replay policy: emit book records, or only walk the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// Append one record per move and report bad tokens on stderr
    Emit,
    /// Same traversal, no records, no diagnostics
    DryRun,
}

/// Replay one game, appending records to `table` in [`ReplayMode::Emit`].
///
/// The `learn` field of every record carries the game result in its upper
/// two bits and the 8-byte-aligned game offset in the lower 30, so a book
/// built from PGN files of up to 8 GiB can point back into its source.
/// Returns the byte position inside `game.moves` where the traversal
/// stopped: the buffer length on success, the offending token on failure.
pub fn replay_game<E: Engine>(
    engine: &mut E,
    game: &RawGame<'_>,
    mode: ReplayMode,
    table: &mut Vec<BookEntry>,
    fixed: &mut u64,
) -> usize {
    let learn = ((game.result as u32 & 3) << 30) | ((game.offset >> 3) as u32 & 0x3FFF_FFFF);

    if game.fen.is_empty() {
        engine.set_start();
    } else {
        let ok = str::from_utf8(game.fen)
            .ok()
            .map_or(false, |fen| engine.set_fen(fen));
        if !ok {
            if mode == ReplayMode::Emit {
                eprintln!("Wrong FEN: '{}'", String::from_utf8_lossy(game.fen));
            }
            return 0;
        }
    }

    let mut pos = 0;
    while pos < game.moves.len() {
        let end = game.moves[pos..]
            .iter()
            .position(|&b| b == 0)
            .map_or(game.moves.len(), |o| pos + o);
        let token = &game.moves[pos..end];

        if token == NULL_MOVE {
            if !engine.do_null_move() {
                if mode == ReplayMode::Emit {
                    let sep = if engine.side_to_move() == Color::White { "" } else { ".." };
                    eprintln!(
                        "Wrong move notation: {}{}\n{}",
                        sep,
                        String::from_utf8_lossy(token),
                        engine.fen()
                    );
                }
                return pos;
            }
        } else {
            let san = str::from_utf8(token).unwrap_or("");
            match engine.san_to_move(san, fixed) {
                Some(m) => {
                    if mode == ReplayMode::Emit {
                        table.push(BookEntry {
                            key: engine.key(),
                            raw_move: engine.encode_move(m),
                            weight: 1,
                            learn,
                        });
                    }
                    engine.do_move(m);
                }
                None => {
                    if mode == ReplayMode::Emit {
                        let sep = if engine.side_to_move() == Color::White { "" } else { ".." };
                        eprintln!(
                            "Wrong move notation: {}{}\n{}",
                            sep,
                            String::from_utf8_lossy(token),
                            engine.fen()
                        );
                    }
                    return pos;
                }
            }
        }

        pos = end + 1; // Go to next move
    }
    game.moves.len()
}
