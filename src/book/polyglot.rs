//! Polyglot opening book format support.
//!
//! The format is a headerless concatenation of 16-byte entries, all fields
//! big-endian, sorted by ascending key and, within a key, by descending
//! weight then move. This module implements the entry codec, the move
//! encoding, and an offset-based reader used by the probe.

use crate::types::{Board, File, Hash, Move, Piece, Rank, Square};
use std::fs::File as FsFile;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Size of a single Polyglot entry in bytes
pub const ENTRY_SIZE: usize = 16;

/// A single entry of a Polyglot opening book.
///
/// Entries order lexicographically by `(key, raw_move, weight, learn)`,
/// which is the order the post-processor relies on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct BookEntry {
    /// Position hash of the position the move was played in
    pub key: Hash,
    /// Encoded move
    pub raw_move: u16,
    /// Weight/priority of this move
    pub weight: u16,
    /// Game result in the upper two bits, game offset / 8 in the lower 30
    pub learn: u32,
}

impl BookEntry {
    /// Parse an entry from raw bytes (big-endian format)
    pub fn from_bytes(bytes: &[u8; ENTRY_SIZE]) -> Self {
        Self {
            key: u64::from_be_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
                bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
            raw_move: u16::from_be_bytes([bytes[8], bytes[9]]),
            weight: u16::from_be_bytes([bytes[10], bytes[11]]),
            learn: u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        }
    }

    /// Serialize the entry to its on-disk big-endian layout
    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut bytes = [0; ENTRY_SIZE];
        bytes[0..8].copy_from_slice(&self.key.to_be_bytes());
        bytes[8..10].copy_from_slice(&self.raw_move.to_be_bytes());
        bytes[10..12].copy_from_slice(&self.weight.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.learn.to_be_bytes());
        bytes
    }

    /// Result bucket from the upper two learn bits
    /// (0 white win, 1 black win, 2 draw, 3 unknown)
    pub fn result_bucket(&self) -> u8 {
        (self.learn >> 30) as u8 & 3
    }

    /// Byte offset of the source game inside its PGN file, 8-byte aligned
    pub fn game_offset(&self) -> u64 {
        ((self.learn & 0x3FFF_FFFF) as u64) << 3
    }

    /// Decode the raw move to source square, destination square, and promotion
    pub fn decode_move(&self) -> (Square, Square, Option<Piece>) {
        let to_file = (self.raw_move & 0x7) as usize;
        let to_rank = ((self.raw_move >> 3) & 0x7) as usize;
        let from_file = ((self.raw_move >> 6) & 0x7) as usize;
        let from_rank = ((self.raw_move >> 9) & 0x7) as usize;
        let promo = ((self.raw_move >> 12) & 0x7) as usize;

        let from = Square::make_square(
            Rank::from_index(from_rank),
            File::from_index(from_file),
        );
        let to = Square::make_square(
            Rank::from_index(to_rank),
            File::from_index(to_file),
        );

        // Promotion: 0=none, 1=knight, 2=bishop, 3=rook, 4=queen
        let promotion = match promo {
            1 => Some(Piece::Knight),
            2 => Some(Piece::Bishop),
            3 => Some(Piece::Rook),
            4 => Some(Piece::Queen),
            _ => None,
        };

        (from, to, promotion)
    }

    /// Format the raw move in UCI notation. Castling keeps the book's
    /// king-takes-rook squares (`e1h1`), as the move is shown without a
    /// position to interpret it in.
    pub fn uci(&self) -> String {
        let (from, to, promo) = self.decode_move();
        let mut s = format!("{}{}", from, to);
        if let Some(p) = promo {
            s.push(match p {
                Piece::Knight => 'n',
                Piece::Bishop => 'b',
                Piece::Rook => 'r',
                _ => 'q',
            });
        }
        s
    }
}

/// Encode a move in Polyglot wire form, in the context of the position it
/// is played in:
///
/// - bit  0- 5: destination square
/// - bit  6-11: origin square
/// - bit 12-13: promotion piece (knight = 1 .. queen = 4)
///
/// Castling follows the "king captures rook" representation, so the
/// engine's two-square king move is mapped back onto the rook's square.
pub fn to_polyglot(board: &Board, m: Move) -> u16 {
    let from = m.get_source();
    let mut to = m.get_dest();

    if board.piece_on(from) == Some(Piece::King) && from.get_file() == File::E {
        if to.get_file() == File::G {
            to = Square::make_square(to.get_rank(), File::H);
        } else if to.get_file() == File::C {
            to = Square::make_square(to.get_rank(), File::A);
        }
    }

    let promo: u16 = match m.get_promotion() {
        Some(Piece::Knight) => 1,
        Some(Piece::Bishop) => 2,
        Some(Piece::Rook) => 3,
        Some(Piece::Queen) => 4,
        _ => 0,
    };

    (to.to_index() as u16) | ((from.to_index() as u16) << 6) | (promo << 12)
}

/// Offset-based Polyglot book reader.
pub struct PolyglotBook {
    file: FsFile,
    entry_count: u64,
}

impl PolyglotBook {
    /// Open a Polyglot book file
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = FsFile::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size % ENTRY_SIZE as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid Polyglot book file size",
            ));
        }

        Ok(Self { file, entry_count: file_size / ENTRY_SIZE as u64 })
    }

    /// Number of entries in the book
    pub fn len(&self) -> u64 {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Read the entry at `idx`, or `None` past the end of the book
    pub fn read_entry(&mut self, idx: u64) -> io::Result<Option<BookEntry>> {
        if idx >= self.entry_count {
            return Ok(None);
        }
        self.file.seek(SeekFrom::Start(idx * ENTRY_SIZE as u64))?;
        let mut bytes = [0; ENTRY_SIZE];
        self.file.read_exact(&mut bytes)?;
        Ok(Some(BookEntry::from_bytes(&bytes)))
    }

    /// Binary-search for the index of the first entry with `key`
    pub fn find_key(&mut self, key: Hash) -> io::Result<Option<u64>> {
        let mut low = 0;
        let mut high = self.entry_count;

        while low < high {
            let mid = (low + high) / 2;
            self.file.seek(SeekFrom::Start(mid * ENTRY_SIZE as u64))?;
            let mut bytes = [0; ENTRY_SIZE];
            self.file.read_exact(&mut bytes)?;
            let entry = BookEntry::from_bytes(&bytes);

            if entry.key < key {
                low = mid + 1;
            } else {
                high = mid;
            }
        }

        match self.read_entry(low)? {
            Some(entry) if entry.key == key => Ok(Some(low)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::str::FromStr;

    #[test]
    fn test_decode_move() {
        // Test e2e4 (from=12, to=28)
        // from_file=4 (e), from_rank=1 (2)
        // to_file=4 (e), to_rank=3 (4)
        // raw = to_file | (to_rank << 3) | (from_file << 6) | (from_rank << 9)
        // raw = 4 | (3 << 3) | (4 << 6) | (1 << 9) = 4 | 24 | 256 | 512 = 796
        let entry = BookEntry {
            key: 0,
            raw_move: 796,
            weight: 100,
            learn: 0,
        };
        let (from, to, promo) = entry.decode_move();
        assert_eq!(from, Square::make_square(Rank::Second, File::E));
        assert_eq!(to, Square::make_square(Rank::Fourth, File::E));
        assert!(promo.is_none());
        assert_eq!(entry.uci(), "e2e4");
    }

    #[test]
    fn bytes_roundtrip() {
        let entry = BookEntry {
            key: 0x0123_4567_89AB_CDEF,
            raw_move: 0x1234,
            weight: 0xFFFF,
            learn: 0xC000_0001,
        };
        let bytes = entry.to_bytes();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[7], 0xEF);
        assert_eq!(bytes[8], 0x12);
        assert_eq!(bytes[10], 0xFF);
        assert_eq!(bytes[12], 0xC0);
        assert_eq!(BookEntry::from_bytes(&bytes), entry);
    }

    #[test]
    fn learn_accessors() {
        let entry = BookEntry {
            key: 0,
            raw_move: 0,
            weight: 0,
            learn: (2 << 30) | (0x100 >> 3),
        };
        assert_eq!(entry.result_bucket(), 2);
        assert_eq!(entry.game_offset(), 0x100);
    }

    #[test]
    fn entry_ordering_is_lexicographic() {
        let a = BookEntry { key: 1, raw_move: 9, weight: 9, learn: 9 };
        let b = BookEntry { key: 2, raw_move: 0, weight: 0, learn: 0 };
        let c = BookEntry { key: 2, raw_move: 1, weight: 0, learn: 0 };
        assert!(a < b);
        assert!(b < c);
    }

    fn sq(name: &str) -> Square {
        Square::from_str(name).unwrap()
    }

    #[test]
    fn encode_simple_move() {
        let board = Board::default();
        let m = Move::new(sq("e2"), sq("e4"), None);
        assert_eq!(to_polyglot(&board, m), 796);
    }

    #[test]
    fn encode_promotion() {
        let board = Board::from_str("8/4P1k1/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let m = Move::new(sq("e7"), sq("e8"), Some(Piece::Queen));
        // e7=52, e8=60, queen=4
        assert_eq!(to_polyglot(&board, m), 60 | (52 << 6) | (4 << 12));

        let entry = BookEntry { key: 0, raw_move: to_polyglot(&board, m), weight: 1, learn: 0 };
        assert_eq!(entry.uci(), "e7e8q");
    }

    #[test]
    fn encode_castling_as_king_takes_rook() {
        let board = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let short = Move::new(sq("e1"), sq("g1"), None);
        // e1=4 -> h1=7
        assert_eq!(to_polyglot(&board, short), 7 | (4 << 6));
        let long = Move::new(sq("e1"), sq("c1"), None);
        // e1=4 -> a1=0
        assert_eq!(to_polyglot(&board, long), 4 << 6);

        let board = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1").unwrap();
        let short = Move::new(sq("e8"), sq("g8"), None);
        // e8=60 -> h8=63
        assert_eq!(to_polyglot(&board, short), 63 | (60 << 6));
    }

    #[test]
    fn book_reader_probes_by_key() {
        let entries = [
            BookEntry { key: 10, raw_move: 5, weight: 1, learn: 0 },
            BookEntry { key: 20, raw_move: 7, weight: 2, learn: 0 },
            BookEntry { key: 20, raw_move: 3, weight: 1, learn: 0 },
            BookEntry { key: 30, raw_move: 1, weight: 1, learn: 0 },
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.bin");
        let mut f = FsFile::create(&path).unwrap();
        for e in &entries {
            f.write_all(&e.to_bytes()).unwrap();
        }
        drop(f);

        let mut book = PolyglotBook::open(&path).unwrap();
        assert_eq!(book.len(), 4);
        assert_eq!(book.find_key(10).unwrap(), Some(0));
        assert_eq!(book.find_key(20).unwrap(), Some(1));
        assert_eq!(book.find_key(30).unwrap(), Some(3));
        assert_eq!(book.find_key(25).unwrap(), None);
        assert_eq!(book.find_key(99).unwrap(), None);
        assert_eq!(book.read_entry(2).unwrap(), Some(entries[2]));
        assert_eq!(book.read_entry(4).unwrap(), None);
    }

    #[test]
    fn open_rejects_truncated_books() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        std::fs::write(&path, [0u8; 20]).unwrap();
        assert!(PolyglotBook::open(&path).is_err());
    }
}
