//! Post-processing and serialization of the record table.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::polyglot::BookEntry;

/// Replace the weights of one equal-key run by per-move frequency,
/// normalized so that 100% maps to 0xFFFF, then resort the run by
/// descending weight, ties broken by descending move.
fn sort_by_frequency(run: &mut [BookEntry]) {
    let mut counts: HashMap<u16, u64> = HashMap::new();
    for entry in run.iter() {
        *counts.entry(entry.raw_move).or_insert(0) += 1;
    }

    let len = run.len() as u64;
    for entry in run.iter_mut() {
        entry.weight = (counts[&entry.raw_move] * 0xFFFF / len) as u16;
    }

    run.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then(b.raw_move.cmp(&a.raw_move))
    });
}

/// Sort the record table into book order and re-weight the moves of every
/// position seen more than twice. Returns the number of unique keys.
pub fn process(table: &mut [BookEntry]) -> u64 {
    table.sort();

    if table.is_empty() {
        return 0;
    }

    let mut unique_keys = 1;
    let mut last = 0;
    for idx in 1..table.len() {
        if table[idx].key != table[idx - 1].key {
            if idx - last > 2 {
                sort_by_frequency(&mut table[last..idx]);
            }
            last = idx;
            unique_keys += 1;
        }
    }
    if table.len() - last > 2 {
        sort_by_frequency(&mut table[last..]);
    }

    unique_keys
}

/// Book file name for a PGN input: the extension, if any, becomes `.bin`
pub fn book_path(pgn: &str) -> PathBuf {
    Path::new(pgn).with_extension("bin")
}

/// Write the processed table to `path`. Unless `full`, consecutive entries
/// with identical `(key, move)` collapse into the first one. Returns the
/// number of bytes written.
pub fn write_book(table: &[BookEntry], path: &Path, full: bool) -> io::Result<u64> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut written = 0;
    let mut prev: Option<&BookEntry> = None;

    for entry in table {
        let keep = full
            || prev.map_or(true, |p| p.key != entry.key || p.raw_move != entry.raw_move);
        if keep {
            out.write_all(&entry.to_bytes())?;
            written += super::polyglot::ENTRY_SIZE as u64;
            prev = Some(entry);
        }
    }

    out.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::polyglot::PolyglotBook;

    fn entry(key: u64, raw_move: u16) -> BookEntry {
        BookEntry { key, raw_move, weight: 1, learn: 0 }
    }

    #[test]
    fn process_sorts_by_key() {
        let mut table = vec![entry(30, 1), entry(10, 2), entry(20, 3)];
        let unique = process(&mut table);
        assert_eq!(unique, 3);
        let keys: Vec<u64> = table.iter().map(|e| e.key).collect();
        assert_eq!(keys, [10, 20, 30]);
        // Short runs keep their raw weight
        assert!(table.iter().all(|e| e.weight == 1));
    }

    #[test]
    fn process_reweights_long_runs() {
        let mut table = vec![
            entry(10, 5),
            entry(10, 7),
            entry(10, 5),
            entry(20, 1),
        ];
        let unique = process(&mut table);
        assert_eq!(unique, 2);

        // Move 5 seen twice out of three, move 7 once
        assert_eq!(table[0].raw_move, 5);
        assert_eq!(table[0].weight, (2 * 0xFFFF / 3) as u16);
        assert_eq!(table[1].raw_move, 5);
        assert_eq!(table[2].raw_move, 7);
        assert_eq!(table[2].weight, (0xFFFF / 3) as u16);
        // The pair-key run is untouched
        assert_eq!(table[3].weight, 1);
    }

    #[test]
    fn process_reweights_final_run() {
        let mut table = vec![
            entry(10, 1),
            entry(20, 5),
            entry(20, 5),
            entry(20, 9),
        ];
        process(&mut table);
        // The run at the end of the table gets the same treatment
        assert_eq!(table[1].weight, (2 * 0xFFFF / 3) as u16);
        assert_eq!(table[3].weight, (0xFFFF / 3) as u16);
    }

    #[test]
    fn equal_weight_ties_break_by_descending_move() {
        let mut table = vec![entry(10, 1), entry(10, 2), entry(10, 3)];
        process(&mut table);
        let moves: Vec<u16> = table.iter().map(|e| e.raw_move).collect();
        assert_eq!(moves, [3, 2, 1]);
        assert!(table.iter().all(|e| e.weight == (0xFFFF / 3) as u16));
    }

    #[test]
    fn weights_sum_to_full_scale() {
        let mut table = vec![
            entry(10, 1),
            entry(10, 1),
            entry(10, 2),
            entry(10, 3),
            entry(10, 3),
        ];
        process(&mut table);
        let sum: u64 = table.iter().map(|e| e.weight as u64).sum();
        // Within integer truncation of count * 0xFFFF / run_length
        let expected: u64 = [2u64, 2, 1, 3, 3]
            .iter()
            .map(|&c| c * 0xFFFF / 5)
            .sum::<u64>();
        assert_eq!(sum, expected);
    }

    #[test]
    fn book_path_replaces_extension() {
        assert_eq!(book_path("games.pgn"), PathBuf::from("games.bin"));
        assert_eq!(book_path("games"), PathBuf::from("games.bin"));
        assert_eq!(book_path("dir/my.games.pgn"), PathBuf::from("dir/my.games.bin"));
    }

    #[test]
    fn write_deduplicates_consecutive_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let table = vec![entry(10, 5), entry(10, 5), entry(10, 7), entry(20, 5)];

        let dedup = dir.path().join("dedup.bin");
        let size = write_book(&table, &dedup, false).unwrap();
        assert_eq!(size, 3 * 16);

        let full = dir.path().join("full.bin");
        let size = write_book(&table, &full, true).unwrap();
        assert_eq!(size, 4 * 16);
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.bin");
        let mut table = vec![
            BookEntry { key: 2, raw_move: 7, weight: 3, learn: 0x8000_0123 },
            BookEntry { key: 1, raw_move: 9, weight: 1, learn: 4 },
        ];
        process(&mut table);
        write_book(&table, &path, true).unwrap();

        let mut book = PolyglotBook::open(&path).unwrap();
        assert_eq!(book.len(), 2);
        for (idx, expected) in table.iter().enumerate() {
            assert_eq!(book.read_entry(idx as u64).unwrap().as_ref(), Some(expected));
        }
    }

    #[test]
    fn empty_table_writes_empty_book() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        let mut table = Vec::new();
        assert_eq!(process(&mut table), 0);
        assert_eq!(write_book(&table, &path, false).unwrap(), 0);
        assert!(PolyglotBook::open(&path).unwrap().is_empty());
    }
}
