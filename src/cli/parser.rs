//! Command-line parser.

use super::{CliError, Command};

/// Default number of sampled game offsets per probed move
const DEFAULT_LIMIT: usize = 10;

/// Parse the command-line arguments into a [`Command`]
pub fn parse_command(args: &[String]) -> Result<Command, CliError> {
    let mut parts = args.iter().map(String::as_str);

    match parts.next() {
        Some("book") => parse_book(&mut parts),
        Some("find") => parse_find(&mut parts),
        Some(other) => Err(CliError::UnknownCommand(other.to_string())),
        None => Err(CliError::MissingCommand),
    }
}

fn parse_book<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<Command, CliError> {
    let pgn = parts.next().ok_or(CliError::MissingFileName)?.to_string();
    let full = parts.next() == Some("full");
    Ok(Command::Book { pgn, full })
}

fn parse_find<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<Command, CliError> {
    let book = parts.next().ok_or(CliError::MissingFileName)?.to_string();
    let mut limit = DEFAULT_LIMIT;
    let mut skip = 0;
    let mut fen_parts: Vec<&str> = Vec::new();

    while let Some(token) = parts.next() {
        match token {
            "limit" => {
                limit = parts
                    .next()
                    .and_then(|v| v.parse().ok())
                    .filter(|&v| v >= 1)
                    .ok_or(CliError::InvalidLimit)?;
            }
            "skip" => {
                // No bounds on skip, one can be skipping a lot of games
                // in a large database
                skip = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            }
            _ => fen_parts.push(token),
        }
    }

    if fen_parts.is_empty() {
        return Err(CliError::MissingFen);
    }

    Ok(Command::Find { book, limit, skip, fen: fen_parts.join(" ") })
}
