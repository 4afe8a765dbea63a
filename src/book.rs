use std::collections::HashMap;
use std::path::Path;

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{board::Board, types::Move};

/// A plain-text opening book: one line of space-separated UCI moves per
/// opening, all starting from the initial position. The book is consulted
/// with the moves played so far; every line extending that sequence votes
/// for its next move, and lines repeat to add weight.
#[derive(Default)]
pub struct Book {
    lines: Vec<Vec<String>>,
}

impl Book {
    pub fn open(path: &str) -> Self {
        match std::fs::read_to_string(Path::new(path)) {
            Ok(data) => Self::parse(&data),
            Err(error) => {
                log::debug!("book '{path}' not available: {error}");
                Self::default()
            }
        }
    }

    pub fn parse(data: &str) -> Self {
        let lines = data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .collect();

        Self { lines }
    }

    /// Picks a book continuation for the game so far: the most popular one
    /// with `best_only`, otherwise weighted-random. Only legal moves are
    /// ever returned.
    pub fn probe(&self, board: &Board, game_moves: &[String], best_only: bool) -> Option<Move> {
        let mut weights: HashMap<String, u32> = HashMap::new();

        for line in &self.lines {
            if line.len() <= game_moves.len() {
                continue;
            }
            if line[..game_moves.len()] != game_moves[..] {
                continue;
            }
            *weights.entry(line[game_moves.len()].clone()).or_default() += 1;
        }

        if weights.is_empty() {
            return None;
        }

        let candidate = if best_only {
            weights.iter().max_by_key(|entry| *entry.1).map(|entry| entry.0.clone())?
        } else {
            let total: u32 = weights.values().sum();
            let mut roll = SmallRng::from_entropy().gen_range(0..total);
            let mut picked = None;
            for (mv, &weight) in &weights {
                if roll < weight {
                    picked = Some(mv.clone());
                    break;
                }
                roll -= weight;
            }
            picked?
        };

        board
            .generate_all_moves()
            .iter()
            .map(|entry| entry.mv)
            .find(|mv| mv.to_string() == candidate && board.is_legal(*mv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK: &str = "\
# common openings
e2e4 e7e5 g1f3
e2e4 e7e5 g1f3
e2e4 c7c5 g1f3
d2d4 d7d5 c2c4
";

    #[test]
    fn probes_by_prefix() {
        let book = Book::parse(BOOK);
        let mut board = Board::starting_position();

        let first = book.probe(&board, &[], true).unwrap();
        assert_eq!(first.to_string(), "e2e4");

        for mv in ["e2e4", "e7e5"] {
            let played = board.generate_all_moves().iter().map(|e| e.mv).find(|m| m.to_string() == mv).unwrap();
            board.make_move(played);
        }

        let reply = book.probe(&board, &["e2e4".into(), "e7e5".into()], true).unwrap();
        assert_eq!(reply.to_string(), "g1f3");
    }

    #[test]
    fn out_of_book_returns_none() {
        let book = Book::parse(BOOK);
        let board = Board::starting_position();

        assert!(book.probe(&board, &["a2a3".into()], true).is_none());
    }

    #[test]
    fn illegal_book_moves_are_rejected() {
        let book = Book::parse("e2e5");
        let board = Board::starting_position();

        assert!(book.probe(&board, &[], true).is_none());
    }
}
