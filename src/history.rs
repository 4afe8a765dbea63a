use std::sync::atomic::{AtomicI32, Ordering};

use crate::types::{Piece, Square};

const HISTORY_MAX: i32 = 2000;

/// Move-ordering statistics shared by every worker thread. Entries are
/// relaxed atomics: concurrent updates may race, the tables are heuristic
/// only (lost or reordered increments are harmless).
pub struct History {
    table: Box<[[AtomicI32; Square::NUM]; Piece::NUM]>,
    gains: Box<[[AtomicI32; Square::NUM]; Piece::NUM]>,
}

impl Default for History {
    fn default() -> Self {
        Self { table: zeroed(), gains: zeroed() }
    }
}

impl History {
    pub fn value(&self, piece: Piece, to: Square) -> i32 {
        self.table[piece][to].load(Ordering::Relaxed)
    }

    /// Rewards or punishes a quiet move; `bonus` is `depth²` from the search,
    /// negative for quiet moves that were tried and did not cut off.
    pub fn update(&self, piece: Piece, to: Square, bonus: i32) {
        let entry = &self.table[piece][to];
        let value = (entry.load(Ordering::Relaxed) + bonus).clamp(-HISTORY_MAX, HISTORY_MAX);
        entry.store(value, Ordering::Relaxed);
    }

    pub fn gain(&self, piece: Piece, to: Square) -> i32 {
        self.gains[piece][to].load(Ordering::Relaxed)
    }

    /// Tracks the largest recent static-eval swing a quiet move produced,
    /// decaying by one per visit.
    pub fn update_gain(&self, piece: Piece, to: Square, gain: i32) {
        let entry = &self.gains[piece][to];
        let value = gain.max(entry.load(Ordering::Relaxed) - 1);
        entry.store(value, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for row in self.table.iter().chain(self.gains.iter()) {
            for entry in row {
                entry.store(0, Ordering::Relaxed);
            }
        }
    }
}

fn zeroed() -> Box<[[AtomicI32; Square::NUM]; Piece::NUM]> {
    unsafe {
        let layout = std::alloc::Layout::new::<[[AtomicI32; Square::NUM]; Piece::NUM]>();
        let ptr = std::alloc::alloc_zeroed(layout);
        if ptr.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        Box::from_raw(ptr.cast())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, PieceType};

    #[test]
    fn history_saturates() {
        let history = History::default();
        let piece = Piece::new(Color::White, PieceType::Knight);

        for _ in 0..100 {
            history.update(piece, Square::A1, 400);
        }
        assert_eq!(history.value(piece, Square::A1), HISTORY_MAX);
    }

    #[test]
    fn gains_decay() {
        let history = History::default();
        let piece = Piece::new(Color::Black, PieceType::Rook);

        history.update_gain(piece, Square::D1, 64);
        history.update_gain(piece, Square::D1, 0);
        assert_eq!(history.gain(piece, Square::D1), 63);
    }
}
