use crate::types::{Move, MAX_PLY};

/// Triangular table collecting the principal variation: row `ply` holds the
/// best line found from that ply downward.
pub struct PrincipalVariationTable {
    table: Box<[[Move; MAX_PLY + 1]; MAX_PLY + 1]>,
    len: [usize; MAX_PLY + 1],
}

impl Default for PrincipalVariationTable {
    fn default() -> Self {
        Self { table: vec![[Move::NONE; MAX_PLY + 1]; MAX_PLY + 1].try_into().unwrap(), len: [0; MAX_PLY + 1] }
    }
}

impl PrincipalVariationTable {
    pub fn clear(&mut self, ply: usize) {
        self.len[ply] = 0;
    }

    /// Sets `mv` as the head of the line at `ply`, extended by the child line.
    pub fn update(&mut self, ply: usize, mv: Move) {
        self.table[ply][0] = mv;

        let child_len = if ply + 1 <= MAX_PLY { self.len[ply + 1] } else { 0 };
        for index in 0..child_len {
            self.table[ply][index + 1] = self.table[ply + 1][index];
        }
        self.len[ply] = child_len + 1;
    }

    /// Replaces the line at `ply` wholesale, used when a split point hands
    /// back a merged PV.
    pub fn set_line(&mut self, ply: usize, line: &[Move]) {
        let len = line.len().min(MAX_PLY + 1);
        self.table[ply][..len].copy_from_slice(&line[..len]);
        self.len[ply] = len;
    }

    pub fn line(&self, ply: usize) -> &[Move] {
        &self.table[ply][..self.len[ply]]
    }
}
