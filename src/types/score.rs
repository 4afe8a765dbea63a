use super::MAX_PLY;

/// Search depth is measured in half plies: `ONE_PLY == 2`, so extensions can
/// add fractional plies.
pub const ONE_PLY: i32 = 2;

pub const DEPTH_ZERO: i32 = 0;
pub const DEPTH_QS_CHECKS: i32 = 0;
pub const DEPTH_QS_NO_CHECKS: i32 = -ONE_PLY;
pub const DEPTH_NONE: i32 = -127 * ONE_PLY;

pub struct Score;

#[rustfmt::skip]
impl Score {
    pub const ZERO: i32 = 0;
    pub const DRAW: i32 = 0;

    pub const NONE:      i32 = 32002;
    pub const INFINITE:  i32 = 32001;
    pub const MATE:      i32 = 32000;
    pub const KNOWN_WIN: i32 = 15000;

    pub const MATE_IN_MAX:  i32 =  Self::MATE - MAX_PLY as i32;
    pub const MATED_IN_MAX: i32 = -Self::MATE + MAX_PLY as i32;
}

/// The score for being mated `ply` plies from the root.
pub const fn mated_in(ply: usize) -> i32 {
    -Score::MATE + ply as i32
}

/// The score for giving mate `ply` plies from the root.
pub const fn mate_in(ply: usize) -> i32 {
    Score::MATE - ply as i32
}

pub const fn is_win(score: i32) -> bool {
    score >= Score::MATE_IN_MAX
}

pub const fn is_loss(score: i32) -> bool {
    score <= Score::MATED_IN_MAX
}

pub const fn is_decisive(score: i32) -> bool {
    is_win(score) || is_loss(score)
}

pub const fn is_valid(score: i32) -> bool {
    score != Score::NONE
}
