use crate::{
    board::Board,
    history::History,
    parameters::PIECE_VALUES,
    types::{Move, MoveList, PieceType},
};

#[derive(Copy, Clone, PartialEq)]
enum Stage {
    HashMove,
    GenerateNoisy,
    GoodNoisy,
    Killers,
    GenerateQuiet,
    Quiet,
    BadNoisy,
    Done,
}

/// Staged move ordering: hash move, winning captures, killers, quiet moves
/// by history, losing captures last. Evasions collapse into a single scored
/// stage when in check. The picker yields legal moves only.
pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    killers: [Move; 3],
    killer_index: usize,
    noisy: MoveList,
    quiets: MoveList,
    bad_noisy: Vec<Move>,
    bad_index: usize,
    in_check: bool,
    qsearch: bool,
    with_checks: bool,
}

impl MovePicker {
    /// Picker for the main search. `killers[0]` is the mate killer.
    pub fn new(board: &Board, tt_move: Move, killers: [Move; 3]) -> Self {
        Self {
            stage: Stage::HashMove,
            tt_move,
            killers,
            killer_index: 0,
            noisy: MoveList::new(),
            quiets: MoveList::new(),
            bad_noisy: Vec::new(),
            bad_index: 0,
            in_check: board.in_check(),
            qsearch: false,
            with_checks: false,
        }
    }

    /// Picker for the quiescence search: captures and promotions, plus quiet
    /// checks when `with_checks` is set. Evasions when in check.
    pub fn new_qsearch(board: &Board, tt_move: Move, with_checks: bool) -> Self {
        Self {
            stage: Stage::HashMove,
            tt_move,
            killers: [Move::NONE; 3],
            killer_index: 0,
            noisy: MoveList::new(),
            quiets: MoveList::new(),
            bad_noisy: Vec::new(),
            bad_index: 0,
            in_check: board.in_check(),
            qsearch: true,
            with_checks,
        }
    }

    /// Picker for ProbCut: captures only, no hash move, no deferrals.
    pub fn new_probcut(board: &Board) -> Self {
        let mut picker = Self::new_qsearch(board, Move::NONE, false);
        picker.stage = Stage::GenerateNoisy;
        picker.in_check = false;
        picker
    }

    pub fn next(&mut self, board: &Board, history: &History) -> Option<Move> {
        loop {
            match self.stage {
                Stage::HashMove => {
                    self.stage = Stage::GenerateNoisy;

                    let tt_move = self.tt_move;
                    if tt_move != Move::NONE && self.accepts(board, tt_move) && board.is_legal(tt_move) {
                        return Some(tt_move);
                    }
                    self.tt_move = Move::NONE;
                }

                Stage::GenerateNoisy => {
                    self.noisy = if self.in_check { board.generate_all_moves() } else { board.generate_noisy_moves() };
                    self.score_noisy(board, history);
                    self.stage = Stage::GoodNoisy;
                }

                Stage::GoodNoisy => {
                    match self.select_best_noisy() {
                        Some(mv) => {
                            if mv == self.tt_move || !board.is_legal(mv) {
                                continue;
                            }

                            // Defer captures that lose material.
                            if !self.in_check && mv.is_capture() && board.see(mv) < 0 {
                                self.bad_noisy.push(mv);
                                continue;
                            }

                            return Some(mv);
                        }
                        None => {
                            self.stage = match () {
                                _ if self.in_check => Stage::Done,
                                _ if self.qsearch && self.with_checks => Stage::GenerateQuiet,
                                _ if self.qsearch => Stage::BadNoisy,
                                _ => Stage::Killers,
                            };
                        }
                    }
                }

                Stage::Killers => {
                    if self.killer_index == self.killers.len() {
                        self.stage = Stage::GenerateQuiet;
                        continue;
                    }

                    let killer = self.killers[self.killer_index];
                    self.killer_index += 1;

                    if killer != Move::NONE
                        && killer != self.tt_move
                        && !killer.is_noisy()
                        && board.is_pseudo_legal(killer)
                        && board.is_legal(killer)
                    {
                        return Some(killer);
                    }
                }

                Stage::GenerateQuiet => {
                    self.quiets = board.generate_quiet_moves();
                    self.score_quiets(board, history);
                    self.stage = Stage::Quiet;
                }

                Stage::Quiet => match self.select_best_quiet() {
                    Some(mv) => {
                        if mv == self.tt_move || self.killers.contains(&mv) || !board.is_legal(mv) {
                            continue;
                        }

                        // In the checks-included quiescence stage only the
                        // checking quiet moves are searched.
                        if self.qsearch && !board.gives_check(mv) {
                            continue;
                        }

                        return Some(mv);
                    }
                    None => self.stage = Stage::BadNoisy,
                },

                Stage::BadNoisy => {
                    if self.bad_index == self.bad_noisy.len() {
                        self.stage = Stage::Done;
                        continue;
                    }

                    let mv = self.bad_noisy[self.bad_index];
                    self.bad_index += 1;
                    return Some(mv);
                }

                Stage::Done => return None,
            }
        }
    }

    /// Hands the not-yet-consumed moves to a split point as one scored batch.
    pub fn drain(&mut self, board: &Board, history: &History) -> Vec<Move> {
        let mut moves = Vec::new();
        while let Some(mv) = self.next(board, history) {
            moves.push(mv);
        }
        moves
    }

    fn accepts(&self, board: &Board, tt_move: Move) -> bool {
        if !board.is_pseudo_legal(tt_move) {
            return false;
        }
        if !self.qsearch || self.in_check {
            return true;
        }
        tt_move.is_noisy() || (self.with_checks && board.gives_check(tt_move))
    }

    fn score_noisy(&mut self, board: &Board, history: &History) {
        for entry in self.noisy.iter_mut() {
            let mv = entry.mv;

            if mv.is_capture() || mv.is_promotion() {
                let captured = match () {
                    _ if mv.is_en_passant() => PieceType::Pawn,
                    _ if mv.is_capture() => board.piece_on(mv.to()).piece_type(),
                    _ => PieceType::None,
                };

                entry.score = 1 << 20;
                if captured != PieceType::None {
                    entry.score += PIECE_VALUES[captured] * 32 - board.piece_on(mv.from()).piece_type() as i32;
                }
                if mv.promotion_piece() == PieceType::Queen {
                    entry.score += PIECE_VALUES[PieceType::Queen];
                }
            } else {
                // Quiet evasions, present only when in check.
                entry.score = history.value(board.piece_on(mv.from()), mv.to());
            }
        }
    }

    fn score_quiets(&mut self, board: &Board, history: &History) {
        for entry in self.quiets.iter_mut() {
            entry.score = history.value(board.piece_on(entry.mv.from()), entry.mv.to());
        }
    }

    fn select_best_noisy(&mut self) -> Option<Move> {
        select_best(&mut self.noisy)
    }

    fn select_best_quiet(&mut self) -> Option<Move> {
        select_best(&mut self.quiets)
    }
}

fn select_best(list: &mut MoveList) -> Option<Move> {
    if list.is_empty() {
        return None;
    }

    let mut best = 0;
    for index in 1..list.len() {
        if list[index].score > list[best].score {
            best = index;
        }
    }

    Some(list.remove(best))
}
