use super::Board;
use crate::{
    lookup::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks},
    types::{Bitboard, CastlingKind, Color, MoveKind, MoveList, PieceType, Rank, Square},
};

const QUIET: u8 = 0;
const NOISY: u8 = 1;

impl Board {
    /// Generates all pseudo-legal moves for the current position.
    pub fn generate_all_moves(&self) -> MoveList {
        let mut list = MoveList::new();
        self.collect_moves::<NOISY>(&mut list);
        self.collect_moves::<QUIET>(&mut list);
        list
    }

    /// Generates pseudo-legal captures, en passant and promotions only.
    pub fn generate_noisy_moves(&self) -> MoveList {
        let mut list = MoveList::new();
        self.collect_moves::<NOISY>(&mut list);
        list
    }

    /// Generates pseudo-legal quiet moves only.
    pub fn generate_quiet_moves(&self) -> MoveList {
        let mut list = MoveList::new();
        self.collect_moves::<QUIET>(&mut list);
        list
    }

    pub fn has_legal_moves(&self) -> bool {
        self.generate_all_moves().iter().any(|entry| self.is_legal(entry.mv))
    }

    fn collect_moves<const TYPE: u8>(&self, list: &mut MoveList) {
        let occupancies = self.occupancies();

        self.collect_pawn_moves::<TYPE>(list);

        for piece_type in [PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen, PieceType::King] {
            for from in self.our(piece_type) {
                let targets = match piece_type {
                    PieceType::Knight => knight_attacks(from),
                    PieceType::Bishop => bishop_attacks(from, occupancies),
                    PieceType::Rook => rook_attacks(from, occupancies),
                    PieceType::Queen => bishop_attacks(from, occupancies) | rook_attacks(from, occupancies),
                    _ => king_attacks(from),
                };

                if TYPE == NOISY {
                    list.add_many(from, targets & self.them(), MoveKind::Capture);
                } else {
                    list.add_many(from, targets & !occupancies, MoveKind::Normal);
                }
            }
        }

        if TYPE == QUIET {
            self.collect_castling(list);
        }
    }

    fn collect_pawn_moves<const TYPE: u8>(&self, list: &mut MoveList) {
        let us = self.side_to_move;
        let pawns = self.our(PieceType::Pawn);
        let empty = !self.occupancies();
        let forward = us.forward();

        let (promotion_rank, double_push_rank) = match us {
            Color::White => (Bitboard::rank(Rank::R7), Bitboard::rank(Rank::R3)),
            Color::Black => (Bitboard::rank(Rank::R2), Bitboard::rank(Rank::R6)),
        };

        if TYPE == QUIET {
            let single_pushes = (pawns & !promotion_rank).shift(forward) & empty;
            for to in single_pushes {
                list.add(to.offset(-forward), to, MoveKind::Normal);
            }

            let double_pushes = (single_pushes & double_push_rank).shift(forward) & empty;
            for to in double_pushes {
                list.add(to.offset(-2 * forward), to, MoveKind::DoublePush);
            }

            // Underpromotions are ordered with the quiet moves.
            for to in (pawns & promotion_rank).shift(forward) & empty {
                let from = to.offset(-forward);
                list.add(from, to, MoveKind::PromotionR);
                list.add(from, to, MoveKind::PromotionB);
                list.add(from, to, MoveKind::PromotionN);
            }

            return;
        }

        for to in (pawns & promotion_rank).shift(forward) & empty {
            list.add(to.offset(-forward), to, MoveKind::PromotionQ);
        }

        for from in pawns & promotion_rank {
            for to in pawn_attacks(from, us) & self.them() {
                list.add(from, to, MoveKind::PromotionCaptureQ);
                list.add(from, to, MoveKind::PromotionCaptureR);
                list.add(from, to, MoveKind::PromotionCaptureB);
                list.add(from, to, MoveKind::PromotionCaptureN);
            }
        }

        for from in pawns & !promotion_rank {
            for to in pawn_attacks(from, us) & self.them() {
                list.add(from, to, MoveKind::Capture);
            }
        }

        if self.state.en_passant != Square::NONE {
            for from in pawns & pawn_attacks(self.state.en_passant, !us) {
                list.add(from, self.state.en_passant, MoveKind::EnPassant);
            }
        }
    }

    fn collect_castling(&self, list: &mut MoveList) {
        let kinds = match self.side_to_move {
            Color::White => [CastlingKind::WhiteKingside, CastlingKind::WhiteQueenside],
            Color::Black => [CastlingKind::BlackKingside, CastlingKind::BlackQueenside],
        };

        for kind in kinds {
            if self.state.castling.allows(kind) && self.castling_is_pseudo_legal(kind.landing_square()) {
                list.add(self.king_square(self.side_to_move), kind.landing_square(), MoveKind::Castling);
            }
        }
    }

    /// Counts the leaf nodes of the legal move tree to the given depth.
    pub fn perft(&mut self, depth: usize) -> u64 {
        let mut nodes = 0;

        for entry in self.generate_all_moves().iter() {
            if !self.is_legal(entry.mv) {
                continue;
            }

            if depth <= 1 {
                nodes += 1;
                continue;
            }

            self.make_move(entry.mv);
            nodes += self.perft(depth - 1);
            self.undo_move();
        }

        nodes
    }
}
