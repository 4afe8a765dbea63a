use super::Board;
use crate::{
    parameters::PIECE_VALUES,
    types::{Bitboard, Move, PieceType},
};

impl Board {
    /// Static exchange evaluation: the material outcome of the capture
    /// sequence on the move's target square, assuming best play by both
    /// sides. Quiet moves evaluate the risk of the moved piece being won.
    pub fn see(&self, mv: Move) -> i32 {
        if mv.is_castling() {
            return 0;
        }

        let to = mv.to();
        let mut occupancies = self.occupancies();
        let mut side = self.side_to_move;
        let mut attacker = self.piece_on(mv.from()).piece_type();

        let mut gain = [0i32; 32];
        let mut depth = 0;

        gain[0] = match () {
            _ if mv.is_en_passant() => PIECE_VALUES[PieceType::Pawn],
            _ => {
                let captured = self.piece_on(to).piece_type();
                if captured == PieceType::None {
                    0
                } else {
                    PIECE_VALUES[captured]
                }
            }
        };

        if mv.is_en_passant() {
            occupancies.clear(to.offset(-side.forward()));
        }
        occupancies.clear(mv.from());

        loop {
            side = !side;

            // Sliders behind the previous attacker are discovered here
            // because the attack scan runs against the reduced occupancy.
            let attackers = self.attackers_to(to, occupancies) & occupancies;
            let ours = attackers & self.colors(side);
            if ours.is_empty() {
                break;
            }

            let (next_attacker, from) = least_valuable(self, ours);

            // A king cannot recapture into a defended square.
            if next_attacker == PieceType::King && (attackers & self.colors(!side)).any() {
                break;
            }

            depth += 1;
            gain[depth] = PIECE_VALUES[attacker] - gain[depth - 1];
            if gain[depth].max(-gain[depth - 1]) < 0 {
                break;
            }

            occupancies &= !from;
            attacker = next_attacker;

            if depth == 31 {
                break;
            }
        }

        while depth > 0 {
            gain[depth - 1] = -(-gain[depth - 1]).max(gain[depth]);
            depth -= 1;
        }

        gain[0]
    }
}

fn least_valuable(board: &Board, attackers: Bitboard) -> (PieceType, Bitboard) {
    for index in 0..PieceType::NUM {
        let piece_type = PieceType::new(index as u8);
        let candidates = attackers & board.pieces(piece_type);
        if candidates.any() {
            return (piece_type, candidates.lsb().to_bb());
        }
    }
    (PieceType::None, Bitboard::EMPTY)
}
