use anyhow::{bail, Context};

use super::{Board, State};
use crate::types::{Bitboard, CastlingKind, Color, Piece, PieceType, Square, ZOBRIST};

impl Board {
    /// Builds a board from a Forsyth-Edwards notation string.
    pub fn new(fen: &str) -> anyhow::Result<Self> {
        let mut parts = fen.split_whitespace();

        let placement = parts.next().context("missing piece placement")?;
        let side = parts.next().context("missing side to move")?;
        let castling = parts.next().unwrap_or("-");
        let en_passant = parts.next().unwrap_or("-");
        let halfmove = parts.next().unwrap_or("0");
        let fullmove = parts.next().unwrap_or("1");

        let mut board = Board {
            side_to_move: Color::White,
            pieces: [Bitboard::EMPTY; PieceType::NUM],
            colors: [Bitboard::EMPTY; Color::NUM],
            mailbox: [Piece::NONE; Square::NUM],
            state: State::default(),
            stack: Vec::with_capacity(256),
        };

        let mut rank = 7i32;
        let mut file = 0i32;
        for ch in placement.chars() {
            match ch {
                '/' => {
                    rank -= 1;
                    file = 0;
                }
                '1'..='8' => file += ch as i32 - '0' as i32,
                _ => {
                    let piece = Piece::from_fen(ch).with_context(|| format!("invalid piece '{ch}'"))?;
                    if !(0..8).contains(&rank) || !(0..8).contains(&file) {
                        bail!("piece placement runs off the board");
                    }
                    let square = Square::new((rank * 8 + file) as u8);
                    board.add_piece(piece.color(), piece.piece_type(), square);
                    file += 1;
                }
            }
        }

        board.side_to_move = match side {
            "w" => Color::White,
            "b" => Color::Black,
            _ => bail!("invalid side to move '{side}'"),
        };

        for ch in castling.chars() {
            match ch {
                'K' => board.state.castling.grant(CastlingKind::WhiteKingside),
                'Q' => board.state.castling.grant(CastlingKind::WhiteQueenside),
                'k' => board.state.castling.grant(CastlingKind::BlackKingside),
                'q' => board.state.castling.grant(CastlingKind::BlackQueenside),
                '-' => (),
                _ => bail!("invalid castling rights '{castling}'"),
            }
        }

        if en_passant != "-" {
            board.state.en_passant = en_passant.parse()?;
            board.state.key ^= ZOBRIST.en_passant[board.state.en_passant];
        }

        board.state.halfmove_clock = halfmove.parse().context("invalid halfmove clock")?;
        board.state.fullmove = fullmove.parse().context("invalid fullmove number")?;

        board.state.key ^= ZOBRIST.castling[board.state.castling];
        if board.side_to_move == Color::White {
            board.state.key ^= ZOBRIST.side;
        }

        if board.of(PieceType::King, Color::White).count() != 1 || board.of(PieceType::King, Color::Black).count() != 1 {
            bail!("each side must have exactly one king");
        }

        Ok(board)
    }

    /// The current position as a FEN string.
    pub fn fen(&self) -> String {
        let mut output = String::new();

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let piece = self.piece_on(Square::new(rank * 8 + file));
                if piece.is_none() {
                    empty += 1;
                    continue;
                }
                if empty > 0 {
                    output.push((b'0' + empty) as char);
                    empty = 0;
                }
                output.push(piece.to_fen());
            }
            if empty > 0 {
                output.push((b'0' + empty) as char);
            }
            if rank > 0 {
                output.push('/');
            }
        }

        let side = match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        };

        format!(
            "{output} {side} {} {} {} {}",
            self.state.castling, self.state.en_passant, self.state.halfmove_clock, self.state.fullmove
        )
    }
}

impl std::str::FromStr for Board {
    type Err = anyhow::Error;

    fn from_str(fen: &str) -> Result<Self, Self::Err> {
        Self::new(fen)
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.fen())
    }
}
