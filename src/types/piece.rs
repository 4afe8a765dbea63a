use super::{macros::impl_array_index, Color};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Debug)]
#[repr(u8)]
pub enum PieceType {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
    None,
}

impl PieceType {
    pub const NUM: usize = 6;

    pub const fn new(index: u8) -> Self {
        unsafe { std::mem::transmute(index) }
    }

    pub const fn is_slider(self) -> bool {
        matches!(self, PieceType::Bishop | PieceType::Rook | PieceType::Queen)
    }
}

/// A colored piece; the color lives in the low bit.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Piece(u8);

impl Piece {
    pub const NUM: usize = 12;

    pub const NONE: Self = Self(12);

    pub const fn new(color: Color, piece_type: PieceType) -> Self {
        Self((piece_type as u8) << 1 | color as u8)
    }

    pub const fn piece_type(self) -> PieceType {
        PieceType::new(self.0 >> 1)
    }

    pub const fn color(self) -> Color {
        unsafe { std::mem::transmute(self.0 & 1) }
    }

    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }

    pub fn from_fen(ch: char) -> Option<Self> {
        let piece_type = match ch.to_ascii_lowercase() {
            'p' => PieceType::Pawn,
            'n' => PieceType::Knight,
            'b' => PieceType::Bishop,
            'r' => PieceType::Rook,
            'q' => PieceType::Queen,
            'k' => PieceType::King,
            _ => return None,
        };
        let color = if ch.is_ascii_uppercase() { Color::White } else { Color::Black };
        Some(Self::new(color, piece_type))
    }

    pub const fn to_fen(self) -> char {
        let ch = match self.piece_type() {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
            PieceType::None => '.',
        };
        match self.color() {
            Color::White => ch.to_ascii_uppercase(),
            Color::Black => ch,
        }
    }
}

impl From<Piece> for usize {
    fn from(piece: Piece) -> Self {
        piece.0 as usize
    }
}

impl From<PieceType> for usize {
    fn from(piece_type: PieceType) -> Self {
        piece_type as usize
    }
}

impl_array_index!(Piece);
impl_array_index!(PieceType);
