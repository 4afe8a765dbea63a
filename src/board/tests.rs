use super::Board;
use crate::types::{Color, PieceType, Square};

macro_rules! assert_perft {
    ($($name:ident: $fen:tt, [$($nodes:expr),*],)*) => {$(
        #[test]
        fn $name() {
            let mut board = Board::new($fen).unwrap();
            for (depth, &nodes) in [$($nodes),*].iter().enumerate() {
                assert_eq!(board.perft(depth + 1), nodes, "perft({}) of {}", depth + 1, $fen);
            }
        }
    )*};
}

// Test cases from https://www.chessprogramming.org/Perft_Results
assert_perft!(
    starting_position: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", [20, 400, 8902, 197281],
    kiwipete: "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1", [48, 2039, 97862],
    position_3: "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", [14, 191, 2812, 43238],
    position_4: "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1", [6, 264, 9467, 422333],
    position_5: "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8", [44, 1486, 62379],
    position_6: "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10", [46, 2079, 89890],
);

#[test]
#[ignore = "slow; run with cargo test -- --ignored"]
fn perft_starting_position_deep() {
    let mut board = Board::starting_position();
    assert_eq!(board.perft(5), 4_865_609);
}

#[test]
fn fen_round_trip() {
    for fen in [
        Board::START_FEN,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 b - - 3 17",
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
    ] {
        assert_eq!(Board::new(fen).unwrap().fen(), fen);
    }
}

#[test]
fn make_undo_restores_the_key() {
    let mut board = Board::starting_position();
    let original = board.key();

    for entry in board.clone().generate_all_moves().iter() {
        if !board.is_legal(entry.mv) {
            continue;
        }
        board.make_move(entry.mv);
        assert_ne!(board.key(), original);
        board.undo_move();
        assert_eq!(board.key(), original);
        assert_eq!(board.fen(), Board::START_FEN);
    }
}

#[test]
fn null_move_flips_only_the_side() {
    let mut board: Board = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".parse().unwrap();
    let key = board.key();

    board.make_null_move();
    assert_eq!(board.side_to_move(), Color::White);
    assert_eq!(board.en_passant(), Square::NONE);
    assert_ne!(board.key(), key);

    board.undo_null_move();
    assert_eq!(board.key(), key);
    assert_eq!(board.en_passant(), Square::new(20));
}

#[test]
fn detects_checks_and_checkmate_positions() {
    let in_check: Board = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3".parse().unwrap();
    assert!(in_check.in_check());
    assert!(!in_check.has_legal_moves());

    let stalemate: Board = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1".parse().unwrap();
    assert!(!stalemate.in_check());
    assert!(!stalemate.has_legal_moves());
}

#[test]
fn gives_check_matches_make_move() {
    let fens = [
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "4k3/8/8/8/8/8/8/3QK3 w - - 0 1",
    ];

    for fen in fens {
        let mut board = Board::new(fen).unwrap();
        for entry in board.clone().generate_all_moves().iter() {
            if !board.is_legal(entry.mv) {
                continue;
            }
            let predicted = board.gives_check(entry.mv);
            board.make_move(entry.mv);
            assert_eq!(predicted, board.in_check(), "gives_check({}) in {}", entry.mv, fen);
            board.undo_move();
        }
    }
}

#[test]
fn repetition_is_a_draw() {
    let mut board = Board::starting_position();

    for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
        assert!(!board.is_draw());
        let mv = board.generate_all_moves().iter().map(|e| e.mv).find(|m| m.to_string() == uci).unwrap();
        board.make_move(mv);
    }

    // The starting position occurred before: one repetition suffices in
    // the search.
    assert!(board.is_draw());
}

#[test]
fn insufficient_material_is_a_draw() {
    let bare_kings: Board = "8/8/4k3/8/8/3K4/8/8 w - - 0 1".parse().unwrap();
    assert!(bare_kings.is_draw());

    let lone_knight: Board = "8/8/4k3/8/5N2/3K4/8/8 w - - 0 1".parse().unwrap();
    assert!(lone_knight.is_draw());

    let rook_ending: Board = "8/8/4k3/8/5R2/3K4/8/8 w - - 0 1".parse().unwrap();
    assert!(!rook_ending.is_draw());
}

#[test]
fn see_signs_are_sensible() {
    let board: Board = "1k1r4/1pp4p/p7/4p3/8/P5P1/1PP4P/2K1R3 w - - 0 1".parse().unwrap();
    let rxe5 = board.generate_all_moves().iter().map(|e| e.mv).find(|m| m.to_string() == "e1e5").unwrap();
    assert!(board.see(rxe5) > 0);

    let defended: Board = "1k1r3q/1ppn3p/p4b2/4p3/8/P2N2P1/1PP1R1BP/2K1Q3 w - - 0 1".parse().unwrap();
    let nxe5 = defended.generate_all_moves().iter().map(|e| e.mv).find(|m| m.to_string() == "d3e5").unwrap();
    assert!(defended.see(nxe5) < 0);
}

#[test]
fn pseudo_legality_accepts_generated_moves_only(){
    let board: Board = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1".parse().unwrap();

    for entry in board.generate_all_moves().iter() {
        assert!(board.is_pseudo_legal(entry.mv), "{} should be pseudo legal", entry.mv);
    }

    use crate::types::{Move, MoveKind};
    let junk = [
        Move::new(Square::new(0), Square::new(63), MoveKind::Normal),
        Move::new(Square::new(28), Square::new(36), MoveKind::Capture),
        Move::NULL,
        Move::PAWN,
    ];
    for mv in junk {
        assert!(!board.is_pseudo_legal(mv), "{mv:?} should not be pseudo legal");
    }
}

#[test]
fn passed_pawn_detection() {
    let board: Board = "8/8/1k6/8/2P5/8/5p2/1K6 w - - 0 1".parse().unwrap();

    assert!(board.pawn_is_passed(Color::White, Square::new(26)));
    assert!(board.pawn_is_passed(Color::Black, Square::new(13)));

    let blocked: Board = "8/2p5/1k6/8/2P5/8/8/1K6 w - - 0 1".parse().unwrap();
    assert!(!blocked.pawn_is_passed(Color::White, Square::new(26)));
}

#[test]
fn non_pawn_material_counts_pieces() {
    let board = Board::starting_position();
    let expected = 2 * crate::parameters::KNIGHT_VALUE
        + 2 * crate::parameters::BISHOP_VALUE
        + 2 * crate::parameters::ROOK_VALUE
        + crate::parameters::QUEEN_VALUE;

    assert_eq!(board.non_pawn_material(Color::White), expected);
    assert_eq!(board.non_pawn_material(Color::Black), expected);

    let pawn_ending: Board = "4k3/pppp4/8/8/8/8/4PPPP/4K3 w - - 0 1".parse().unwrap();
    assert_eq!(pawn_ending.non_pawn_material(Color::White), 0);
}

#[test]
fn mailbox_matches_bitboards_after_promotions() {
    let mut board: Board = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8".parse().unwrap();
    let promotion =
        board.generate_all_moves().iter().map(|e| e.mv).find(|m| m.to_string() == "d7c8q").unwrap();

    board.make_move(promotion);
    assert_eq!(board.piece_on(Square::C8).piece_type(), PieceType::Queen);

    board.undo_move();
    assert_eq!(board.piece_on(Square::C8).piece_type(), PieceType::Bishop);
    assert_eq!(board.piece_on(Square::D7).piece_type(), PieceType::Pawn);
}
