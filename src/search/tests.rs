use super::*;
use crate::thread::SharedContext;
use crate::timeman::Limits;

fn new_thread(fen: &str, shared: &Arc<SharedContext>) -> ThreadData {
    let mut td = ThreadData::new(0, Arc::clone(shared));
    td.board = Board::new(fen).unwrap();
    td.limits = Limits { infinite: true, ..Limits::default() };
    td.stack[-1].eval = Score::NONE;
    td.root_moves.init(&td.board, &[]);
    td
}

/// Runs a plain fixed-depth iterative search, full window at the root.
fn fixed_depth_search(fen: &str, depth: i32) -> (i32, Vec<Move>) {
    let shared = Arc::new(SharedContext::new());
    let mut td = new_thread(fen, &shared);
    assert!(!td.root_moves.is_empty(), "no legal moves in {fen}");

    let mut value = 0;
    for d in 1..=depth {
        value = search_node::<true, false, true>(&mut td, -Score::INFINITE, Score::INFINITE, d * ONE_PLY);
        td.root_moves.sort();
    }

    (value, td.root_moves[0].pv.clone())
}

#[test]
fn starting_position_is_roughly_equal() {
    let (value, pv) = fixed_depth_search(Board::START_FEN, 1);

    assert!(value.abs() <= 50, "unexpected startpos score {value}");
    assert!(!pv.is_empty());
}

#[test]
fn principal_variation_is_playable() {
    let (_, pv) = fixed_depth_search(Board::START_FEN, 5);
    let mut board = Board::starting_position();

    assert!(!pv.is_empty());
    for &mv in &pv {
        let found = board.generate_all_moves().iter().any(|entry| entry.mv == mv && board.is_legal(mv));
        assert!(found, "PV move {mv} is not legal");
        board.make_move(mv);
    }
}

#[test]
fn finds_the_queen_mate_in_one() {
    // One ply before the fool's mate: Qh4 ends it.
    let (value, pv) = fixed_depth_search("rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2", 2);

    assert_eq!(value, mate_in(1));
    assert_eq!(uci_value(value), "mate 1");
    assert_eq!(pv[0].to_string(), "d8h4");
}

#[test]
fn mated_position_has_no_root_moves() {
    // The fool's mate itself: the side to move is already checkmated.
    let shared = Arc::new(SharedContext::new());
    let td = new_thread("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3", &shared);

    assert!(td.root_moves.is_empty());
    assert!(td.board.in_check());
}

#[test]
fn finds_a_forced_mate_in_three() {
    // KRK ladder: 1.Kg6 Kg8 2.Rf2 (any rook wait) Kh8 3.Rf8#.
    let (value, pv) = fixed_depth_search("7k/8/8/6K1/8/8/8/5R2 w - - 0 1", 6);

    assert_eq!(value, mate_in(5));
    assert_eq!(uci_value(value), "mate 3");
    assert!(pv.len() >= 5, "mating PV too short: {pv:?}");
}

#[test]
fn stalemate_reports_a_draw_without_a_best_move() {
    let shared = Arc::new(SharedContext::new());
    let mut td = new_thread("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", &shared);
    assert!(td.root_moves.is_empty());
    assert!(!td.board.in_check());

    // The full driver must handle it without crashing.
    let params = GoParams { limits: Limits { max_depth: 2, ..Limits::default() }, search_moves: Vec::new() };
    assert!(think(&mut td, params, &Options::default(), None));
}

#[test]
fn zugzwang_is_not_a_false_win() {
    let (value, _) = fixed_depth_search("8/8/p1p5/1p5p/1P5p/8/PPP2K1p/4R1rk w - - 0 1", 10);

    assert!(value.abs() < Score::KNOWN_WIN, "verification search failed to veto the null-move win: {value}");
}

#[test]
fn research_inside_the_returned_window_is_consistent() {
    let shared = Arc::new(SharedContext::new());
    let mut td = new_thread(Board::START_FEN, &shared);

    let mut value = 0;
    for d in 1..=4 {
        value = search_node::<true, false, true>(&mut td, -Score::INFINITE, Score::INFINITE, d * ONE_PLY);
        td.root_moves.sort();
    }

    let again = search_node::<true, false, true>(&mut td, value - 1, value + 1, 4 * ONE_PLY);
    td.root_moves.sort();

    assert!((again - value).abs() <= 1, "full-window {value} vs aspiration {again}");
}

#[test]
fn null_window_classifies_like_the_full_window() {
    const FEN: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    let shared = Arc::new(SharedContext::new());
    let mut td = new_thread(FEN, &shared);

    let mut value = 0;
    for d in 1..=3 {
        value = search_node::<true, false, true>(&mut td, -Score::INFINITE, Score::INFINITE, d * ONE_PLY);
        td.root_moves.sort();
    }

    let fail_low = search_node::<true, false, true>(&mut td, value, value + 1, 3 * ONE_PLY);
    td.root_moves.sort();
    assert!(fail_low <= value, "[v, v+1] must fail low: {fail_low} vs {value}");

    let fail_high = search_node::<true, false, true>(&mut td, value - 1, value, 3 * ONE_PLY);
    td.root_moves.sort();
    assert!(fail_high >= value, "[v-1, v] must fail high: {fail_high} vs {value}");
}

#[test]
fn multipv_scores_are_ordered() {
    let shared = Arc::new(SharedContext::new());
    let mut td = new_thread("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1", &shared);
    td.multi_pv = 3;

    for d in 1..=4 {
        search_node::<true, false, true>(&mut td, -Score::INFINITE, Score::INFINITE, d * ONE_PLY);
        td.root_moves.sort();
    }

    assert!(td.root_moves[0].pv_score >= td.root_moves[1].pv_score);
    assert!(td.root_moves[1].pv_score >= td.root_moves[2].pv_score);
    assert_ne!(td.root_moves[0].mv(), td.root_moves[1].mv());
    assert_ne!(td.root_moves[1].mv(), td.root_moves[2].mv());
}

#[test]
fn parallel_search_joins_cleanly() {
    let shared = Arc::new(SharedContext::new());
    shared.set_threads(3);

    let mut td = new_thread("r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10", &shared);

    let mut value = 0;
    for d in 1..=7 {
        value = search_node::<true, false, true>(&mut td, -Score::INFINITE, Score::INFINITE, d * ONE_PLY);
        td.root_moves.sort();
    }

    assert!(value.abs() <= Score::MATE);
    assert!(!td.root_moves[0].pv.is_empty());
    assert!(td.sp_chain.is_empty());
}

#[test]
fn tt_value_round_trip() {
    for ply in [0usize, 1, 5, 42, 99] {
        for value in [0, 17, -250, Score::KNOWN_WIN - 1, mate_in(3), mated_in(7), mate_in(90), mated_in(90)] {
            assert_eq!(value_from_tt(value_to_tt(value, ply), ply), value);
        }
    }
}

#[test]
fn score_encoding_for_uci() {
    assert_eq!(uci_value(0), "cp 0");
    assert_eq!(uci_value(64), "cp 64");
    assert_eq!(uci_value(-121), "cp -121");
    assert_eq!(uci_value(mate_in(5)), "mate 3");
    assert_eq!(uci_value(mate_in(1)), "mate 1");
    assert_eq!(uci_value(mated_in(4)), "mate -2");
}

#[test]
fn search_log_records_the_search() {
    use std::io::Read;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("search.log");

    let shared = Arc::new(SharedContext::new());
    let mut td = new_thread(Board::START_FEN, &shared);

    let options = Options {
        use_search_log: true,
        search_log_filename: path.to_str().unwrap().to_string(),
        ..Options::default()
    };
    let params = GoParams { limits: Limits { max_depth: 3, ..Limits::default() }, search_moves: Vec::new() };
    assert!(think(&mut td, params, &options, None));

    let mut contents = String::new();
    std::fs::File::open(&path).unwrap().read_to_string(&mut contents).unwrap();

    assert!(contents.contains("Searching:"));
    assert!(contents.contains("depth 1"));
    assert!(contents.contains("Best move:"));
}

#[test]
fn skill_level_stays_inside_the_candidate_set() {
    let shared = Arc::new(SharedContext::new());
    let mut td = new_thread("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1", &shared);
    td.multi_pv = 4;

    for d in 1..=4 {
        search_node::<true, false, true>(&mut td, -Score::INFINITE, Score::INFINITE, d * ONE_PLY);
        td.root_moves.sort();
    }

    let mut rng = SmallRng::seed_from_u64(42);
    for skill in [0, 5, 10, 19] {
        let (best, _) = do_skill_level(&td, skill, &mut rng);
        let candidates: Vec<Move> = td.root_moves.moves.iter().take(4).map(|rm| rm.mv()).collect();
        assert!(candidates.contains(&best), "skill {skill} picked a non-candidate move");
    }
}

#[test]
fn excluded_move_sentinels_never_match_real_moves() {
    let board = Board::starting_position();
    for entry in board.generate_all_moves().iter() {
        assert!(!entry.mv.is_sentinel());
        assert_ne!(entry.mv, Move::PAWN);
        assert_ne!(entry.mv, Move::NULL);
    }
}
