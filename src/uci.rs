use std::sync::atomic::Ordering;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

use crate::{
    board::Board,
    search::{self, GoParams},
    thread::{SharedContext, ThreadData, DEFAULT_THREADS, MAX_THREADS},
    timeman::Limits,
    transposition::{DEFAULT_TT_SIZE, MAX_TT_SIZE, MIN_TT_SIZE},
    types::{Color, Move},
};

/// Engine options settable through `setoption`.
#[derive(Clone)]
pub struct Options {
    pub multi_pv: usize,
    pub skill_level: i32,
    pub own_book: bool,
    pub book_file: String,
    pub best_book_move: bool,
    pub use_search_log: bool,
    pub search_log_filename: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            multi_pv: 1,
            skill_level: 20,
            own_book: false,
            book_file: String::from("book.txt"),
            best_book_move: true,
            use_search_log: false,
            search_log_filename: String::from("search.log"),
        }
    }
}

/// The UCI message loop. A dedicated reader thread owns stdin and feeds a
/// channel, so the search can poll for `stop` without blocking on input.
pub fn message_loop() {
    let shared = Arc::new(SharedContext::new());
    shared.set_threads(DEFAULT_THREADS);

    let (sender, receiver) = channel::<String>();
    std::thread::Builder::new()
        .name(String::from("tempest-stdin"))
        .spawn(move || {
            let mut buffer = String::new();
            loop {
                buffer.clear();
                match std::io::stdin().read_line(&mut buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if sender.send(buffer.clone()).is_err() {
                            break;
                        }
                    }
                }
            }
        })
        .expect("failed to spawn the input reader");

    let mut td = ThreadData::new(0, Arc::clone(&shared));
    td.input = Some(receiver);

    let mut board = Board::starting_position();
    let mut game_moves: Option<Vec<String>> = Some(Vec::new());
    let mut options = Options::default();

    loop {
        let command = {
            let Some(input) = td.input.as_ref() else { return };
            match input.recv() {
                Ok(command) => command,
                Err(_) => return,
            }
        };

        let tokens: Vec<&str> = command.split_whitespace().collect();
        match tokens.as_slice() {
            ["uci"] => identify(),
            ["isready"] => println!("readyok"),

            ["position", rest @ ..] => position(&mut board, &mut game_moves, rest),
            ["go", rest @ ..] => {
                let params = parse_go(board.side_to_move(), &board, rest);
                td.board = board.clone();
                let keep_running = search::think(&mut td, params, &options, game_moves.as_deref());
                if !keep_running {
                    return;
                }
            }
            ["setoption", rest @ ..] => set_option(&shared, &mut options, rest),
            ["ucinewgame"] => {
                board = Board::starting_position();
                game_moves = Some(Vec::new());
                shared.tt.clear(shared.pool.threads());
                shared.history.clear();
            }

            // The search consumes stop/ponderhit itself while running;
            // anything arriving here is safely idempotent.
            ["stop"] => shared.set_stop(true),
            ["ponderhit"] => shared.ponder.store(false, Ordering::Relaxed),

            ["quit"] => return,

            // Non-UCI conveniences.
            ["perft", depth] => {
                if let Ok(depth) = depth.parse() {
                    let nodes = board.perft(depth);
                    println!("perft {depth}: {nodes}");
                }
            }
            ["bench"] => bench(&shared),

            _ => {
                if !tokens.is_empty() {
                    eprintln!("Unknown command: '{}'", command.trim_end());
                }
            }
        }
    }
}

fn identify() {
    println!("id name Tempest {}", env!("CARGO_PKG_VERSION"));
    println!("id author the Tempest developers");
    println!("option name Hash type spin default {DEFAULT_TT_SIZE} min {MIN_TT_SIZE} max {MAX_TT_SIZE}");
    println!("option name Clear Hash type button");
    println!("option name Threads type spin default {DEFAULT_THREADS} min 1 max {MAX_THREADS}");
    println!("option name MultiPV type spin default 1 min 1 max 64");
    println!("option name Skill Level type spin default 20 min 0 max 20");
    println!("option name Ponder type check default true");
    println!("option name OwnBook type check default false");
    println!("option name Book File type string default book.txt");
    println!("option name Best Book Move type check default true");
    println!("option name Use Search Log type check default false");
    println!("option name Search Log Filename type string default search.log");
    println!("uciok");
}

fn position(board: &mut Board, game_moves: &mut Option<Vec<String>>, mut tokens: &[&str]) {
    loop {
        match tokens {
            ["startpos", rest @ ..] => {
                *board = Board::starting_position();
                *game_moves = Some(Vec::new());
                tokens = rest;
            }
            ["fen", rest @ ..] if rest.len() >= 2 => {
                let take = rest.iter().take_while(|&&token| token != "moves").count();
                match Board::new(&rest[..take].join(" ")) {
                    Ok(parsed) => {
                        *board = parsed;
                        *game_moves = None;
                    }
                    Err(error) => {
                        eprintln!("info string invalid fen: {error:#}");
                        return;
                    }
                }
                tokens = &rest[take..];
            }
            ["moves", rest @ ..] => {
                for uci_move in rest {
                    if !apply_uci_move(board, uci_move) {
                        break;
                    }
                    if let Some(moves) = game_moves.as_mut() {
                        moves.push(uci_move.to_string());
                    }
                }
                break;
            }
            _ => break,
        }
    }
}

fn apply_uci_move(board: &mut Board, uci_move: &str) -> bool {
    let candidate = board
        .generate_all_moves()
        .iter()
        .map(|entry| entry.mv)
        .find(|mv| mv.to_string() == uci_move && board.is_legal(*mv));

    match candidate {
        Some(mv) => {
            board.make_move(mv);
            true
        }
        None => {
            eprintln!("info string illegal move '{uci_move}'");
            false
        }
    }
}

fn set_option(shared: &Arc<SharedContext>, options: &mut Options, tokens: &[&str]) {
    let tokens = tokens.to_vec();
    let Some(split) = tokens.iter().position(|&token| token == "value") else {
        if let ["name", "Clear", "Hash"] = tokens.as_slice() {
            shared.tt.clear(shared.pool.threads());
        }
        return;
    };

    let name = tokens[1..split].join(" ");
    let value = tokens[split + 1..].join(" ");

    match name.as_str() {
        "Hash" => {
            if let Ok(megabytes) = value.parse() {
                shared.tt.resize(shared.pool.threads(), megabytes);
            }
        }
        "Threads" => {
            if let Ok(count) = value.parse() {
                shared.set_threads(count);
            }
        }
        "MultiPV" => {
            if let Ok(count) = value.parse::<usize>() {
                options.multi_pv = count.clamp(1, 64);
            }
        }
        "Skill Level" => {
            if let Ok(level) = value.parse::<i32>() {
                options.skill_level = level.clamp(0, 20);
            }
        }
        "Ponder" => (),
        "OwnBook" => options.own_book = value == "true",
        "Book File" => options.book_file = value,
        "Best Book Move" => options.best_book_move = value == "true",
        "Use Search Log" => options.use_search_log = value == "true",
        "Search Log Filename" => options.search_log_filename = value,
        _ => eprintln!("Unknown option: '{name}'"),
    }
}

fn parse_go(color: Color, board: &Board, tokens: &[&str]) -> GoParams {
    let mut limits = Limits::default();
    let mut search_moves = Vec::new();

    let mut index = 0;
    while index < tokens.len() {
        let name = tokens[index];
        index += 1;

        match name {
            "infinite" => limits.infinite = true,
            "ponder" => limits.ponder = true,
            "searchmoves" => {
                while index < tokens.len() {
                    match find_move(board, tokens[index]) {
                        Some(mv) => search_moves.push(mv),
                        None => break,
                    }
                    index += 1;
                }
            }
            _ => {
                let Some(value) = tokens.get(index).and_then(|token| token.parse::<i64>().ok()) else {
                    continue;
                };
                index += 1;

                match name {
                    "depth" => limits.max_depth = value as i32,
                    "nodes" => limits.max_nodes = value as u64,
                    "movetime" => limits.max_time = value,
                    "movestogo" => limits.moves_to_go = value as i32,
                    "wtime" if color == Color::White => limits.time = value,
                    "btime" if color == Color::Black => limits.time = value,
                    "winc" if color == Color::White => limits.increment = value,
                    "binc" if color == Color::Black => limits.increment = value,
                    _ => (),
                }
            }
        }
    }

    GoParams { limits, search_moves }
}

fn find_move(board: &Board, uci_move: &str) -> Option<Move> {
    board.generate_all_moves().iter().map(|entry| entry.mv).find(|mv| mv.to_string() == uci_move)
}

/// Fixed-depth sweep over a handful of positions; a quick sanity and
/// regression check, not a tournament.
fn bench(shared: &Arc<SharedContext>) {
    const BENCH_DEPTH: i32 = 8;
    const POSITIONS: [&str; 4] = [
        Board::START_FEN,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    ];

    let mut total = 0u64;
    let start = std::time::Instant::now();

    for fen in POSITIONS {
        let mut td = ThreadData::new(0, Arc::clone(shared));
        td.board = Board::new(fen).unwrap();

        let params = GoParams {
            limits: Limits { max_depth: BENCH_DEPTH, ..Limits::default() },
            search_moves: Vec::new(),
        };
        search::think(&mut td, params, &Options::default(), None);
        total += shared.nodes.load(Ordering::Relaxed);
    }

    let elapsed = start.elapsed().as_millis().max(1) as u64;
    println!("bench: {total} nodes {} nps", total * 1000 / elapsed);
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_go_parse {
        ($($name:ident: $input:expr, $check:expr,)*) => {$(
            #[test]
            fn $name() {
                let board = Board::starting_position();
                let tokens: Vec<&str> = $input.split_whitespace().collect();
                let params = parse_go(Color::White, &board, &tokens);
                let check: fn(&GoParams) -> bool = $check;
                assert!(check(&params));
            }
        )*};
    }

    assert_go_parse!(
        go_infinite: "infinite", |p| p.limits.infinite,
        go_movetime: "movetime 5000", |p| p.limits.max_time == 5000,
        go_depth: "depth 10", |p| p.limits.max_depth == 10,
        go_nodes: "nodes 40000", |p| p.limits.max_nodes == 40_000,
        go_clock: "wtime 60000 btime 50000 winc 1000 binc 900 movestogo 24",
            |p| p.limits.time == 60_000 && p.limits.increment == 1000 && p.limits.moves_to_go == 24,
        go_other_side_clock: "btime 50000 binc 900", |p| p.limits.time == 0 && p.limits.increment == 0,
        go_searchmoves: "searchmoves e2e4 d2d4", |p| p.search_moves.len() == 2,
        go_ponder: "ponder wtime 1000", |p| p.limits.ponder && p.limits.time == 1000,
    );

    #[test]
    fn position_tracks_game_moves() {
        let mut board = Board::starting_position();
        let mut game_moves = Some(Vec::new());

        position(&mut board, &mut game_moves, &["startpos", "moves", "e2e4", "e7e5"]);
        assert_eq!(game_moves.as_ref().unwrap().len(), 2);
        assert_eq!(board.side_to_move(), Color::White);

        position(&mut board, &mut game_moves, &["fen", "8/8/8/8/8/8/8/K1k5", "w", "-", "-", "0", "1"]);
        assert!(game_moves.is_none());
    }

    #[test]
    fn illegal_position_moves_stop_the_sequence() {
        let mut board = Board::starting_position();
        let mut game_moves = Some(Vec::new());

        position(&mut board, &mut game_moves, &["startpos", "moves", "e2e4", "e2e4"]);
        assert_eq!(game_moves.as_ref().unwrap().len(), 1);
    }
}
