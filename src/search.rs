use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    board::Board,
    book::Book,
    evaluate::evaluate,
    lookup::{attacks, between, king_attacks, BORDER},
    movepick::MovePicker,
    parameters::*,
    thread::{self, SplitPoint, ThreadData, MIN_SPLIT_DEPTH},
    transposition::{Bound, Entry},
    types::{
        is_valid, mate_in, mated_in, Move, PieceType, Rank, Score, DEPTH_NONE, DEPTH_QS_CHECKS, DEPTH_QS_NO_CHECKS,
        DEPTH_ZERO, MAX_PLY, ONE_PLY,
    },
    uci::Options,
};

/// Everything `go` hands to the search besides the position.
pub struct GoParams {
    pub limits: crate::timeman::Limits,
    pub search_moves: Vec<Move>,
}

/// Entry point for a `go` command: probes the book, runs the iterative
/// deepening loop and prints `bestmove`. Returns `false` once `quit` has
/// been requested.
pub fn think(td: &mut ThreadData, params: GoParams, options: &Options, game_moves: Option<&[String]>) -> bool {
    let shared = Arc::clone(&td.shared);

    shared.set_stop(false);
    shared.stop_on_ponderhit.store(false, Ordering::Relaxed);
    shared.aspiration_fail_low.store(false, Ordering::Relaxed);
    shared.first_root_move.store(false, Ordering::Relaxed);
    shared.ponder.store(params.limits.ponder, Ordering::Relaxed);
    shared.nodes.store(0, Ordering::Relaxed);

    td.limits = params.limits;
    td.nodes_since_poll = 0;
    td.nodes_between_polls = match () {
        _ if td.limits.max_nodes > 0 => td.limits.max_nodes.min(30_000),
        _ if td.limits.time > 0 && td.limits.time < 1000 => 1000,
        _ if td.limits.time > 0 && td.limits.time < 5000 => 5000,
        _ => 30_000,
    };
    td.time_manager = crate::timeman::TimeManager::new(&td.limits);

    log::debug!("searching {}", td.board.fen());

    // Book probe before any search work. Positions set up from a FEN have
    // no move history and never hit the book.
    if options.own_book && !td.limits.infinite && td.limits.max_nodes == 0 {
        if let Some(moves) = game_moves {
            let book = Book::open(&options.book_file);
            if let Some(mv) = book.probe(&td.board, moves, options.best_book_move) {
                log::debug!("book move {mv}");
                if td.limits.ponder {
                    wait_for_stop_or_ponderhit(td);
                }
                println!("bestmove {mv}");
                return !shared.quit.load(Ordering::Relaxed);
            }
        }
    }

    let skill_enabled = options.skill_level < 20;
    td.multi_pv = if skill_enabled { options.multi_pv.max(4) } else { options.multi_pv };

    shared.tt.new_search();
    shared.history.clear();

    let mut log_file = if options.use_search_log {
        std::fs::OpenOptions::new().create(true).append(true).open(&options.search_log_filename).ok()
    } else {
        None
    };

    if let Some(file) = log_file.as_mut() {
        let _ = writeln!(
            file,
            "\nSearching: {}\ninfinite: {} ponder: {} time: {} increment: {} moves to go: {}",
            td.board.fen(),
            td.limits.infinite,
            td.limits.ponder,
            td.limits.time,
            td.limits.increment,
            td.limits.moves_to_go
        );
    }

    let (best_move, ponder_move) = id_loop(td, &params.search_moves, options, &mut log_file);

    let nodes = shared.nodes.load(Ordering::Relaxed);
    let time = td.time_manager.elapsed().max(1);
    println!("info nodes {nodes} nps {} time {time}", nodes as i64 * 1000 / time);

    if let Some(file) = log_file.as_mut() {
        let _ = writeln!(
            file,
            "Nodes: {nodes}\nNodes/second: {}\nBest move: {best_move}\nPonder move: {ponder_move}",
            nodes as i64 * 1000 / time
        );
    }

    // When pondering or in infinite mode the best move may not be printed
    // before the GUI asks for it.
    if !shared.stop_requested() && (td.limits.ponder || td.limits.infinite) {
        wait_for_stop_or_ponderhit(td);
    }

    if best_move == Move::NONE {
        println!("bestmove (none)");
    } else if ponder_move == Move::NONE {
        println!("bestmove {best_move}");
    } else {
        println!("bestmove {best_move} ponder {ponder_move}");
    }

    !shared.quit.load(Ordering::Relaxed)
}

/// The iterative deepening loop: repeats the root search with increasing
/// depth inside an aspiration window until time runs out or the target
/// depth is reached.
fn id_loop(
    td: &mut ThreadData, search_moves: &[Move], options: &Options, log_file: &mut Option<std::fs::File>,
) -> (Move, Move) {
    let shared = Arc::clone(&td.shared);

    td.stack.clear();
    td.ply = 0;
    // The sentinel frame makes the gains update a no-op at the root.
    td.stack[-1].eval = Score::NONE;

    td.root_moves.init(&td.board, search_moves);

    if td.root_moves.is_empty() {
        let value = if td.board.in_check() { -Score::MATE } else { Score::DRAW };
        println!("info depth 0 score {}", uci_value(value));
        return (Move::NONE, Move::NONE);
    }

    let mut best_values = [Score::ZERO; MAX_PLY + 2];
    let mut change_history = [0u32; MAX_PLY + 2];

    let skill_enabled = options.skill_level < 20;
    let mut rng = SmallRng::from_entropy();
    let mut skill_best = Move::NONE;
    let mut skill_ponder = Move::NONE;

    let mut best_move = Move::NONE;
    let mut ponder_move = Move::NONE;
    let mut easy_move = Move::NONE;

    let mut alpha = -Score::INFINITE;
    let mut beta = Score::INFINITE;
    let mut delta = 0;
    let mut depth = 0i32;

    while !shared.stop_requested() && {
        depth += 1;
        depth <= MAX_PLY as i32
    } && (td.limits.max_depth == 0 || depth <= td.limits.max_depth)
    {
        td.root_moves.best_move_changes = 0;

        if td.limits.max_time > 0 || td.limits.infinite {
            println!("info depth {depth}");
        }

        // Aspiration window around the previous iteration's value.
        if td.multi_pv == 1 && depth >= 5 {
            let previous = best_values[depth as usize - 1];
            let delta1 = (previous - best_values[depth as usize - 2]).abs();
            let delta2 = (best_values[depth as usize - 2] - best_values[depth as usize - 3]).abs();

            delta = (delta1 + delta2 / 2).clamp(16, 24);
            delta = (delta + 7) / 8 * 8;

            alpha = (previous - delta).max(-Score::INFINITE);
            beta = (previous + delta).min(Score::INFINITE);

            if previous.abs() >= Score::KNOWN_WIN {
                alpha = -Score::INFINITE;
                beta = Score::INFINITE;
            }
        }

        let mut value;
        loop {
            value = search_node::<true, false, true>(td, alpha, beta, depth * ONE_PLY);

            td.root_moves.sort();

            // The PV entries may have been overwritten during the search.
            let count = td.multi_pv.min(td.root_moves.len());
            for index in 0..count {
                let rm = td.root_moves[index].clone();
                rm.insert_pv_in_tt(&mut td.board, &shared.tt);
            }

            if shared.stop_requested() {
                break;
            }

            if (td.limits.max_time > 0 || td.limits.infinite) && (value >= beta || value <= alpha) {
                println!("{}", pv_info_to_uci(td, 0, depth, alpha, beta));
            }

            if value >= beta {
                beta = (beta + delta).min(Score::INFINITE);
                delta += delta / 2;
            } else if value <= alpha {
                shared.aspiration_fail_low.store(true, Ordering::Relaxed);
                shared.stop_on_ponderhit.store(false, Ordering::Relaxed);
                alpha = (alpha - delta).max(-Score::INFINITE);
                delta += delta / 2;
            } else {
                break;
            }

            if value.abs() >= Score::KNOWN_WIN {
                break;
            }
        }

        best_move = td.root_moves[0].mv();
        ponder_move = td.root_moves[0].pv.get(1).copied().unwrap_or(Move::NONE);
        best_values[depth as usize] = value;
        change_history[depth as usize] = td.root_moves.best_move_changes;

        if skill_enabled && depth == 1 + options.skill_level {
            (skill_best, skill_ponder) = do_skill_level(td, options.skill_level, &mut rng);
        }

        for index in 0..options.multi_pv.min(td.root_moves.len()) {
            println!("{}", pv_info_to_uci(td, index, depth, alpha, beta));
        }

        if let Some(file) = log_file.as_mut() {
            let line: Vec<String> = td.root_moves[0].pv.iter().map(Move::to_string).collect();
            let _ = writeln!(
                file,
                "depth {depth} score {} time {} nodes {} pv {}",
                uci_value(value),
                td.time_manager.elapsed(),
                shared.nodes.load(Ordering::Relaxed),
                line.join(" ")
            );
        }

        // An easy move is one that stood out at depth 1 and has not been
        // dethroned since.
        if depth == 1
            && (td.root_moves.len() == 1 || td.root_moves[0].pv_score > td.root_moves[1].pv_score + EASY_MOVE_MARGIN)
        {
            easy_move = best_move;
        } else if best_move != easy_move {
            easy_move = Move::NONE;
        }

        if !shared.stop_requested() && td.limits.use_time_management() {
            // Two consecutive iterations with a shortening mate.
            if depth >= 5
                && best_values[depth as usize].abs() >= Score::MATE_IN_MAX
                && best_values[depth as usize - 1].abs() >= Score::MATE_IN_MAX
                && best_values[depth as usize].abs() > best_values[depth as usize - 1].abs()
            {
                shared.set_stop(true);
            }

            let elapsed = td.time_manager.elapsed();
            let nodes = shared.nodes.load(Ordering::Relaxed);

            if depth >= 7
                && easy_move == best_move
                && (td.root_moves.len() == 1
                    || (td.root_moves[0].nodes > nodes * 85 / 100 && elapsed > td.time_manager.available_time() / 16)
                    || (td.root_moves[0].nodes > nodes * 98 / 100 && elapsed > td.time_manager.available_time() / 32))
            {
                shared.set_stop(true);
            }

            if depth > 4 && depth < 50 {
                td.time_manager.pv_instability(change_history[depth as usize], change_history[depth as usize - 1]);
            }

            if td.time_manager.elapsed() > td.time_manager.available_time() * 62 / 100 {
                shared.set_stop(true);
            }

            // Keep pondering; promote the stop once the ponder move hits.
            if shared.stop_requested() && td.limits.ponder {
                shared.set_stop(false);
                shared.stop_on_ponderhit.store(true, Ordering::Relaxed);
            }
        }
    }

    if skill_enabled {
        if skill_best == Move::NONE {
            (skill_best, skill_ponder) = do_skill_level(td, options.skill_level, &mut rng);
        }
        return (skill_best, skill_ponder);
    }

    (best_move, ponder_move)
}

/// Dispatches to the quiescence search once the remaining depth runs out.
fn search<const PV: bool>(td: &mut ThreadData, alpha: i32, beta: i32, depth: i32) -> i32 {
    if depth < ONE_PLY {
        qsearch::<PV>(td, alpha, beta, DEPTH_ZERO)
    } else {
        search_node::<PV, false, false>(td, alpha, beta, depth)
    }
}

/// The main search, specialized over `{PV, SP, ROOT}` node kinds. Split
/// nodes resume at the move loop: probing, pruning and the early moves were
/// all done by the master before it published the split point.
fn search_node<const PV: bool, const SP: bool, const ROOT: bool>(
    td: &mut ThreadData, mut alpha: i32, mut beta: i32, depth: i32,
) -> i32 {
    debug_assert!(alpha >= -Score::INFINITE && alpha < beta && beta <= Score::INFINITE);
    debug_assert!(PV || alpha == beta - 1);
    debug_assert!(depth >= ONE_PLY);

    let ply = td.ply;
    let p = ply as isize;
    let in_check = td.board.in_check();
    let old_alpha = alpha;
    let stm = td.board.side_to_move();

    // A split node must not wipe the line the master built before
    // publishing the split point.
    if !SP {
        td.pv.clear(ply);
    }
    td.count_node();

    if td.id == 0 {
        td.nodes_since_poll += 1;
        if td.nodes_since_poll > td.nodes_between_polls {
            td.nodes_since_poll = 0;
            poll(td);
        }
    }

    let sp: Option<Arc<SplitPoint>> = if SP { td.sp_chain.last().map(Arc::clone) } else { None };

    let mut best_value = -Score::INFINITE;
    let mut best_move = Move::NONE;
    let mut threat_move = Move::NONE;
    let mut tte: Option<Entry> = None;
    let mut tt_move = Move::NONE;
    let mut excluded_move = Move::NONE;
    let mut pos_key = 0u64;

    if SP {
        let handle = sp.as_ref().unwrap();
        threat_move = handle.threat_move;
        best_move = handle.lock().best_move;
    } else {
        // Step 1. Initialize the frames the children will read.
        td.stack[p].current_move = Move::NONE;
        td.stack[p + 1].excluded_move = Move::NONE;
        td.stack[p + 1].skip_null_move = false;
        td.stack[p + 1].broken_threat = false;
        td.stack[p + 1].reduction = 0;
        td.stack[p + 2].killers = [Move::NONE; 2];
        td.stack[p + 2].mate_killer = Move::NONE;

        if !ROOT {
            // Step 2. Aborted search and immediate draw.
            if td.shared.stop_requested() || td.cutoff_occurred() || td.board.is_draw() || ply >= MAX_PLY {
                return Score::DRAW;
            }

            // Step 3. Mate distance pruning.
            alpha = alpha.max(mated_in(ply));
            beta = beta.min(mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        // Step 4. Transposition table lookup. An excluded move perturbs the
        // key so the singular sub-search cannot collide with the real entry.
        excluded_move = td.stack[p].excluded_move;
        pos_key = match excluded_move {
            Move::NONE => td.board.key(),
            _ => td.board.key() ^ excluded_move.raw() as u64,
        };

        tte = td.shared.tt.probe(pos_key);

        if ROOT {
            tt_move = td.root_moves[0].mv();
        } else if let Some(entry) = tte {
            if entry.mv != Move::NONE {
                if td.board.is_pseudo_legal(entry.mv) {
                    tt_move = entry.mv;
                } else {
                    tte = None;
                }
            }
        }

        // The stored static eval must agree with the check state.
        if let Some(entry) = tte {
            let eval_missing = entry.eval == Score::NONE || entry.eval_margin == Score::NONE;
            let eval_present = entry.eval != Score::NONE || entry.eval_margin != Score::NONE;
            if (!in_check && eval_missing) || (in_check && eval_present) {
                tte = None;
            }
        }

        if !ROOT {
            if let Some(entry) = tte {
                let usable = if PV {
                    entry.depth >= depth && entry.bound == Bound::EXACT && entry.value > alpha && entry.value < beta
                } else {
                    is_valid(entry.value) && ok_to_use_tt(&entry, depth, beta, ply)
                };

                if is_valid(entry.value) && usable {
                    td.shared.tt.store(pos_key, entry.value, entry.bound, entry.depth, entry.mv, entry.eval, entry.eval_margin);
                    td.stack[p].current_move = tt_move;

                    if entry.value >= Score::MATE_IN_MAX {
                        td.stack[p].mate_killer = tt_move;
                    }

                    if entry.value >= beta
                        && tt_move != Move::NONE
                        && !tt_move.is_noisy()
                        && tt_move != td.stack[p].killers[0]
                    {
                        td.stack[p].killers[1] = td.stack[p].killers[0];
                        td.stack[p].killers[0] = tt_move;
                    }

                    return value_from_tt(entry.value, ply);
                }
            }
        }

        // Step 5. Static evaluation and the parent's gain statistics.
        let mut refined_value = -Score::INFINITE;

        if in_check {
            td.stack[p].eval = Score::NONE;
            td.stack[p].eval_margin = Score::NONE;
        } else {
            match tte {
                Some(entry) => {
                    td.stack[p].eval = entry.eval;
                    td.stack[p].eval_margin = entry.eval_margin;
                    refined_value =
                        if is_valid(entry.value) { refine_eval(&entry, entry.eval, ply) } else { entry.eval };
                }
                None => {
                    let (eval, eval_margin) = evaluate(&td.board);
                    td.stack[p].eval = eval;
                    td.stack[p].eval_margin = eval_margin;
                    refined_value = eval;
                    td.shared.tt.store(pos_key, Score::NONE, Bound::NONE, DEPTH_NONE, Move::NONE, eval, eval_margin);
                }
            }

            let previous = td.stack[p - 1].current_move;
            update_gains(td, previous, td.stack[p - 1].eval, td.stack[p].eval);
        }

        // Step 6. Razoring.
        if !PV
            && !in_check
            && depth < RAZOR_DEPTH
            && tt_move == Move::NONE
            && excluded_move == Move::NONE
            && beta.abs() < Score::MATE_IN_MAX
            && !td.board.has_pawn_on_7th(stm)
            && refined_value + razor_margin(depth) < beta
        {
            let r_beta = beta - razor_margin(depth);
            let value = qsearch::<false>(td, r_beta - 1, r_beta, DEPTH_ZERO);
            if value < r_beta {
                return value;
            }
        }

        // Step 7. Static null-move pruning: the position is so far above
        // beta that even giving the opponent a free tempo keeps it there.
        if !PV
            && !in_check
            && !td.stack[p].skip_null_move
            && depth < RAZOR_DEPTH
            && beta.abs() < Score::MATE_IN_MAX
            && td.board.non_pawn_material(stm) > 0
            && refined_value - futility_margin(depth, 0) >= beta
        {
            return refined_value - futility_margin(depth, 0);
        }

        // Step 8. Null-move search with verification at high depths.
        if !PV
            && !in_check
            && !td.stack[p].skip_null_move
            && depth > ONE_PLY
            && beta.abs() < Score::MATE_IN_MAX
            && td.board.non_pawn_material(stm) > 0
            && refined_value >= beta
        {
            td.stack[p].current_move = Move::NULL;

            let mut reduction_amount = 3 * ONE_PLY + depth / 4;
            if refined_value - PAWN_VALUE > beta {
                reduction_amount += ONE_PLY;
            }

            td.board.make_null_move();
            td.ply += 1;
            td.stack[p + 1].skip_null_move = true;
            let mut null_value = -search::<false>(td, -beta, -alpha, depth - reduction_amount);
            td.stack[p + 1].skip_null_move = false;
            td.ply -= 1;
            td.board.undo_null_move();

            if null_value >= beta {
                // Unproven mate scores are never returned.
                if null_value >= Score::MATE_IN_MAX {
                    null_value = beta;
                }

                if depth < 8 * ONE_PLY {
                    return null_value;
                }

                let mut r_beta = beta;
                td.stack[p].skip_null_move = true;
                let mut value = search::<false>(td, r_beta - 1, r_beta, depth - reduction_amount);
                td.stack[p].skip_null_move = false;

                let refuter = td.stack[p].current_move;
                if value >= r_beta
                    && !refuter.is_sentinel()
                    && td.board.non_pawn_material(!stm) < QUEEN_VALUE + 2 * BISHOP_VALUE
                {
                    // Re-verify with the refuting move class excluded; if the
                    // position then collapses, the null result relied on one
                    // broken pawn defense.
                    r_beta -= depth;
                    let piece_type = td.board.piece_on(refuter.from()).piece_type();
                    td.stack[p].excluded_move =
                        if piece_type == PieceType::Pawn { Move::PAWN } else { refuter };
                    td.stack[p].skip_null_move = true;
                    value = search::<false>(td, r_beta - 1, r_beta, depth / 2 - 2 * ONE_PLY);
                    td.stack[p].skip_null_move = false;

                    if value < r_beta && td.stack[p].excluded_move == Move::PAWN {
                        td.stack[p].excluded_move = Move::NONE;
                        td.stack[p].broken_threat = true;
                        if td.stack[p - 1].reduction != 0 {
                            return alpha;
                        }
                    }
                    td.stack[p].excluded_move = Move::NONE;
                }

                if value >= r_beta {
                    return null_value;
                }
            } else {
                // The refutation of doing nothing is a threat; remember it
                // for the pruning filters below.
                threat_move = td.stack[p + 1].current_move;

                // ProbCut: a shallow capture search may still prove beta.
                if depth < 8 * ONE_PLY {
                    let r_beta = (beta + 200).max((td.stack[p].eval + 100).min(Score::KNOWN_WIN));
                    let probcut_depth = depth - 4 * ONE_PLY;

                    let mut picker = MovePicker::new_probcut(&td.board);
                    while let Some(mv) = picker.next(&td.board, &td.shared.history) {
                        td.stack[p].current_move = mv;
                        td.board.make_move(mv);
                        td.ply += 1;
                        let value = -search::<false>(td, -r_beta, -r_beta + 1, probcut_depth);
                        td.ply -= 1;
                        td.board.undo_move();

                        if value >= r_beta {
                            return value;
                        }
                    }
                }

                if null_value <= Score::MATED_IN_MAX
                    && td.board.non_pawn_material(stm) - td.board.non_pawn_material(!stm) >= KNIGHT_VALUE
                {
                    td.stack[p].broken_threat = true;
                    if td.stack[p - 1].reduction != 0 {
                        return alpha;
                    }
                }

                let parent_move = td.stack[p - 1].current_move;
                if depth < THREAT_DEPTH
                    && td.stack[p - 1].reduction != 0
                    && threat_move != Move::NONE
                    && !threat_move.is_sentinel()
                    && !parent_move.is_sentinel()
                    && connected_moves(&td.board, parent_move, threat_move)
                {
                    td.stack[p].broken_threat = true;
                    return alpha;
                }
            }
        }

        // Step 9. Internal iterative deepening.
        if depth >= IID_DEPTH[PV as usize]
            && tt_move == Move::NONE
            && (PV || (!in_check && td.stack[p].eval + IID_MARGIN >= beta))
        {
            let iid_depth = if PV { depth - 2 * ONE_PLY } else { depth / 2 };

            td.stack[p].skip_null_move = true;
            let value = search::<PV>(td, alpha, beta, iid_depth);
            if excluded_move == Move::NONE {
                td.stack[p].skip_null_move = false;
            }

            let candidate = td.stack[p].current_move;
            if candidate != Move::NONE && !candidate.is_sentinel() {
                tt_move = candidate;
                tte = Some(Entry {
                    mv: tt_move,
                    value,
                    eval: Score::NONE,
                    eval_margin: Score::NONE,
                    depth: iid_depth,
                    bound: Bound::LOWER,
                });
            }
        }
    }

    // From here both regular and split nodes run the move loop.
    let futility_base = td.stack[p].eval + td.stack[p].eval_margin;

    let singular_extension_node = !ROOT
        && !SP
        && depth >= SINGULAR_EXTENSION_DEPTH[PV as usize]
        && excluded_move == Move::NONE
        && matches!(&tte, Some(entry) if entry.mv != Move::NONE
            && entry.bound.is_lower()
            && (entry.depth >= depth - 3 * ONE_PLY || td.stack[p].broken_threat));

    let mut picker = if SP || ROOT {
        None
    } else {
        let killers = [td.stack[p].mate_killer, td.stack[p].killers[0], td.stack[p].killers[1]];
        Some(MovePicker::new(&td.board, tt_move, killers))
    };

    if SP {
        best_value = sp.as_ref().unwrap().lock().best_value;
    }

    let mut move_count: i32 = 0;
    let mut played_quiets = [Move::NONE; 64];
    let mut played_count = 0usize;
    let mut nodes_before = 0u64;

    // Step 10. The move loop.
    loop {
        if best_value >= beta || td.shared.stop_requested() || td.cutoff_occurred() {
            break;
        }

        let mv;
        if SP {
            let handle = sp.as_ref().unwrap();
            let mut state = handle.lock();
            if state.best_value >= beta || state.cursor >= state.moves.len() {
                break;
            }
            mv = state.moves[state.cursor];
            state.cursor += 1;
            state.move_count += 1;
            move_count = state.move_count;
            alpha = state.alpha;
            best_value = state.best_value;
        } else if ROOT {
            if move_count as usize >= td.root_moves.len() {
                break;
            }
            mv = td.root_moves[move_count as usize].mv();
            move_count += 1;

            td.shared.first_root_move.store(move_count == 1, Ordering::Relaxed);
            nodes_before = td.shared.nodes.load(Ordering::Relaxed);

            if (td.limits.max_time > 0 || td.limits.infinite) && td.time_manager.elapsed() > 3000 {
                println!("info currmove {mv} currmovenumber {move_count}");
            }
        } else {
            match picker.as_mut().unwrap().next(&td.board, &td.shared.history) {
                Some(candidate) => mv = candidate,
                None => break,
            }

            // Excluded-move filter: skip the excluded move itself, its
            // piece-category sentinel, and moves returning to the square
            // the grandparent vacated.
            if excluded_move != Move::NONE {
                if mv == excluded_move {
                    continue;
                }
                if excluded_move == Move::category(td.board.piece_on(mv.from()).piece_type()) {
                    continue;
                }
                let grandparent = td.stack[p - 2].current_move;
                if td.board.piece_on(mv.from()).piece_type() != PieceType::King
                    && grandparent != Move::NONE
                    && !grandparent.is_sentinel()
                    && mv.to() == grandparent.from()
                {
                    continue;
                }
            }

            move_count += 1;
        }

        let is_pv_move = PV
            && move_count
                <= if ROOT {
                    if depth <= ONE_PLY {
                        1000
                    } else {
                        td.multi_pv as i32
                    }
                } else {
                    1
                };

        let gives_check = td.board.gives_check(mv);

        if !SP && excluded_move != Move::NONE && gives_check {
            move_count -= 1;
            continue;
        }

        let capture_or_promotion = mv.is_noisy();

        // Step 11. Extensions.
        let mut dangerous = false;
        let mut extension_amount = extension::<PV>(&td.board, mv, capture_or_promotion, gives_check, &mut dangerous);

        // Singular extension: if every alternative fails well below the
        // hash move's score, that move is the only one and deserves depth.
        if singular_extension_node && mv == tt_move && extension_amount < ONE_PLY {
            let entry = tte.unwrap();
            let tt_value = value_from_tt(entry.value, ply);

            if is_valid(entry.value) && tt_value.abs() < Score::KNOWN_WIN {
                let r_beta = tt_value - depth;
                let piece_type = td.board.piece_on(mv.from()).piece_type();

                td.stack[p].excluded_move = if !in_check
                    && !mv.is_capture()
                    && (piece_type == PieceType::Pawn || piece_type == PieceType::King || gives_check)
                {
                    Move::category(piece_type)
                } else {
                    mv
                };
                td.stack[p].skip_null_move = true;
                let value = search::<false>(td, r_beta - 1, r_beta, depth / 2);
                td.stack[p].skip_null_move = false;
                td.stack[p].excluded_move = Move::NONE;

                if value < r_beta {
                    extension_amount = ONE_PLY;
                }
            }
        }

        td.stack[p].current_move = mv;
        let new_depth = depth - ONE_PLY + extension_amount;

        // Step 12. Futility pruning.
        if !PV
            && !in_check
            && !capture_or_promotion
            && !dangerous
            && !mv.is_castling()
            && mv != td.stack[p].mate_killer
            && best_value > Score::MATED_IN_MAX
            && beta.abs() < Score::MATE_IN_MAX
        {
            // Move-count based pruning.
            if move_count >= futility_move_count(depth)
                && (threat_move == Move::NONE
                    || threat_move.is_sentinel()
                    || !connected_threat(&td.board, mv, threat_move))
                && best_value >= futility_base - PAWN_VALUE
            {
                continue;
            }

            // Value based pruning against the predicted depth after LMR.
            let mut predicted_depth = new_depth;
            if td.stack[p - 1].current_move != Move::NULL
                && mv != td.stack[p].killers[0]
                && mv != td.stack[p].killers[1]
            {
                predicted_depth -= reduction(false, depth, move_count);
            }

            let piece = td.board.piece_on(mv.from());
            let futility_value =
                futility_base + futility_margin(predicted_depth, move_count) + td.shared.history.gain(piece, mv.to());

            if futility_value < beta {
                if SP {
                    let handle = sp.as_ref().unwrap();
                    let mut state = handle.lock();
                    if futility_value > state.best_value {
                        state.best_value = futility_value;
                    }
                    best_value = state.best_value;
                } else if futility_value > best_value {
                    best_value = futility_value;
                }
                continue;
            }

            // Losing captures cannot save a lost cause at shallow depth;
            // neither can quiet moves that lose material outright.
            if predicted_depth < 2 * ONE_PLY && td.board.see(mv) < 0 {
                continue;
            }
        }

        // Step 13. Make the move.
        td.board.make_move(mv);
        td.ply += 1;

        if !SP && !capture_or_promotion && played_count < played_quiets.len() {
            played_quiets[played_count] = mv;
            played_count += 1;
        }

        let mut value = Score::ZERO;
        let mut do_full_depth_search = !is_pv_move;

        // Step 14. Late move reductions.
        if depth >= 3 * ONE_PLY
            && !is_pv_move
            && !capture_or_promotion
            && !dangerous
            && !mv.is_castling()
            && mv != td.stack[p].killers[0]
            && mv != td.stack[p].killers[1]
        {
            td.stack[p].reduction = reduction(PV, depth, move_count);

            let reduced = (new_depth - td.stack[p].reduction).max(ONE_PLY);
            if SP {
                alpha = sp.as_ref().unwrap().lock().alpha;
            }

            value = -search::<false>(td, -(alpha + 1), -alpha, reduced);

            do_full_depth_search = value > alpha && td.stack[p].reduction != 0;
            td.stack[p].reduction = 0;
        }

        // Step 15. Full-depth null-window search.
        if do_full_depth_search {
            if SP {
                alpha = sp.as_ref().unwrap().lock().alpha;
            }
            value = -search::<false>(td, -(alpha + 1), -alpha, new_depth);
        }

        td.stack[p + 1].broken_threat = false;

        // Full-window re-search for new PV candidates.
        if PV && (is_pv_move || (value > alpha && (ROOT || value < beta))) {
            if ROOT && td.multi_pv > 1 && move_count <= td.multi_pv as i32 {
                alpha = -Score::INFINITE;
            }
            value = -search::<true>(td, -beta, -alpha, new_depth);
        }

        // Step 16. Undo.
        td.ply -= 1;
        td.board.undo_move();

        debug_assert!(value > -Score::INFINITE && value < Score::INFINITE);

        // Step 17. New best move.
        if SP {
            let handle = sp.as_ref().unwrap();
            let mut state = handle.lock();
            alpha = state.alpha;
            best_value = state.best_value;

            if value > best_value && !td.cutoff_occurred() {
                state.best_value = value;
                best_value = value;

                if value > alpha {
                    if PV && value < beta {
                        state.alpha = value;
                        alpha = value;
                    } else {
                        handle.beta_cutoff.store(true, Ordering::Relaxed);
                    }

                    state.best_move = mv;
                    best_move = mv;

                    if PV {
                        state.pv.clear();
                        state.pv.push(mv);
                        state.pv.extend_from_slice(td.pv.line(ply + 1));
                    }
                }
            }
        } else if value > best_value {
            best_value = value;

            if value > alpha {
                if PV && !ROOT && value < beta {
                    alpha = value;
                }

                if PV && !ROOT {
                    td.pv.update(ply, mv);
                }

                best_move = mv;
            }
        }

        if ROOT {
            // A stopped search cannot be trusted to have finished this move.
            if td.shared.stop_requested() {
                break;
            }

            let searched = td.shared.nodes.load(Ordering::Relaxed) - nodes_before;
            td.root_moves[move_count as usize - 1].nodes += searched;

            if is_pv_move || value > alpha {
                if !is_pv_move && td.multi_pv == 1 {
                    td.root_moves.best_move_changes += 1;
                }

                let mut line = vec![mv];
                line.extend_from_slice(td.pv.line(ply + 1));

                let rm = &mut td.root_moves[move_count as usize - 1];
                rm.pv_score = value;
                rm.pv = line;

                if td.multi_pv > 1 {
                    alpha = td.root_moves[(move_count as usize).min(td.multi_pv) - 1].pv_score;
                } else if value > alpha {
                    alpha = value;
                }
            } else {
                td.root_moves[move_count as usize - 1].pv_score = -Score::INFINITE;
            }
        }

        // Step 18. Split: expose the remaining moves to idle workers.
        if !ROOT
            && !SP
            && depth >= MIN_SPLIT_DEPTH
            && best_value < beta
            && excluded_move == Move::NONE
            && td.shared.pool.available_slave_exists()
            && !td.shared.stop_requested()
            && !td.cutoff_occurred()
        {
            let remaining = picker.as_mut().unwrap().drain(&td.board, &td.shared.history);

            let (joined_value, joined_move, joined_alpha, joined_pv) = thread::split(
                td, alpha, beta, best_value, best_move, depth, threat_move, move_count, remaining, PV,
            );

            best_value = joined_value;
            best_move = joined_move;
            alpha = joined_alpha;

            if PV && !joined_pv.is_empty() {
                td.pv.set_line(ply, &joined_pv);
            }

            break;
        }
    }

    // Step 19. Mate and stalemate. With an excluded move suppressing every
    // legal reply the node fails low instead.
    if !SP {
        td.stack[p].current_move = best_move;

        if move_count == 0 {
            return if excluded_move != Move::NONE {
                old_alpha
            } else if in_check {
                mated_in(ply)
            } else {
                Score::DRAW
            };
        }
    }

    // Step 20. Store the result and update the move-ordering tables.
    if !SP && !td.shared.stop_requested() && !td.cutoff_occurred() {
        let bound = if best_value <= old_alpha {
            Bound::UPPER
        } else if best_value >= beta {
            Bound::LOWER
        } else {
            Bound::EXACT
        };

        let stored_depth = if td.stack[p].broken_threat { DEPTH_NONE } else { depth };
        td.shared.tt.store(
            pos_key,
            value_to_tt(best_value, ply),
            bound,
            stored_depth,
            best_move,
            td.stack[p].eval,
            td.stack[p].eval_margin,
        );

        if best_value >= Score::MATE_IN_MAX {
            td.stack[p].mate_killer = best_move;
        }

        if best_value >= beta && !best_move.is_noisy() {
            if best_move != td.stack[p].killers[0] {
                td.stack[p].killers[1] = td.stack[p].killers[0];
                td.stack[p].killers[0] = best_move;
            }

            let bonus = depth * depth;
            let piece = td.board.piece_on(best_move.from());
            td.shared.history.update(piece, best_move.to(), bonus);

            for &quiet in played_quiets.iter().take(played_count) {
                if quiet != best_move {
                    let piece = td.board.piece_on(quiet.from());
                    td.shared.history.update(piece, quiet.to(), -bonus);
                }
            }
        }
    }

    debug_assert!(best_value > -Score::INFINITE && best_value < Score::INFINITE);

    best_value
}

/// Entered by every participant of a split point, master included.
pub fn split_search(td: &mut ThreadData, sp: &Arc<SplitPoint>) {
    debug_assert!(td.ply == sp.ply);

    let alpha = sp.lock().alpha;
    if sp.pv_node {
        search_node::<true, true, false>(td, alpha, sp.beta, sp.depth);
    } else {
        search_node::<false, true, false>(td, alpha, sp.beta, sp.depth);
    }
}

/// Quiescence search: resolves captures (and checks near the horizon) so
/// the static evaluation is only trusted in quiet positions.
fn qsearch<const PV: bool>(td: &mut ThreadData, mut alpha: i32, beta: i32, depth: i32) -> i32 {
    debug_assert!(alpha >= -Score::INFINITE && alpha < beta && beta <= Score::INFINITE);
    debug_assert!(PV || alpha == beta - 1);
    debug_assert!(depth <= DEPTH_ZERO);

    let ply = td.ply;
    let p = ply as isize;

    td.pv.clear(ply);
    td.count_node();

    td.stack[p].current_move = Move::NONE;

    if ply >= MAX_PLY || td.board.is_draw() {
        return Score::DRAW;
    }

    let in_check = td.board.in_check();
    let stm = td.board.side_to_move();
    let old_alpha = alpha;

    // Only two depth classes exist in the quiescence table: with checks
    // and without.
    let tt_depth = if in_check || depth >= DEPTH_QS_CHECKS { DEPTH_QS_CHECKS } else { DEPTH_QS_NO_CHECKS };

    let mut tte = td.shared.tt.probe(td.board.key());
    let mut tt_move = Move::NONE;

    if let Some(entry) = tte {
        if entry.mv != Move::NONE {
            if td.board.is_pseudo_legal(entry.mv) {
                tt_move = entry.mv;
            } else {
                tte = None;
            }
        }
    }

    if let Some(entry) = tte {
        let eval_missing = entry.eval == Score::NONE || entry.eval_margin == Score::NONE;
        let eval_present = entry.eval != Score::NONE || entry.eval_margin != Score::NONE;
        if (!in_check && eval_missing) || (in_check && eval_present) {
            tte = None;
        }
    }

    if !PV {
        if let Some(entry) = tte {
            if is_valid(entry.value) && ok_to_use_tt(&entry, tt_depth, beta, ply) {
                td.stack[p].current_move = tt_move;
                if entry.value >= Score::MATE_IN_MAX {
                    td.stack[p].mate_killer = tt_move;
                }
                return value_from_tt(entry.value, ply);
            }
        }
    }

    let mut best_value;
    let futility_base;
    let enough_material;

    if in_check {
        best_value = -Score::INFINITE;
        futility_base = -Score::INFINITE;
        enough_material = false;
        td.stack[p].eval = Score::NONE;
        td.stack[p].eval_margin = Score::NONE;
    } else {
        // A stalemate would stand pat on a meaningless eval.
        if PV && !td.board.has_legal_moves() {
            return Score::DRAW;
        }

        match tte {
            Some(entry) => {
                td.stack[p].eval = entry.eval;
                td.stack[p].eval_margin = entry.eval_margin;
                best_value = entry.eval;

                if is_valid(entry.value)
                    && (!PV || entry.bound == Bound::EXACT || entry.value.abs() >= Score::KNOWN_WIN)
                {
                    best_value = refine_eval(&entry, entry.eval, ply);
                }
            }
            None => {
                let (eval, eval_margin) = evaluate(&td.board);
                td.stack[p].eval = eval;
                td.stack[p].eval_margin = eval_margin;
                best_value = eval;
            }
        }

        let previous = td.stack[p - 1].current_move;
        update_gains(td, previous, td.stack[p - 1].eval, td.stack[p].eval);

        // Stand pat.
        if best_value >= beta {
            if tte.is_none() {
                td.shared.tt.store(
                    td.board.key(),
                    Score::NONE,
                    Bound::NONE,
                    DEPTH_NONE,
                    Move::NONE,
                    td.stack[p].eval,
                    td.stack[p].eval_margin,
                );
            }
            return best_value;
        }

        if PV && best_value > alpha {
            alpha = best_value;
        }

        futility_base = td.stack[p].eval + td.stack[p].eval_margin + FUTILITY_MARGIN_QS;
        enough_material = td.board.non_pawn_material(stm) > ROOK_VALUE;
    }

    let mut best_move = Move::NONE;
    let mut picker = MovePicker::new_qsearch(&td.board, tt_move, depth >= DEPTH_QS_CHECKS);

    while alpha < beta {
        let mv = match picker.next(&td.board, &td.shared.history) {
            Some(mv) => mv,
            None => break,
        };

        let gives_check = td.board.gives_check(mv);

        // Futility: the capture cannot raise the eval back to beta.
        if !PV
            && !in_check
            && !gives_check
            && mv != tt_move
            && enough_material
            && !mv.is_promotion()
            && !is_passed_pawn_push(&td.board, mv)
        {
            let mut futility_value = futility_base;
            if mv.is_capture() {
                let victim = if mv.is_en_passant() { PieceType::Pawn } else { td.board.piece_on(mv.to()).piece_type() };
                futility_value += PIECE_VALUES_EG[victim];
            }

            if futility_value < beta {
                if futility_value > best_value {
                    best_value = futility_value;
                }
                continue;
            }

            if futility_base < beta && td.board.see(mv) <= 0 {
                continue;
            }
        }

        // Losing quiet evasions when better ones already exist.
        let evasion_prunable =
            in_check && best_value > Score::MATED_IN_MAX && !mv.is_capture() && !td.board.can_castle(stm);

        if !PV && (!in_check || evasion_prunable) && mv != tt_move && !mv.is_promotion() && td.board.see(mv) < 0 {
            continue;
        }

        // Checks that threaten nothing are not worth another ply.
        if !PV
            && !in_check
            && gives_check
            && mv != tt_move
            && mv != td.stack[p].mate_killer
            && td.stack[p - 1].current_move != Move::NULL
            && !mv.is_noisy()
            && td.stack[p].eval + PAWN_VALUE / 6 < beta
            && !check_is_dangerous(&td.board, mv, futility_base, beta)
        {
            continue;
        }

        td.stack[p].current_move = mv;
        td.board.make_move(mv);
        td.ply += 1;
        let value = -qsearch::<PV>(td, -beta, -alpha, depth - ONE_PLY);
        td.ply -= 1;
        td.board.undo_move();

        debug_assert!(value > -Score::INFINITE && value < Score::INFINITE);

        if value > best_value {
            best_value = value;
            if value > alpha {
                alpha = value;
                best_move = mv;

                if PV {
                    td.pv.update(ply, mv);
                }
                if value >= Score::MATE_IN_MAX {
                    td.stack[p].mate_killer = mv;
                }
            }
        }
    }

    td.stack[p].current_move = best_move;

    // In check with no legal moves: checkmate.
    if in_check && best_value == -Score::INFINITE {
        return mated_in(ply);
    }

    let bound = if best_value <= old_alpha {
        Bound::UPPER
    } else if best_value >= beta {
        Bound::LOWER
    } else {
        Bound::EXACT
    };
    td.shared.tt.store(
        td.board.key(),
        value_to_tt(best_value, ply),
        bound,
        tt_depth,
        best_move,
        td.stack[p].eval,
        td.stack[p].eval_margin,
    );

    debug_assert!(best_value > -Score::INFINITE && best_value < Score::INFINITE);

    best_value
}

/// Decides the extension for a move and flags it as dangerous for the
/// pruning filters. At most one ply in total.
fn extension<const PV: bool>(
    board: &Board, mv: Move, capture_or_promotion: bool, gives_check: bool, dangerous: &mut bool,
) -> i32 {
    let us = board.side_to_move();
    let mut result = 0;

    *dangerous = gives_check;

    if gives_check && board.non_pawn_material(us) >= QUEEN_VALUE + ROOK_VALUE && board.see(mv) >= 0 {
        result += CHECK_EXTENSION[PV as usize];
    }

    if board.piece_on(mv.from()).piece_type() == PieceType::Pawn {
        if board.pawn_is_passed(us, mv.to()) && mv.to().relative_rank(us) >= Rank::R4 {
            result += PASSED_PAWN_EXTENSION[PV as usize];
            if mv.to().relative_rank(us) == Rank::R7 {
                result += PAWN_PUSH_TO_7TH_EXTENSION[PV as usize];
            }
            *dangerous = true;
        }

        if board.of(PieceType::Queen, us).any() && board.king_square(!us).distance(mv.to()) <= 2 {
            *dangerous = true;
        }
    }

    // Capturing the last piece heads into a pawn endgame, which the eval
    // handles poorly; give it a full look.
    if capture_or_promotion && mv.is_capture() && !mv.is_en_passant() && !mv.is_promotion() {
        let captured = board.piece_on(mv.to()).piece_type();
        if captured != PieceType::Pawn
            && board.non_pawn_material(us) + board.non_pawn_material(!us) == PIECE_VALUES[captured]
        {
            result += PAWN_ENDGAME_EXTENSION[PV as usize];
            *dangerous = true;
        }
    }

    result.min(ONE_PLY)
}

/// Whether `first` (the move that led here) somehow enabled `second` (a
/// reply found by the null search): same piece, vacated squares, uncovered
/// rays, new defenses, or a discovered-check setup.
fn connected_moves(board: &Board, first: Move, second: Move) -> bool {
    let f1 = first.from();
    let t1 = first.to();
    let f2 = second.from();
    let t2 = second.to();

    // The moving piece is the same in both moves.
    if f2 == t1 {
        return true;
    }

    // The second move's destination was vacated by the first.
    if t2 == f1 {
        return true;
    }

    // Sliding through the vacated square.
    let king = board.king_square(board.side_to_move());
    if board.piece_on(f2).piece_type().is_slider()
        && (between(f2, t2).contains(f1) || between(t2, king).contains(f1))
    {
        return true;
    }

    // The first move defends the second move's destination.
    let piece = board.piece_on(t1);
    if !piece.is_none() && attacks(piece, t1, board.occupancies()).contains(t2) {
        return true;
    }

    // Discovered check: the first mover aims at our king and the second
    // move steps out of the shared ray.
    if piece.piece_type().is_slider() && between(t1, king).contains(f2) && !between(t1, king).contains(t2) {
        let blockers = between(t1, king) & board.occupancies();
        if blockers == f2.to_bb() {
            return true;
        }
    }

    false
}

/// Whether pruning `mv` is unsafe because it interacts with the threat
/// discovered by a failed null search.
fn connected_threat(board: &Board, mv: Move, threat: Move) -> bool {
    debug_assert!(!threat.is_sentinel());

    let m_from = mv.from();
    let m_to = mv.to();
    let t_from = threat.from();
    let t_to = threat.to();

    // Moves of the threatened piece are never pruned.
    if m_from == t_to {
        return true;
    }

    // Defending the victim of an even or winning exchange.
    let threatened = board.piece_on(t_to);
    let threatening = board.piece_on(t_from);
    if !threatened.is_none()
        && (PIECE_VALUES[threatening.piece_type()] >= PIECE_VALUES[threatened.piece_type()]
            || threatening.piece_type() == PieceType::King)
        && board.move_attacks_square(mv, t_to)
    {
        return true;
    }

    // Safely blocking a sliding threat.
    if threatening.piece_type().is_slider() && between(t_from, t_to).contains(m_to) && board.see(mv) >= 0 {
        return true;
    }

    false
}

/// A checking move in quiescence is kept when the king is cornered, a queen
/// touches it, or the check forks fresh material.
fn check_is_dangerous(board: &Board, mv: Move, futility_base: i32, beta: i32) -> bool {
    let them = !board.side_to_move();
    let king = board.king_square(them);

    if BORDER.contains(king) {
        return true;
    }

    let from = mv.from();
    let to = mv.to();
    let piece = board.piece_on(from);

    if piece.piece_type() == PieceType::Queen && king_attacks(king).contains(to) {
        return true;
    }

    let occupancies = board.occupancies() & !from.to_bb() & !king.to_bb();
    let old_attacks = attacks(piece, from, occupancies);
    let new_attacks = attacks(piece, to, occupancies);

    let victims = board.colors(them) & new_attacks & !old_attacks & !king.to_bb();
    for victim in victims {
        if futility_base + PIECE_VALUES_EG[board.piece_on(victim).piece_type()] >= beta {
            return true;
        }
    }

    false
}

fn is_passed_pawn_push(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from()).piece_type() == PieceType::Pawn
        && !mv.is_capture()
        && board.pawn_is_passed(board.side_to_move(), mv.to())
}

/// Mate scores are stored relative to the current node so they stay valid
/// when reached through a different path.
pub fn value_to_tt(value: i32, ply: usize) -> i32 {
    if value >= Score::MATE_IN_MAX {
        return value + ply as i32;
    }
    if value <= Score::MATED_IN_MAX {
        return value - ply as i32;
    }
    value
}

pub fn value_from_tt(value: i32, ply: usize) -> i32 {
    if value == Score::NONE {
        return value;
    }
    if value >= Score::MATE_IN_MAX {
        return value - ply as i32;
    }
    if value <= Score::MATED_IN_MAX {
        return value + ply as i32;
    }
    value
}

/// A stored value may stand in for a search when its depth suffices or it
/// proves a mate bound, and its bound type points the right way.
pub fn ok_to_use_tt(entry: &Entry, depth: i32, beta: i32, ply: usize) -> bool {
    let value = value_from_tt(entry.value, ply);

    (entry.depth >= depth || value >= Score::MATE_IN_MAX.max(beta) || value < Score::MATED_IN_MAX.min(beta))
        && ((entry.bound.is_lower() && value >= beta) || (entry.bound.is_upper() && value < beta))
}

/// Tightens the static eval with a stored search value when the bound
/// points in the improving direction.
pub fn refine_eval(entry: &Entry, default: i32, ply: usize) -> i32 {
    let value = value_from_tt(entry.value, ply);

    if (entry.bound.is_lower() && value >= default) || (entry.bound.is_upper() && value < default) {
        return value;
    }
    default
}

/// Feeds the gains table from the static-eval swing of the parent's quiet
/// move.
fn update_gains(td: &mut ThreadData, mv: Move, before: i32, after: i32) {
    if mv != Move::NONE
        && !mv.is_sentinel()
        && before != Score::NONE
        && after != Score::NONE
        && td.board.last_capture().is_none()
        && !mv.is_castling()
        && !mv.is_promotion()
        && !mv.is_en_passant()
    {
        let piece = td.board.piece_on(mv.to());
        td.shared.history.update_gain(piece, mv.to(), -(before + after));
    }
}

/// Thread 0 polling: drains the input channel and enforces the clock.
fn poll(td: &mut ThreadData) {
    use std::sync::mpsc::TryRecvError;

    if let Some(input) = &td.input {
        loop {
            match input.try_recv() {
                Ok(line) => match line.trim() {
                    "quit" => {
                        td.shared.ponder.store(false, Ordering::Relaxed);
                        td.shared.quit.store(true, Ordering::Relaxed);
                        td.shared.set_stop(true);
                        return;
                    }
                    "stop" => {
                        td.shared.ponder.store(false, Ordering::Relaxed);
                        td.shared.set_stop(true);
                    }
                    "ponderhit" => {
                        td.shared.ponder.store(false, Ordering::Relaxed);
                        if td.shared.stop_on_ponderhit.load(Ordering::Relaxed) {
                            td.shared.set_stop(true);
                        }
                    }
                    _ => (),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    td.shared.quit.store(true, Ordering::Relaxed);
                    td.shared.set_stop(true);
                    return;
                }
            }
        }
    }

    // While pondering the clock is the opponent's problem.
    if td.shared.ponder.load(Ordering::Relaxed) {
        return;
    }

    let elapsed = td.time_manager.elapsed();

    let still_at_first_move = td.shared.first_root_move.load(Ordering::Relaxed)
        && !td.shared.aspiration_fail_low.load(Ordering::Relaxed)
        && elapsed > td.time_manager.available_time();

    let no_more_time = elapsed > td.time_manager.maximum_time() || still_at_first_move;

    if (td.limits.use_time_management() && no_more_time)
        || (td.limits.max_time > 0 && elapsed >= td.limits.max_time)
        || (td.limits.max_nodes > 0 && td.shared.nodes.load(Ordering::Relaxed) >= td.limits.max_nodes)
    {
        td.shared.set_stop(true);
    }
}

/// Blocks until the GUI allows the best move to be printed.
fn wait_for_stop_or_ponderhit(td: &ThreadData) {
    let Some(input) = &td.input else { return };

    loop {
        match input.recv() {
            Ok(line) => match line.trim() {
                "stop" | "ponderhit" => break,
                "quit" => {
                    td.shared.quit.store(true, Ordering::Relaxed);
                    break;
                }
                _ => (),
            },
            Err(_) => {
                td.shared.quit.store(true, Ordering::Relaxed);
                break;
            }
        }
    }
}

/// Picks a sub-optimal move from the MultiPV set: each candidate gets a
/// deterministic malus for its distance to the best score plus a random
/// term, both shrinking as the skill level rises.
fn do_skill_level(td: &ThreadData, skill_level: i32, rng: &mut SmallRng) -> (Move, Move) {
    let size = td.multi_pv.min(td.root_moves.len());
    let best_score = td.root_moves[0].pv_score;
    let variance = (best_score - td.root_moves[size - 1].pv_score).min(PAWN_VALUE);
    let weakness = 120 - 2 * skill_level;

    let mut best = Move::NONE;
    let mut ponder = Move::NONE;
    let mut max_score = -Score::INFINITE;

    for index in 0..size {
        let rm = &td.root_moves[index];
        let mut score = rm.pv_score;

        // Blunders stay out of reach even at the lowest levels.
        if index > 0 && td.root_moves[index - 1].pv_score > score + EASY_MOVE_MARGIN {
            break;
        }

        score += ((best_score - score) * weakness + variance * (rng.gen::<u32>() % weakness as u32) as i32) / 128;

        if score > max_score {
            max_score = score;
            best = rm.mv();
            ponder = rm.pv.get(1).copied().unwrap_or(Move::NONE);
        }
    }

    (best, ponder)
}

/// Formats a value for `info score`: centipawns, or moves to mate.
pub fn uci_value(value: i32) -> String {
    if value.abs() < Score::MATE - MAX_PLY as i32 {
        format!("cp {}", value * 100 / PAWN_VALUE)
    } else if value > 0 {
        format!("mate {}", (Score::MATE - value + 1) / 2)
    } else {
        format!("mate {}", (-Score::MATE - value) / 2)
    }
}

/// One `info` line for a root move, with aspiration bound labels.
fn pv_info_to_uci(td: &ThreadData, index: usize, depth: i32, alpha: i32, beta: i32) -> String {
    let shared = &td.shared;
    let rm = &td.root_moves[index];

    let bound = if rm.pv_score >= beta {
        " lowerbound"
    } else if rm.pv_score <= alpha {
        " upperbound"
    } else {
        ""
    };

    let nodes = shared.nodes.load(Ordering::Relaxed);
    let time = td.time_manager.elapsed();
    let nps = if time > 0 { nodes as i64 * 1000 / time } else { 0 };

    let line: Vec<String> = rm.pv.iter().map(Move::to_string).collect();

    format!(
        "info depth {depth} multipv {} score {}{bound} nodes {nodes} nps {nps} time {time} pv {}",
        index + 1,
        uci_value(rm.pv_score),
        line.join(" ")
    )
}

#[cfg(test)]
mod tests;
