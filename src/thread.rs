use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, Condvar, Mutex, MutexGuard,
};

use crate::{
    board::Board,
    history::History,
    pv::PrincipalVariationTable,
    root::RootMoveList,
    search,
    stack::{Frame, Stack},
    timeman::{Limits, TimeManager},
    transposition::TranspositionTable,
    types::{Move, ONE_PLY},
};

pub const MAX_THREADS: usize = 16;
pub const DEFAULT_THREADS: usize = 1;

/// Minimum remaining depth for publishing a split point.
pub const MIN_SPLIT_DEPTH: i32 = 4 * ONE_PLY;

/// Upper bound on slaves recruited into a single split point.
const MAX_SLAVES_PER_SPLIT: usize = 3;

/// State shared by every search thread for the lifetime of the process.
pub struct SharedContext {
    pub tt: TranspositionTable,
    pub history: History,
    pub pool: ThreadPool,

    pub stop: AtomicBool,
    pub quit: AtomicBool,
    pub ponder: AtomicBool,
    pub stop_on_ponderhit: AtomicBool,
    pub aspiration_fail_low: AtomicBool,
    pub first_root_move: AtomicBool,

    /// Nodes searched by all threads since the last `go`.
    pub nodes: AtomicU64,
}

impl SharedContext {
    pub fn new() -> Self {
        Self {
            tt: TranspositionTable::default(),
            history: History::default(),
            pool: ThreadPool::new(),
            stop: AtomicBool::new(false),
            quit: AtomicBool::new(false),
            ponder: AtomicBool::new(false),
            stop_on_ponderhit: AtomicBool::new(false),
            aspiration_fail_low: AtomicBool::new(false),
            first_root_move: AtomicBool::new(false),
            nodes: AtomicU64::new(0),
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn set_stop(&self, value: bool) {
        self.stop.store(value, Ordering::Relaxed);
    }

    /// Spawns worker threads 1..count if they are not running yet and marks
    /// them active. Thread 0 is the caller itself.
    pub fn set_threads(self: &Arc<Self>, count: usize) {
        let count = count.clamp(1, MAX_THREADS);
        self.pool.active_threads.store(count, Ordering::Relaxed);

        for id in 1..count {
            let slot = &self.pool.slots[id];
            let mut state = slot.state.lock().unwrap();
            if state.spawned {
                continue;
            }
            state.spawned = true;
            drop(state);

            let shared = Arc::clone(self);
            std::thread::Builder::new()
                .name(format!("tempest-worker-{id}"))
                .stack_size(8 * 1024 * 1024)
                .spawn(move || idle_loop(shared, id))
                .expect("failed to spawn worker thread");

            log::debug!("spawned worker thread {id}");
        }
    }
}

/// Fixed pool of parked worker threads contending for split-point work.
pub struct ThreadPool {
    slots: Vec<Slot>,
    pub active_threads: AtomicUsize,
}

struct Slot {
    state: Mutex<SlotState>,
    wake: Condvar,
}

#[derive(Default)]
struct SlotState {
    spawned: bool,
    busy: bool,
    job: Option<Arc<SplitPoint>>,
}

impl ThreadPool {
    fn new() -> Self {
        let slots = (0..MAX_THREADS).map(|_| Slot { state: Mutex::new(SlotState::default()), wake: Condvar::new() }).collect();
        Self { slots, active_threads: AtomicUsize::new(DEFAULT_THREADS) }
    }

    pub fn threads(&self) -> usize {
        self.active_threads.load(Ordering::Relaxed)
    }

    /// True when some worker is parked and could pick up a split point.
    pub fn available_slave_exists(&self) -> bool {
        (1..self.threads()).any(|id| {
            let state = self.slots[id].state.lock().unwrap();
            state.spawned && !state.busy
        })
    }
}

/// A node whose remaining moves are exposed for parallel workers. The
/// immutable part describes the node; the cursors every participant
/// mutates live behind the mutex.
pub struct SplitPoint {
    pub master: usize,
    pub ply: usize,
    pub depth: i32,
    pub beta: i32,
    pub pv_node: bool,
    pub threat_move: Move,
    pub board: Board,
    pub frames: [Frame; 5],

    /// Raised by the participant that finds a beta cutoff; everyone else
    /// abandons the split point on their next check.
    pub beta_cutoff: AtomicBool,

    state: Mutex<SplitState>,
    joined: Condvar,
}

pub struct SplitState {
    pub moves: Vec<Move>,
    pub cursor: usize,
    pub alpha: i32,
    pub best_value: i32,
    pub best_move: Move,
    pub move_count: i32,
    pub pv: Vec<Move>,
    pub slaves: u64,
}

impl SplitPoint {
    pub fn lock(&self) -> MutexGuard<SplitState> {
        self.state.lock().unwrap()
    }

    pub fn cutoff_occurred(&self) -> bool {
        self.beta_cutoff.load(Ordering::Relaxed)
    }
}

/// Per-thread search state. Thread 0 is the UCI thread and owns the root
/// move list and input polling; workers only ever search split subtrees.
pub struct ThreadData {
    pub id: usize,
    pub shared: Arc<SharedContext>,
    pub board: Board,
    pub stack: Stack,
    pub pv: PrincipalVariationTable,
    pub ply: usize,

    pub root_moves: RootMoveList,
    pub multi_pv: usize,
    pub limits: Limits,
    pub time_manager: TimeManager,

    pub nodes_since_poll: u64,
    pub nodes_between_polls: u64,
    pub input: Option<std::sync::mpsc::Receiver<String>>,

    /// Split points this thread currently participates in, innermost last.
    pub sp_chain: Vec<Arc<SplitPoint>>,
}

impl ThreadData {
    pub fn new(id: usize, shared: Arc<SharedContext>) -> Self {
        Self {
            id,
            shared,
            board: Board::starting_position(),
            stack: Stack::default(),
            pv: PrincipalVariationTable::default(),
            ply: 0,
            root_moves: RootMoveList::default(),
            multi_pv: 1,
            limits: Limits::default(),
            time_manager: TimeManager::infinite(),
            nodes_since_poll: 0,
            nodes_between_polls: 30_000,
            input: None,
            sp_chain: Vec::new(),
        }
    }

    /// A beta cutoff somewhere up this thread's split-point chain makes the
    /// value of the current subtree irrelevant.
    pub fn cutoff_occurred(&self) -> bool {
        self.sp_chain.iter().any(|sp| sp.cutoff_occurred())
    }

    pub fn count_node(&mut self) {
        self.shared.nodes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Publishes a split point for the remaining `moves` of the current node,
/// recruits idle slaves, joins the master in as a participant, and blocks
/// until every slave has detached (helpful-master: the master never returns
/// first). Returns the merged `(best_value, best_move, alpha, pv)`.
#[allow(clippy::too_many_arguments)]
pub fn split(
    td: &mut ThreadData, alpha: i32, beta: i32, best_value: i32, best_move: Move, depth: i32, threat_move: Move,
    move_count: i32, moves: Vec<Move>, pv_node: bool,
) -> (i32, Move, i32, Vec<Move>) {
    let sp = Arc::new(SplitPoint {
        master: td.id,
        ply: td.ply,
        depth,
        beta,
        pv_node,
        threat_move,
        board: td.board.clone(),
        frames: td.stack.frames_around(td.ply),
        beta_cutoff: AtomicBool::new(false),
        state: Mutex::new(SplitState {
            moves,
            cursor: 0,
            alpha,
            best_value,
            best_move,
            move_count,
            pv: Vec::new(),
            slaves: 0,
        }),
        joined: Condvar::new(),
    });

    let mut recruited = 0;
    for id in 1..td.shared.pool.threads() {
        if recruited == MAX_SLAVES_PER_SPLIT || id == td.id {
            continue;
        }

        let slot = &td.shared.pool.slots[id];
        let mut state = slot.state.lock().unwrap();
        if !state.spawned || state.busy || state.job.is_some() {
            continue;
        }

        state.busy = true;
        state.job = Some(Arc::clone(&sp));
        sp.lock().slaves |= 1 << id;
        slot.wake.notify_one();
        recruited += 1;
    }

    log::trace!("thread {} split at depth {} with {} slaves", td.id, depth, recruited);

    // The master works its own split point; that is the "help".
    td.sp_chain.push(Arc::clone(&sp));
    search::split_search(td, &sp);
    td.sp_chain.pop();

    let mut state = sp.lock();
    while state.slaves != 0 {
        state = sp.joined.wait(state).unwrap();
    }

    let pv = std::mem::take(&mut state.pv);
    (state.best_value, state.best_move, state.alpha, pv)
}

/// Worker threads park here between split points.
fn idle_loop(shared: Arc<SharedContext>, id: usize) {
    let mut td = ThreadData::new(id, Arc::clone(&shared));

    loop {
        let sp = {
            let slot = &shared.pool.slots[id];
            let mut state = slot.state.lock().unwrap();
            loop {
                if let Some(job) = state.job.take() {
                    break job;
                }
                state = slot.wake.wait(state).unwrap();
            }
        };

        log::trace!("thread {id} joins a split point of thread {}", sp.master);

        td.board = sp.board.clone();
        td.stack.restore_around(sp.ply, &sp.frames);
        td.ply = sp.ply;
        td.pv.clear(sp.ply);

        td.sp_chain.push(Arc::clone(&sp));
        search::split_search(&mut td, &sp);
        td.sp_chain.pop();

        {
            let mut state = sp.lock();
            state.slaves &= !(1 << id);
            sp.joined.notify_all();
        }

        let slot = &shared.pool.slots[id];
        slot.state.lock().unwrap().busy = false;
    }
}

impl Default for SharedContext {
    fn default() -> Self {
        Self::new()
    }
}
