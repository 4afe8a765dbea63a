use std::time::Instant;

/// Search limits parsed from the `go` command. Zero means "not set".
#[derive(Copy, Clone, Default)]
pub struct Limits {
    pub time: i64,
    pub increment: i64,
    pub moves_to_go: i32,
    pub max_depth: i32,
    pub max_nodes: u64,
    pub max_time: i64,
    pub infinite: bool,
    pub ponder: bool,
}

impl Limits {
    /// Wall-clock time management applies only when no explicit bound is set.
    pub fn use_time_management(&self) -> bool {
        self.max_time == 0 && self.max_depth == 0 && self.max_nodes == 0 && !self.infinite
    }
}

const TIME_OVERHEAD_MS: i64 = 30;
const MOVE_HORIZON: i32 = 32;
const MAX_INSTABILITY: f64 = 1.6;

/// Splits the remaining clock into an optimum budget for this move and a
/// hard maximum, and stretches the optimum when the best move is unstable.
pub struct TimeManager {
    start_time: Instant,
    optimum: i64,
    maximum: i64,
    instability: f64,
}

impl TimeManager {
    pub fn new(limits: &Limits) -> Self {
        let horizon = match limits.moves_to_go {
            0 => MOVE_HORIZON,
            moves => moves.min(MOVE_HORIZON),
        } as i64;

        let time = (limits.time - TIME_OVERHEAD_MS).max(0);
        let base = time / horizon + limits.increment * 3 / 4;

        let optimum = base.min(time).max(1);
        let maximum = (base * 6).min(time * 4 / 5).max(optimum);

        Self { start_time: Instant::now(), optimum, maximum, instability: 1.0 }
    }

    pub fn infinite() -> Self {
        Self { start_time: Instant::now(), optimum: i64::MAX / 2, maximum: i64::MAX / 2, instability: 1.0 }
    }

    pub fn elapsed(&self) -> i64 {
        self.start_time.elapsed().as_millis() as i64
    }

    /// The budget for this move, stretched by PV instability.
    pub fn available_time(&self) -> i64 {
        (self.optimum as f64 * self.instability) as i64
    }

    pub fn maximum_time(&self) -> i64 {
        self.maximum
    }

    /// Feeds back how often the best move changed in the last two
    /// iterations; a restless PV earns extra time.
    pub fn pv_instability(&mut self, current_changes: u32, previous_changes: u32) {
        self.instability = (1.0 + 0.1 * current_changes as f64 + 0.03 * previous_changes as f64).min(MAX_INSTABILITY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimum_stays_within_the_clock() {
        let manager = TimeManager::new(&Limits { time: 1000, increment: 0, ..Limits::default() });

        assert!(manager.available_time() <= 1000);
        assert!(manager.maximum_time() <= 800);
        assert!(manager.available_time() <= manager.maximum_time());
    }

    #[test]
    fn instability_extends_the_budget() {
        let mut manager = TimeManager::new(&Limits { time: 60_000, increment: 1000, ..Limits::default() });
        let base = manager.available_time();

        manager.pv_instability(3, 1);
        assert!(manager.available_time() > base);

        manager.pv_instability(100, 100);
        assert!(manager.available_time() <= (base as f64 * MAX_INSTABILITY) as i64 + 1);
    }

    #[test]
    fn time_management_detection() {
        assert!(Limits { time: 1000, ..Limits::default() }.use_time_management());
        assert!(!Limits { infinite: true, ..Limits::default() }.use_time_management());
        assert!(!Limits { max_depth: 8, ..Limits::default() }.use_time_management());
    }
}
