pub const DEFAULT_THREADS: usize = 12;
pub const DEFAULT_MOVE_THRESHOLD: u32 = 80;
pub const DEFAULT_PUZZLE_SIZE: usize = 4;

/// Knobs shared by all runners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolverConfig {
    /// Thread budget for the shared-memory runner; also sizes its pool.
    pub threads: usize,
    /// Total cost past which a branch is abandoned and the run gives up.
    pub move_threshold: u32,
    /// Expected grid dimension.
    pub size: usize,
    /// Distributed worker count. `None` means one worker per child of the
    /// root, which is checked strictly before the first round.
    pub workers: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            move_threshold: DEFAULT_MOVE_THRESHOLD,
            size: DEFAULT_PUZZLE_SIZE,
            workers: None,
        }
    }
}

impl SolverConfig {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_move_threshold(mut self, move_threshold: u32) -> Self {
        self.move_threshold = move_threshold;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_fifteen_puzzle_setup() {
        let config = SolverConfig::default();
        assert_eq!(config.threads, 12);
        assert_eq!(config.move_threshold, 80);
        assert_eq!(config.size, 4);
        assert_eq!(config.workers, None);
    }

    #[test]
    fn builders_override_single_fields() {
        let config = SolverConfig::new(3)
            .with_threads(2)
            .with_move_threshold(20)
            .with_workers(3);
        assert_eq!(config.size, 3);
        assert_eq!(config.threads, 2);
        assert_eq!(config.move_threshold, 20);
        assert_eq!(config.workers, Some(3));
    }
}
