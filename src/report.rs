use crate::search::Solution;
use anyhow::{Context, Result};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// What a finished run hands to the outside world.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub strategy: String,
    pub elapsed: Duration,
    pub solution: Solution,
}

impl RunReport {
    pub fn new(strategy: impl Into<String>, elapsed: Duration, solution: Solution) -> Self {
        Self {
            strategy: strategy.into(),
            elapsed,
            solution,
        }
    }

    pub fn final_heuristic(&self) -> u32 {
        self.solution.state.heuristic()
    }

    /// Appends a one-line timing entry to `path`, creating it if needed.
    pub fn append_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        writeln!(
            file,
            "{} algorithm: {:.3} seconds (solved: {}, steps: {})",
            self.strategy,
            self.elapsed.as_secs_f64(),
            self.solution.solved,
            self.solution.steps()
        )
        .with_context(|| format!("failed to write to log file {}", path.display()))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run time: {:.3} seconds", self.elapsed.as_secs_f64())?;
        writeln!(f, "Resulting puzzle:\n{}", self.solution.state)?;
        writeln!(f, "Solved: {}", self.solution.solved)?;
        writeln!(f, "Steps: {}", self.solution.steps())?;
        writeln!(f, "Rounds: {}", self.solution.rounds)?;
        write!(f, "Final heuristic distance: {}", self.final_heuristic())
    }
}
