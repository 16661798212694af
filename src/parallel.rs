//! Fork/join IDA* on a fixed-size rayon pool.

use crate::config::SolverConfig;
use crate::puzzle::Puzzle;
use crate::search::{base_case, bounded_search, deepen, select_best, SearchOutcome, Solution};
use anyhow::{ensure, Context, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::convert::Infallible;
use tracing::info;

/// Bounded search that forks one task per child while the thread budget
/// allows it, splitting the budget evenly at every level.
///
/// Each task writes only its own slot; slots are read after the scope joins.
/// Siblings of a solved subtree still run to completion.
pub fn forked_search(state: &Puzzle, bound: u32, threshold: u32, budget: usize) -> SearchOutcome {
    if budget <= 1 {
        return bounded_search(state, bound, threshold);
    }
    if let Some(outcome) = base_case(state, bound, threshold) {
        return outcome;
    }

    let children = state.successors();
    let share = budget / children.len().max(1);
    let mut slots: Vec<Option<SearchOutcome>> = children.iter().map(|_| None).collect();

    rayon::scope(|scope| {
        for (slot, child) in slots.iter_mut().zip(&children) {
            scope.spawn(move |_| {
                *slot = Some(forked_search(child, bound, threshold, share));
            });
        }
    });

    select_best(state, slots.into_iter().flatten())
}

/// IDA* whose rounds run [`forked_search`] on a dedicated pool.
pub struct ParallelRunner {
    config: SolverConfig,
    pool: ThreadPool,
}

impl ParallelRunner {
    pub fn new(config: SolverConfig) -> Result<Self> {
        ensure!(config.threads > 0, "thread budget must be positive");
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|index| format!("ida-search-{index}"))
            .build()
            .context("failed to build the search thread pool")?;
        Ok(Self { config, pool })
    }

    pub fn run(&self, root: &Puzzle) -> Solution {
        let threshold = self.config.move_threshold;
        let budget = self.config.threads;
        info!(
            heuristic = root.heuristic(),
            threshold,
            threads = budget,
            "parallel search started"
        );

        let deepened = self.pool.install(|| {
            deepen(root, threshold, |bound| {
                Ok::<_, Infallible>(forked_search(root, bound, threshold, budget))
            })
        });
        let solution = match deepened {
            Ok(solution) => solution,
            Err(never) => match never {},
        };

        info!(
            solved = solution.solved,
            steps = solution.steps(),
            rounds = solution.rounds,
            "parallel search finished"
        );
        solution
    }
}
