use super::{MasterLink, MasterMessage};
use crate::config::SolverConfig;
use crate::puzzle::Puzzle;
use crate::search::{deepen, select_best, SearchOutcome, Solution};
use anyhow::{ensure, Context, Result};
use tracing::{debug, info, trace, warn};

/// Coordinates one distributed solve over `link`.
pub struct Master<L> {
    link: L,
    config: SolverConfig,
}

impl<L: MasterLink> Master<L> {
    pub fn new(link: L, config: SolverConfig) -> Self {
        Self { link, config }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Runs rounds until a worker reports the goal or the best f reaches the
    /// move threshold, then shuts every worker down.
    ///
    /// Fails before any message is sent if the number of connected workers
    /// does not match the configured topology: one per child of the root
    /// unless `config.workers` asks for a pool.
    pub fn run(&mut self, root: &Puzzle) -> Result<Solution> {
        let children = root.successors();
        let expected = self.config.workers.unwrap_or(children.len());
        let connected = self.link.workers();
        ensure!(expected > 0, "distributed search needs at least one worker");
        ensure!(
            connected == expected,
            "topology mismatch: expected {expected} workers for {} root moves, got {connected}",
            children.len()
        );

        let threshold = self.config.move_threshold;
        info!(
            workers = connected,
            subtrees = children.len(),
            heuristic = root.heuristic(),
            threshold,
            "distributed search started"
        );

        if root.heuristic() == 0 {
            self.shutdown()?;
            return Ok(Solution {
                state: root.clone(),
                solved: true,
                bound: 0,
                rounds: 0,
            });
        }

        let solution = match deepen(root, threshold, |bound| self.round(root, &children, bound)) {
            Ok(solution) => solution,
            Err(err) => {
                if let Err(shutdown_err) = self.shutdown() {
                    warn!("failed to shut down workers after an error: {shutdown_err:#}");
                }
                return Err(err);
            }
        };
        self.shutdown()?;

        info!(
            solved = solution.solved,
            steps = solution.steps(),
            rounds = solution.rounds,
            "distributed search finished"
        );
        Ok(solution)
    }

    /// Sends `Shutdown` to every worker.
    pub fn shutdown(&mut self) -> Result<()> {
        for worker in 0..self.link.workers() {
            self.link
                .send(worker, MasterMessage::Shutdown)
                .with_context(|| format!("failed to shut down worker {worker}"))?;
        }
        debug!(workers = self.link.workers(), "workers shut down");
        Ok(())
    }

    /// One bound: every child subtree is searched by some worker. Idle
    /// workers take the next pending child; the round ends only when every
    /// reply is in, even if one of them already reports the goal.
    fn round(&mut self, root: &Puzzle, children: &[Puzzle], bound: u32) -> Result<SearchOutcome> {
        let mut slots: Vec<Option<SearchOutcome>> = children.iter().map(|_| None).collect();
        let mut assigned: Vec<Option<usize>> = vec![None; self.link.workers()];
        let mut pending = children.iter().enumerate();
        let mut in_flight = 0;

        for worker in 0..assigned.len() {
            let Some((index, child)) = pending.next() else {
                break;
            };
            self.assign(worker, bound, child)?;
            assigned[worker] = Some(index);
            in_flight += 1;
        }

        while in_flight > 0 {
            let (worker, reply) = self.link.recv()?;
            let index = assigned
                .get_mut(worker)
                .and_then(Option::take)
                .with_context(|| format!("unexpected reply from idle worker {worker}"))?;
            in_flight -= 1;

            let outcome = SearchOutcome::try_from(reply)
                .with_context(|| format!("worker {worker} sent an invalid reply"))?;
            trace!(worker, subtree = index, solved = outcome.is_solved(), "reply received");
            slots[index] = Some(outcome);

            if let Some((next, child)) = pending.next() {
                self.assign(worker, bound, child)?;
                assigned[worker] = Some(next);
                in_flight += 1;
            }
        }

        Ok(select_best(root, slots.into_iter().flatten()))
    }

    fn assign(&mut self, worker: usize, bound: u32, child: &Puzzle) -> Result<()> {
        trace!(worker, bound, "assigning subtree");
        self.link
            .send(
                worker,
                MasterMessage::Search {
                    bound,
                    state: child.into(),
                },
            )
            .with_context(|| format!("failed to assign work to worker {worker}"))
    }
}
