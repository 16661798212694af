//! Bounded depth-first search and the iterative-deepening loop around it.

use crate::config::SolverConfig;
use crate::puzzle::{Move, Puzzle};
use std::convert::Infallible;
use tracing::{debug, info, trace};

/// Result of one bounded search over a subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The goal was reached; carries the terminal node.
    Solved(Puzzle),
    /// No goal within the bound; `f` is the smallest total cost seen past
    /// the bound and `state` the node that produced it.
    Bounded { f: u32, state: Puzzle },
}

impl SearchOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, SearchOutcome::Solved(_))
    }
}

/// Final answer of a runner.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Terminal node when solved, otherwise the best frontier node reached.
    pub state: Puzzle,
    pub solved: bool,
    /// Bound of the last round, or the candidate f that hit the threshold.
    pub bound: u32,
    /// Number of bounded search rounds that were run.
    pub rounds: u32,
}

impl Solution {
    pub fn steps(&self) -> u32 {
        self.state.depth()
    }

    pub fn moves(&self) -> Vec<Move> {
        self.state.moves()
    }
}

/// Prune and goal checks shared by every search variant. `None` means the
/// node has to be expanded.
pub(crate) fn base_case(state: &Puzzle, bound: u32, threshold: u32) -> Option<SearchOutcome> {
    let h = state.heuristic();
    let f = state.depth() + h;

    if f > bound || f > threshold {
        return Some(SearchOutcome::Bounded {
            f,
            state: state.clone(),
        });
    }
    if h == 0 {
        return Some(SearchOutcome::Solved(state.clone()));
    }
    None
}

/// Folds child outcomes in order: the first `Solved` wins immediately and
/// stops pulling from `outcomes`, otherwise the lowest f (earliest on ties).
pub(crate) fn select_best(
    parent: &Puzzle,
    outcomes: impl IntoIterator<Item = SearchOutcome>,
) -> SearchOutcome {
    let mut best: Option<(u32, Puzzle)> = None;

    for outcome in outcomes {
        match outcome {
            SearchOutcome::Solved(state) => return SearchOutcome::Solved(state),
            SearchOutcome::Bounded { f, state } => {
                if best.as_ref().map_or(true, |(min, _)| f < *min) {
                    best = Some((f, state));
                }
            }
        }
    }

    match best {
        Some((f, state)) => SearchOutcome::Bounded { f, state },
        // A dead end can never lead to the goal.
        None => SearchOutcome::Bounded {
            f: u32::MAX,
            state: parent.clone(),
        },
    }
}

/// Depth-first branch-and-bound below `state` with a fixed `bound`.
pub fn bounded_search(state: &Puzzle, bound: u32, threshold: u32) -> SearchOutcome {
    if let Some(outcome) = base_case(state, bound, threshold) {
        return outcome;
    }

    let children = state.successors();
    select_best(
        state,
        children
            .iter()
            .map(|child| bounded_search(child, bound, threshold)),
    )
}

/// Repeats `round` with a growing bound until it reports a solution or the
/// smallest exceeding f reaches `threshold`.
pub(crate) fn deepen<F, E>(root: &Puzzle, threshold: u32, mut round: F) -> Result<Solution, E>
where
    F: FnMut(u32) -> Result<SearchOutcome, E>,
{
    let mut bound = root.heuristic();
    let mut rounds = 0;

    loop {
        rounds += 1;
        debug!(round = rounds, bound, "starting bounded search");

        match round(bound)? {
            SearchOutcome::Solved(state) => {
                debug!(round = rounds, steps = state.depth(), "goal reached");
                return Ok(Solution {
                    state,
                    solved: true,
                    bound,
                    rounds,
                });
            }
            SearchOutcome::Bounded { f, state } => {
                trace!(round = rounds, f, "best frontier node:\n{}", state);
                if f >= threshold {
                    debug!(round = rounds, f, threshold, "move threshold reached");
                    return Ok(Solution {
                        state,
                        solved: false,
                        bound: f,
                        rounds,
                    });
                }
                bound = f;
            }
        }
    }
}

/// Single-threaded IDA*.
#[derive(Debug, Clone)]
pub struct SequentialRunner {
    config: SolverConfig,
}

impl SequentialRunner {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, root: &Puzzle) -> Solution {
        let threshold = self.config.move_threshold;
        info!(heuristic = root.heuristic(), threshold, "sequential search started");

        let deepened = deepen(root, threshold, |bound| {
            Ok::<_, Infallible>(bounded_search(root, bound, threshold))
        });
        let solution = match deepened {
            Ok(solution) => solution,
            Err(never) => match never {},
        };

        info!(
            solved = solution.solved,
            steps = solution.steps(),
            rounds = solution.rounds,
            "sequential search finished"
        );
        solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(text: &str) -> Puzzle {
        text.parse().unwrap()
    }

    #[test]
    fn prunes_past_the_bound_and_the_threshold() {
        let state = grid("1 2 3\n4 0 6\n7 5 8");
        match base_case(&state, 1, 80) {
            Some(SearchOutcome::Bounded { f, .. }) => assert_eq!(f, 2),
            other => panic!("expected a pruned node, got {other:?}"),
        }
        assert!(matches!(
            base_case(&state, 10, 1),
            Some(SearchOutcome::Bounded { f: 2, .. })
        ));
        assert!(base_case(&state, 2, 80).is_none());
    }

    #[test]
    fn select_best_prefers_solutions_then_lowest_f() {
        let parent = Puzzle::new(3);
        let a = grid("1 2 3\n4 5 6\n7 0 8");
        let b = grid("1 2 3\n4 5 6\n0 7 8");

        let best = select_best(
            &parent,
            vec![
                SearchOutcome::Bounded { f: 9, state: a.clone() },
                SearchOutcome::Bounded { f: 7, state: b.clone() },
                SearchOutcome::Bounded { f: 7, state: a.clone() },
            ],
        );
        assert_eq!(best, SearchOutcome::Bounded { f: 7, state: b });

        let mut pulled = 0;
        let best = select_best(
            &parent,
            [
                SearchOutcome::Solved(parent.clone()),
                SearchOutcome::Bounded { f: 1, state: a },
            ]
            .into_iter()
            .inspect(|_| pulled += 1),
        );
        assert!(best.is_solved());
        assert_eq!(pulled, 1);
    }

    #[test]
    fn solves_the_three_by_three_scenario_optimally() {
        let root = grid("1 2 3\n4 0 6\n7 5 8");
        let config = SolverConfig::new(3).with_move_threshold(20);
        let solution = SequentialRunner::new(config).run(&root);

        assert!(solution.solved);
        assert_eq!(solution.steps(), 2);
        assert_eq!(solution.moves(), vec![Move::Down, Move::Right]);
        assert_eq!(root.replay(&solution.moves()).unwrap(), Puzzle::new(3));
    }

    #[test]
    fn solved_root_returns_immediately() {
        let solution = SequentialRunner::new(SolverConfig::default()).run(&Puzzle::new(4));
        assert!(solution.solved);
        assert_eq!(solution.steps(), 0);
        assert_eq!(solution.rounds, 1);
    }

    #[test]
    fn unsolvable_puzzle_runs_into_the_threshold() {
        let root = grid("2 1\n3 0");
        let config = SolverConfig::new(2).with_move_threshold(80);
        let solution = SequentialRunner::new(config).run(&root);

        assert!(!solution.solved);
        assert!(solution.bound >= 80);
    }

    #[test]
    fn bounds_grow_monotonically() {
        let root = grid("0 1 2\n4 5 3\n7 8 6");
        let mut seen = Vec::new();
        let solution = deepen(&root, 30, |bound| {
            seen.push(bound);
            Ok::<_, Infallible>(bounded_search(&root, bound, 30))
        })
        .unwrap();

        assert!(solution.solved);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(*seen.last().unwrap(), solution.steps());
    }
}
