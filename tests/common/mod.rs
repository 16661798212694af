use slider_ida::Puzzle;
use std::collections::{HashSet, VecDeque};

/// Exact distance to the goal by breadth-first search. Only practical for
/// small boards.
pub fn bfs_distance(root: &Puzzle) -> Option<u32> {
    let goal = Puzzle::new(root.size());
    let start = root.clone().into_root();
    let mut seen = HashSet::from([start.tiles().to_vec()]);
    let mut queue = VecDeque::from([start]);

    while let Some(state) = queue.pop_front() {
        if state == goal {
            return Some(state.depth());
        }
        for child in state.successors() {
            if seen.insert(child.tiles().to_vec()) {
                queue.push_back(child);
            }
        }
    }
    None
}
