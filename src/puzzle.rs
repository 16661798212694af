use anyhow::{bail, ensure, Context, Result};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Direction the blank travels when a neighbouring tile slides into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// Fixed expansion order used by every search strategy.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    pub fn as_offset(&self) -> (isize, isize) {
        match self {
            Move::Up => (-1, 0),
            Move::Down => (1, 0),
            Move::Left => (0, -1),
            Move::Right => (0, 1),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Move::Up => Move::Down,
            Move::Down => Move::Up,
            Move::Left => Move::Right,
            Move::Right => Move::Left,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Move::Up => "Up",
            Move::Down => "Down",
            Move::Left => "Left",
            Move::Right => "Right",
        };
        write!(f, "{}", s)
    }
}

/// Persistent list of the moves that led to a state, newest first.
/// Siblings share their common prefix.
#[derive(Debug)]
struct Trail {
    step: Move,
    prev: Option<Arc<Trail>>,
}

/// One node of the search tree: a grid configuration plus how it was reached.
///
/// Only the last move is consulted during search (to forbid undoing it); the
/// full trail is kept so the path can be rebuilt from a terminal node.
#[derive(Debug, Clone)]
pub struct Puzzle {
    size: usize,
    board: Vec<u8>,
    blank: (usize, usize),
    depth: u32,
    last_move: Option<Move>,
    trail: Option<Arc<Trail>>,
}

/// Largest grid whose tiles fit in a `u8`.
pub const MAX_SIZE: usize = 16;

/// Checks that `size` is a dimension this crate can represent.
pub fn check_size(size: usize) -> Result<()> {
    ensure!(size >= 2, "puzzle size must be at least 2, got {size}");
    ensure!(
        size <= MAX_SIZE,
        "puzzle size {size} is too large, at most {MAX_SIZE} is supported"
    );
    Ok(())
}

impl Puzzle {
    /// The goal configuration: tiles in row-major order, blank last.
    ///
    /// # Panics
    ///
    /// Panics if `size` is outside `2..=MAX_SIZE`; see [`check_size`].
    pub fn new(size: usize) -> Self {
        assert!(
            (2..=MAX_SIZE).contains(&size),
            "puzzle size must be in 2..={MAX_SIZE}, got {size}"
        );
        let cells = size * size;
        let mut board: Vec<u8> = (1..cells).map(|value| value as u8).collect();
        board.push(0); // The empty space is represented by 0

        Self {
            size,
            board,
            blank: (size - 1, size - 1),
            depth: 0,
            last_move: None,
            trail: None,
        }
    }

    /// Builds a root state from row-major tiles, checking the permutation.
    pub fn from_tiles(size: usize, tiles: Vec<u8>) -> Result<Self> {
        check_size(size)?;
        ensure!(
            tiles.len() == size * size,
            "expected {} tiles for a {size}x{size} puzzle, got {}",
            size * size,
            tiles.len()
        );

        let mut seen = vec![false; tiles.len()];
        for &tile in &tiles {
            let slot = seen
                .get_mut(tile as usize)
                .with_context(|| {
                    format!("tile {tile} is out of range for a {size}x{size} puzzle")
                })?;
            ensure!(!*slot, "tile {tile} appears more than once");
            *slot = true;
        }

        let index = tiles
            .iter()
            .position(|&tile| tile == 0)
            .context("puzzle has no blank tile")?;

        Ok(Self {
            size,
            board: tiles,
            blank: (index / size, index % size),
            depth: 0,
            last_move: None,
            trail: None,
        })
    }

    /// Reads a puzzle from a text file of whitespace-separated rows.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read puzzle from {}", path.display()))?;
        text.parse()
            .with_context(|| format!("invalid puzzle in {}", path.display()))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn tiles(&self) -> &[u8] {
        &self.board
    }

    pub fn blank(&self) -> (usize, usize) {
        self.blank
    }

    /// Number of moves taken from the root (the search g cost).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    pub fn tile(&self, row: usize, col: usize) -> u8 {
        self.board[row * self.size + col]
    }

    /// Slides the neighbouring tile into the blank. Returns false when the
    /// blank would leave the grid. History is not touched.
    pub fn apply_move(&mut self, movement: Move) -> bool {
        let (dx, dy) = movement.as_offset();

        let new_x = self.blank.0 as isize + dx;
        let new_y = self.blank.1 as isize + dy;

        if new_x >= 0 && new_x < self.size as isize && new_y >= 0 && new_y < self.size as isize {
            let from = self.blank.0 * self.size + self.blank.1;
            let to = new_x as usize * self.size + new_y as usize;

            self.board.swap(from, to);
            self.blank = (new_x as usize, new_y as usize);
            true
        } else {
            false
        }
    }

    /// The child reached by `dir`, one level deeper, or `None` if illegal.
    pub fn try_move(&self, dir: Move) -> Option<Self> {
        let mut child = self.clone();
        if !child.apply_move(dir) {
            return None;
        }
        child.depth = self.depth + 1;
        child.last_move = Some(dir);
        child.trail = Some(Arc::new(Trail {
            step: dir,
            prev: self.trail.clone(),
        }));
        Some(child)
    }

    /// Legal children in `Move::ALL` order, without the move that would undo
    /// the one that produced this state.
    pub fn successors(&self) -> Vec<Self> {
        let reverse = self.last_move.map(|last| last.opposite());
        Move::ALL
            .iter()
            .filter(|&&dir| Some(dir) != reverse)
            .filter_map(|&dir| self.try_move(dir))
            .collect()
    }

    /// Moves from the root to this state, oldest first.
    pub fn moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(self.depth as usize);
        let mut cursor = self.trail.as_deref();
        while let Some(node) = cursor {
            moves.push(node.step);
            cursor = node.prev.as_deref();
        }
        moves.reverse();
        moves
    }

    /// Applies `moves` in order, extending this state's history.
    pub fn replay(&self, moves: &[Move]) -> Result<Self> {
        let mut state = self.clone();
        for (index, &dir) in moves.iter().enumerate() {
            state = state
                .try_move(dir)
                .with_context(|| format!("move #{index} ({dir}) leaves the grid"))?;
        }
        Ok(state)
    }

    /// Same grid, with its history replaced by `moves` (which must have been
    /// taken from some root to reach this grid).
    pub fn with_history(mut self, moves: &[Move]) -> Self {
        self.depth = moves.len() as u32;
        self.last_move = moves.last().copied();
        self.trail = moves.iter().fold(None, |prev, &step| Some(Arc::new(Trail { step, prev })));
        self
    }

    /// Forgets how this grid was reached, making it a fresh root.
    pub fn into_root(self) -> Self {
        self.with_history(&[])
    }

    pub fn heuristic(&self) -> u32 {
        self.manhattan_distance()
    }

    /// Sum over all non-blank tiles of their row and column distance to the
    /// goal cell.
    pub fn manhattan_distance(&self) -> u32 {
        let size = self.size;
        self.board
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value != 0)
            .map(|(index, &value)| {
                let target = value as usize - 1;
                let (row, col) = (index / size, index % size);
                (row.abs_diff(target / size) + col.abs_diff(target % size)) as u32
            })
            .sum()
    }

    pub fn is_solved(&self) -> bool {
        self.heuristic() == 0
    }

    pub fn is_current_state_solvable(&self) -> bool {
        Self::is_solvable(&self.board, self.size, self.blank.0)
    }

    fn is_solvable(flattened: &[u8], size: usize, empty_row: usize) -> bool {
        let inversions = Self::count_inversions(flattened);

        if size % 2 == 1 {
            // Odd width: solvable iff the inversion count is even
            inversions % 2 == 0
        } else {
            // Even width: the blank row (from the top) flips the parity
            (inversions + empty_row) % 2 == 1
        }
    }

    fn count_inversions(flattened: &[u8]) -> usize {
        flattened
            .iter()
            .enumerate()
            .filter(|&(_, &val)| val != 0)
            .map(|(i, &val)| {
                flattened[i + 1..]
                    .iter()
                    .filter(|&&next| next != 0 && next < val)
                    .count()
            })
            .sum()
    }

    /// A uniformly random solvable configuration.
    pub fn shuffle<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        let mut puzzle = Self::new(size);

        loop {
            puzzle.board.shuffle(rng);
            if let Some(index) = puzzle.board.iter().position(|&tile| tile == 0) {
                puzzle.blank = (index / size, index % size);
            }

            if puzzle.is_current_state_solvable() {
                return puzzle;
            }
        }
    }

    /// The goal scrambled by a random walk of `steps` legal moves that never
    /// immediately undoes itself. The result is a fresh root.
    pub fn scramble<R: Rng + ?Sized>(size: usize, steps: usize, rng: &mut R) -> Self {
        let mut puzzle = Self::new(size);
        for _ in 0..steps {
            let options = puzzle.successors();
            if let Some(next) = options.choose(rng) {
                puzzle = next.clone();
            }
        }
        puzzle.into_root()
    }
}

impl PartialEq for Puzzle {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.board == other.board
    }
}

impl Eq for Puzzle {}

impl FromStr for Puzzle {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self> {
        let rows = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| {
                line.split_whitespace()
                    .map(|token| {
                        token.parse::<u8>().with_context(|| {
                            format!("line {}: `{token}` is not a tile number", number + 1)
                        })
                    })
                    .collect::<Result<Vec<u8>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let size = rows.len();
        if size == 0 {
            bail!("puzzle input is empty");
        }
        for (index, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == size,
                "row {} has {} tiles, expected {size}",
                index + 1,
                row.len()
            );
        }

        Self::from_tiles(size, rows.into_iter().flatten().collect())
    }
}

impl fmt::Display for Puzzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.board.chunks(self.size) {
            for &val in row {
                write!(f, "{:2} ", val)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
