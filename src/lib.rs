//! Sliding-tile puzzle solver built on IDA*, with sequential, shared-memory
//! parallel and master/worker distributed runners over the same bounded
//! search.

pub mod config;
pub mod distributed;
pub mod parallel;
pub mod puzzle;
pub mod report;
pub mod search;

pub use config::SolverConfig;
pub use parallel::ParallelRunner;
pub use puzzle::{Move, Puzzle};
pub use report::RunReport;
pub use search::{SearchOutcome, SequentialRunner, Solution};
