//! Master/worker IDA*: the master expands the root once, then every round
//! hands each child subtree to a worker and folds the replies into the next
//! bound.
//!
//! A worker that stops replying blocks the master forever; there is no
//! timeout or retry.

mod master;
pub mod protocol;
mod transport;
mod worker;

pub use master::Master;
pub use protocol::{MasterMessage, WireState, WorkerReply};
pub use transport::{ChannelTransport, ProcessTransport, StdioWorkerLink};
pub use worker::run_worker;

use anyhow::Result;

/// Master side of the connection to a fixed set of workers.
pub trait MasterLink {
    /// Number of connected workers, addressed as `0..workers()`.
    fn workers(&self) -> usize;

    fn send(&mut self, worker: usize, message: MasterMessage) -> Result<()>;

    /// Blocks until any worker replies.
    fn recv(&mut self) -> Result<(usize, WorkerReply)>;
}

/// Worker side of the connection to the master.
pub trait WorkerLink {
    fn recv(&mut self) -> Result<MasterMessage>;

    fn send(&mut self, reply: WorkerReply) -> Result<()>;
}
