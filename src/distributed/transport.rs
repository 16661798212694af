use super::protocol::{read_frame, write_frame};
use super::{run_worker, MasterLink, MasterMessage, WorkerLink, WorkerReply};
use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Worker side over any line-oriented byte stream (stdin/stdout of a worker
/// process, or in-memory buffers).
pub struct StdioWorkerLink<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> StdioWorkerLink<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: BufRead, W: Write> WorkerLink for StdioWorkerLink<R, W> {
    fn recv(&mut self) -> Result<MasterMessage> {
        read_frame(&mut self.reader)?.context("master closed the channel")
    }

    fn send(&mut self, reply: WorkerReply) -> Result<()> {
        write_frame(&mut self.writer, &reply)
    }
}

struct ChannelWorkerLink {
    id: usize,
    inbox: Receiver<MasterMessage>,
    outbox: Sender<(usize, Result<WorkerReply>)>,
}

impl WorkerLink for ChannelWorkerLink {
    fn recv(&mut self) -> Result<MasterMessage> {
        self.inbox
            .recv()
            .map_err(|_| anyhow!("master of worker {} hung up", self.id))
    }

    fn send(&mut self, reply: WorkerReply) -> Result<()> {
        self.outbox
            .send((self.id, Ok(reply)))
            .map_err(|_| anyhow!("worker {} could not reach the master", self.id))
    }
}

/// Receives the next reply from the shared reply channel.
fn recv_reply(replies: &Receiver<(usize, Result<WorkerReply>)>) -> Result<(usize, WorkerReply)> {
    let (worker, reply) = replies
        .recv()
        .map_err(|_| anyhow!("all workers disconnected"))?;
    let reply = reply.with_context(|| format!("worker {worker} failed"))?;
    Ok((worker, reply))
}

/// Workers as threads of this process, wired with crossbeam channels.
pub struct ChannelTransport {
    inboxes: Vec<Sender<MasterMessage>>,
    replies: Receiver<(usize, Result<WorkerReply>)>,
    handles: Vec<JoinHandle<Result<()>>>,
}

impl ChannelTransport {
    /// Starts `workers` worker loops, each bounded by `threshold`.
    pub fn spawn(workers: usize, threshold: u32) -> Result<Self> {
        let (reply_tx, replies) = unbounded();
        let mut inboxes = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let (tx, inbox) = unbounded();
            let mut link = ChannelWorkerLink {
                id,
                inbox,
                outbox: reply_tx.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("ida-worker-{id}"))
                .spawn(move || {
                    let result = run_worker(&mut link, threshold);
                    if let Err(err) = &result {
                        // Unblock a master waiting on this worker.
                        let _ = link.outbox.send((id, Err(anyhow!("{err:#}"))));
                    }
                    result
                })
                .with_context(|| format!("failed to spawn worker thread {id}"))?;
            inboxes.push(tx);
            handles.push(handle);
        }
        debug!(workers, "channel workers started");

        Ok(Self {
            inboxes,
            replies,
            handles,
        })
    }
}

impl MasterLink for ChannelTransport {
    fn workers(&self) -> usize {
        self.inboxes.len()
    }

    fn send(&mut self, worker: usize, message: MasterMessage) -> Result<()> {
        let inbox = self
            .inboxes
            .get(worker)
            .with_context(|| format!("no worker with index {worker}"))?;
        inbox
            .send(message)
            .map_err(|_| anyhow!("worker {worker} is gone"))
    }

    fn recv(&mut self) -> Result<(usize, WorkerReply)> {
        recv_reply(&self.replies)
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        // Workers that never saw a shutdown exit once their inbox closes.
        self.inboxes.clear();
        for (id, handle) in self.handles.drain(..).enumerate() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!(worker = id, "worker stopped: {err:#}"),
                Err(_) => warn!(worker = id, "worker thread panicked"),
            }
        }
    }
}

/// Pushes every reply frame from one worker's output into the shared
/// channel. The stream ending is forwarded as an error so a master waiting
/// on that worker fails instead of blocking.
fn forward_replies<R: BufRead>(
    id: usize,
    mut reader: R,
    tx: &Sender<(usize, Result<WorkerReply>)>,
) {
    loop {
        let reply = match read_frame::<_, WorkerReply>(&mut reader) {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(anyhow!("worker {id} closed its output")),
            Err(err) => Err(err),
        };
        let failed = reply.is_err();
        if tx.send((id, reply)).is_err() || failed {
            break;
        }
    }
}

/// Workers as child processes running `<program> worker`, speaking JSON
/// lines over their stdin and stdout.
pub struct ProcessTransport {
    children: Vec<Child>,
    stdins: Vec<ChildStdin>,
    replies: Receiver<(usize, Result<WorkerReply>)>,
    readers: Vec<JoinHandle<()>>,
}

impl ProcessTransport {
    pub fn spawn(program: impl AsRef<Path>, workers: usize, threshold: u32) -> Result<Self> {
        let program = program.as_ref();
        let (reply_tx, replies) = unbounded();
        let mut transport = Self {
            children: Vec::with_capacity(workers),
            stdins: Vec::with_capacity(workers),
            replies,
            readers: Vec::with_capacity(workers),
        };

        for id in 0..workers {
            let mut child = Command::new(program)
                .arg("worker")
                .arg("--threshold")
                .arg(threshold.to_string())
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .with_context(|| {
                    format!("failed to start worker process {}", program.display())
                })?;

            let stdin = child.stdin.take().context("worker stdin is not piped")?;
            let stdout = child.stdout.take().context("worker stdout is not piped")?;
            debug!(worker = id, pid = child.id(), "worker process started");
            transport.children.push(child);
            transport.stdins.push(stdin);

            let tx = reply_tx.clone();
            let reader = thread::Builder::new()
                .name(format!("ida-worker-{id}-reader"))
                .spawn(move || forward_replies(id, BufReader::new(stdout), &tx))
                .context("failed to spawn worker reader thread")?;
            transport.readers.push(reader);
        }

        Ok(transport)
    }
}

impl MasterLink for ProcessTransport {
    fn workers(&self) -> usize {
        self.stdins.len()
    }

    fn send(&mut self, worker: usize, message: MasterMessage) -> Result<()> {
        let Some(stdin) = self.stdins.get_mut(worker) else {
            bail!("no worker with index {worker}");
        };
        write_frame(stdin, &message)
            .with_context(|| format!("failed to message worker {worker}"))
    }

    fn recv(&mut self) -> Result<(usize, WorkerReply)> {
        recv_reply(&self.replies)
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        // Closing stdin ends any worker still waiting for a message.
        self.stdins.clear();
        for (id, child) in self.children.iter_mut().enumerate() {
            match child.wait() {
                Ok(status) if status.success() => {}
                Ok(status) => debug!(worker = id, %status, "worker process exited"),
                Err(err) => warn!(worker = id, "failed to wait for worker process: {err}"),
            }
        }
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                warn!("worker reader thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::protocol::WireState;
    use crate::Puzzle;
    use std::io::Cursor;

    fn bounded_reply() -> WorkerReply {
        WorkerReply::Bounded {
            f: 3,
            state: WireState::from(&Puzzle::new(2)),
        }
    }

    #[test]
    fn closed_worker_output_fails_the_waiting_master() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &bounded_reply()).unwrap();

        let (tx, replies) = unbounded();
        forward_replies(4, Cursor::new(buffer), &tx);
        drop(tx);

        assert_eq!(recv_reply(&replies).unwrap(), (4, bounded_reply()));
        let err = recv_reply(&replies).unwrap_err();
        assert!(format!("{err:#}").contains("worker 4 closed its output"));
        assert!(replies.try_recv().is_err());
    }

    #[test]
    fn malformed_worker_output_is_forwarded_once() {
        let (tx, replies) = unbounded();
        forward_replies(1, Cursor::new(b"not json\n{}\n".to_vec()), &tx);
        drop(tx);

        assert!(recv_reply(&replies).is_err());
        assert!(replies.try_recv().is_err());
    }
}
