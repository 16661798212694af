//! Master/worker messages and their newline-delimited JSON framing.

use crate::puzzle::{Move, Puzzle};
use crate::search::SearchOutcome;
use anyhow::{ensure, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

/// A puzzle node as it travels between processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireState {
    pub size: usize,
    pub tiles: Vec<u8>,
    pub depth: u32,
    /// Full history from the root, so the master can rebuild the path.
    pub moves: Vec<Move>,
}

impl From<&Puzzle> for WireState {
    fn from(state: &Puzzle) -> Self {
        Self {
            size: state.size(),
            tiles: state.tiles().to_vec(),
            depth: state.depth(),
            moves: state.moves(),
        }
    }
}

impl TryFrom<WireState> for Puzzle {
    type Error = anyhow::Error;

    fn try_from(wire: WireState) -> Result<Self> {
        ensure!(
            wire.depth as usize == wire.moves.len(),
            "state depth {} disagrees with its {} recorded moves",
            wire.depth,
            wire.moves.len()
        );
        let state = Puzzle::from_tiles(wire.size, wire.tiles)?;
        Ok(state.with_history(&wire.moves))
    }
}

/// Master to worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MasterMessage {
    /// Stop the worker loop.
    Shutdown,
    /// Search the subtree under `state` with the given bound and reply.
    Search { bound: u32, state: WireState },
}

/// Worker to master, one per `Search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerReply {
    Solved { state: WireState },
    Bounded { f: u32, state: WireState },
}

impl From<&SearchOutcome> for WorkerReply {
    fn from(outcome: &SearchOutcome) -> Self {
        match outcome {
            SearchOutcome::Solved(state) => WorkerReply::Solved {
                state: state.into(),
            },
            SearchOutcome::Bounded { f, state } => WorkerReply::Bounded {
                f: *f,
                state: state.into(),
            },
        }
    }
}

impl TryFrom<WorkerReply> for SearchOutcome {
    type Error = anyhow::Error;

    fn try_from(reply: WorkerReply) -> Result<Self> {
        Ok(match reply {
            WorkerReply::Solved { state } => SearchOutcome::Solved(state.try_into()?),
            WorkerReply::Bounded { f, state } => SearchOutcome::Bounded {
                f,
                state: state.try_into()?,
            },
        })
    }
}

/// Writes `message` as one JSON line and flushes.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, message).context("failed to encode frame")?;
    writer.write_all(b"\n")?;
    writer.flush().context("failed to flush frame")?;
    Ok(())
}

/// Reads the next JSON line. `Ok(None)` means the peer closed the stream.
pub fn read_frame<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).context("failed to read frame")? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            break;
        }
    }
    let message = serde_json::from_str(line.trim_end())
        .with_context(|| format!("malformed frame: {}", line.trim_end()))?;
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn wire_state_keeps_the_move_history() {
        let root: Puzzle = "1 2 3\n4 0 6\n7 5 8".parse().unwrap();
        let state = root.replay(&[Move::Down, Move::Right]).unwrap();

        let wire = WireState::from(&state);
        assert_eq!(wire.depth, 2);
        assert_eq!(wire.moves, vec![Move::Down, Move::Right]);

        let decoded = Puzzle::try_from(wire).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.depth(), 2);
        assert_eq!(decoded.last_move(), Some(Move::Right));
        assert_eq!(root.replay(&decoded.moves()).unwrap(), decoded);
    }

    #[test]
    fn rejects_inconsistent_wire_states() {
        let mut wire = WireState::from(&Puzzle::new(3));
        wire.depth = 4;
        assert!(Puzzle::try_from(wire.clone()).is_err());

        wire.depth = 0;
        wire.tiles[0] = 9;
        assert!(Puzzle::try_from(wire).is_err());

        let huge = WireState {
            size: 1 << 32,
            tiles: Vec::new(),
            depth: 0,
            moves: Vec::new(),
        };
        assert!(Puzzle::try_from(huge).is_err());
    }

    #[test]
    fn frames_are_one_json_line_each() {
        let mut buffer = Vec::new();
        let search = MasterMessage::Search {
            bound: 7,
            state: WireState::from(&Puzzle::new(2)),
        };
        write_frame(&mut buffer, &search).unwrap();
        write_frame(&mut buffer, &MasterMessage::Shutdown).unwrap();

        let text = String::from_utf8(buffer.clone()).unwrap();
        assert_eq!(text.lines().count(), 2);

        let mut reader = Cursor::new(buffer);
        assert_eq!(read_frame::<_, MasterMessage>(&mut reader).unwrap(), Some(search));
        assert_eq!(
            read_frame::<_, MasterMessage>(&mut reader).unwrap(),
            Some(MasterMessage::Shutdown)
        );
        assert_eq!(read_frame::<_, MasterMessage>(&mut reader).unwrap(), None);
    }

    #[test]
    fn malformed_frames_are_errors() {
        let mut reader = Cursor::new(b"{\"Search\": 3}\n".to_vec());
        assert!(read_frame::<_, MasterMessage>(&mut reader).is_err());
    }
}
