use super::{MasterMessage, WorkerLink, WorkerReply};
use crate::puzzle::Puzzle;
use crate::search::bounded_search;
use anyhow::{Context, Result};
use tracing::{debug, info};

/// Serves `Search` requests until the master sends `Shutdown`.
pub fn run_worker<L: WorkerLink + ?Sized>(link: &mut L, threshold: u32) -> Result<()> {
    let mut served = 0u64;

    loop {
        match link.recv()? {
            MasterMessage::Shutdown => {
                info!(served, "worker shutting down");
                return Ok(());
            }
            MasterMessage::Search { bound, state } => {
                let state = Puzzle::try_from(state).context("master sent an invalid state")?;
                debug!(bound, depth = state.depth(), "searching assigned subtree");

                let outcome = bounded_search(&state, bound, threshold);
                link.send(WorkerReply::from(&outcome))?;
                served += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::protocol::{read_frame, write_frame, WireState};
    use crate::distributed::StdioWorkerLink;
    use crate::puzzle::Move;
    use std::io::Cursor;

    #[test]
    fn answers_each_search_and_stops_on_shutdown() {
        let root: Puzzle = "1 2 3\n4 0 6\n7 5 8".parse().unwrap();
        let child = root.try_move(Move::Down).unwrap();

        let mut input = Vec::new();
        write_frame(
            &mut input,
            &MasterMessage::Search {
                bound: 1,
                state: WireState::from(&child),
            },
        )
        .unwrap();
        write_frame(
            &mut input,
            &MasterMessage::Search {
                bound: 2,
                state: WireState::from(&child),
            },
        )
        .unwrap();
        write_frame(&mut input, &MasterMessage::Shutdown).unwrap();
        // Anything after the shutdown is never read.
        write_frame(&mut input, &MasterMessage::Shutdown).unwrap();

        let mut output = Vec::new();
        let mut link = StdioWorkerLink::new(Cursor::new(input), &mut output);
        run_worker(&mut link, 20).unwrap();

        let mut replies = Cursor::new(output);
        match read_frame::<_, WorkerReply>(&mut replies).unwrap() {
            Some(WorkerReply::Bounded { f, state }) => {
                assert_eq!(f, 2);
                assert_eq!(state.moves, vec![Move::Down]);
            }
            other => panic!("expected a bounded reply, got {other:?}"),
        }
        match read_frame::<_, WorkerReply>(&mut replies).unwrap() {
            Some(WorkerReply::Solved { state }) => {
                assert_eq!(state.moves, vec![Move::Down, Move::Right]);
                assert_eq!(state.tiles, Puzzle::new(3).tiles());
            }
            other => panic!("expected a solved reply, got {other:?}"),
        }
        assert_eq!(read_frame::<_, WorkerReply>(&mut replies).unwrap(), None);
    }

    #[test]
    fn closed_channel_is_an_error() {
        let mut output = Vec::new();
        let mut link = StdioWorkerLink::new(Cursor::new(Vec::new()), &mut output);
        assert!(run_worker(&mut link, 20).is_err());
    }
}
