//! A simple greedy player used by the headless CLI and the benches.

use crate::actions::in_transit;
use crate::session::{Phase, Session, SessionError};
use crate::DispatchSnapshot;
use dispatch_core::DemandId;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Outcome of an autopilot run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub turns_played: u32,
    pub ended: bool,
    pub snapshot: DispatchSnapshot,
}

/// Play up to `max_turns` turns: sail as far as the die allows, unload at
/// full throughput, and send yard stock to visible demands in deadline
/// order without over-committing.
pub fn autoplay(session: &mut Session, max_turns: u32) -> Result<RunSummary, SessionError> {
    let mut played = 0;
    while played < max_turns && session.phase() != Phase::Ended {
        if session.phase() == Phase::AwaitingStart {
            session.begin_turn()?;
        }
        if let Some(&cell) = session.reachable().iter().next_back() {
            session.move_to(cell)?;
        }
        if session.state().current_ship.is_some() {
            session.unload(u32::MAX)?;
        }

        let mut targets: Vec<(u32, DemandId, u32)> = session
            .state()
            .visible_demands
            .iter()
            .filter(|d| !d.is_fulfilled)
            .map(|d| {
                let open = d.remaining().saturating_sub(in_transit(session.state(), &d.id));
                (d.deadline, d.id.clone(), open)
            })
            .collect();
        targets.sort();
        for (_, id, open) in targets {
            let send = open.min(session.state().yard_stock);
            if send > 0 {
                session.dispatch(&id, send)?;
            }
        }

        session.end_turn()?;
        played += 1;
    }

    let snapshot = session.snapshot();
    info!(
        turns = played,
        ended = session.phase() == Phase::Ended,
        net = %snapshot.net,
        "autopilot finished"
    );
    Ok(RunSummary {
        turns_played: played,
        ended: session.phase() == Phase::Ended,
        snapshot,
    })
}
