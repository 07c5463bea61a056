//! Host-facing game session.
//!
//! A [`Session`] is the single owner of the [`TurnState`]. It enforces the
//! start → actions → end ordering the turn processor itself assumes, rolls
//! the movement die, and gates vessel moves through the reachability engine.

use crate::actions::{self, ActionError};
use crate::turn::{turn_end_in_place, turn_start_in_place, TurnEndReport, TurnStartReport};
use crate::DispatchSnapshot;
use dispatch_core::{CellId, DeliveryId, DemandId, PortId, Rules, TurnState};
use dispatch_graph::{reachable, CellGraph};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Where the session is within a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for `begin_turn`.
    AwaitingStart,
    /// Between `begin_turn` and `end_turn`; player actions allowed.
    Actions,
    /// The game has ended.
    Ended,
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("{action} is not allowed during {phase:?}")]
    WrongPhase { action: &'static str, phase: Phase },
    #[error("unknown cell {0}")]
    UnknownCell(CellId),
    #[error("{0} is not reachable this turn")]
    Unreachable(CellId),
    #[error("berth port {0} is not on the map")]
    UnknownBerth(PortId),
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Everything needed to resume a session besides reference data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionParts {
    pub state: TurnState,
    pub berth: PortId,
    pub position: CellId,
    pub seed: u64,
    pub phase: Phase,
    pub moves_left: u32,
}

/// Deterministic die roll for `turn`, in `1..=sides`.
pub fn roll_moves(seed: u64, turn: u32, sides: u32) -> u32 {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(u64::from(turn)));
    rng.gen_range(1..=sides.max(1))
}

pub struct Session {
    graph: Arc<CellGraph>,
    rules: Rules,
    parts: SessionParts,
}

impl Session {
    /// Start a new game with the vessel at `start` and unloading at `berth`.
    pub fn new(
        graph: Arc<CellGraph>,
        rules: Rules,
        state: TurnState,
        berth: PortId,
        start: CellId,
        seed: u64,
    ) -> Result<Self, SessionError> {
        Self::restore(
            graph,
            rules,
            SessionParts {
                state,
                berth,
                position: start,
                seed,
                phase: Phase::AwaitingStart,
                moves_left: 0,
            },
        )
    }

    /// Resume from saved parts, checking they fit the map.
    pub fn restore(
        graph: Arc<CellGraph>,
        rules: Rules,
        parts: SessionParts,
    ) -> Result<Self, SessionError> {
        if graph.port(&parts.berth).is_none() {
            return Err(SessionError::UnknownBerth(parts.berth));
        }
        if graph.cell(parts.position).is_none() {
            return Err(SessionError::UnknownCell(parts.position));
        }
        Ok(Self {
            graph,
            rules,
            parts,
        })
    }

    pub fn state(&self) -> &TurnState {
        &self.parts.state
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn graph(&self) -> &CellGraph {
        &self.graph
    }

    pub fn phase(&self) -> Phase {
        self.parts.phase
    }

    pub fn position(&self) -> CellId {
        self.parts.position
    }

    pub fn moves_left(&self) -> u32 {
        self.parts.moves_left
    }

    pub fn parts(&self) -> &SessionParts {
        &self.parts
    }

    pub fn into_parts(self) -> SessionParts {
        self.parts
    }

    fn expect_phase(&self, want: Phase, action: &'static str) -> Result<(), SessionError> {
        if self.parts.phase != want {
            return Err(SessionError::WrongPhase {
                action,
                phase: self.parts.phase,
            });
        }
        Ok(())
    }

    /// Run `turn_start` and roll this turn's movement budget.
    pub fn begin_turn(&mut self) -> Result<TurnStartReport, SessionError> {
        self.expect_phase(Phase::AwaitingStart, "begin_turn")?;
        let report = turn_start_in_place(&mut self.parts.state, &self.rules);
        self.parts.moves_left = roll_moves(self.parts.seed, report.turn, self.rules.dice_sides);
        self.parts.phase = Phase::Actions;
        debug!(turn = report.turn, moves = self.parts.moves_left, "turn opened");
        Ok(report)
    }

    /// Cells the vessel may move to with the remaining budget.
    pub fn reachable(&self) -> BTreeSet<CellId> {
        if self.parts.phase != Phase::Actions {
            return BTreeSet::new();
        }
        reachable(&self.graph, self.parts.position, self.parts.moves_left)
    }

    /// Move the vessel. A move spends the whole remaining budget.
    pub fn move_to(&mut self, cell: CellId) -> Result<(), SessionError> {
        self.expect_phase(Phase::Actions, "move_to")?;
        if self.graph.cell(cell).is_none() {
            return Err(SessionError::UnknownCell(cell));
        }
        if !self.reachable().contains(&cell) {
            return Err(SessionError::Unreachable(cell));
        }
        debug!(
            turn = self.parts.state.turn,
            from = %self.parts.position,
            to = %cell,
            "vessel moved"
        );
        self.parts.position = cell;
        self.parts.moves_left = 0;
        Ok(())
    }

    /// Unload at the berth, limited by the berth port's throughput.
    pub fn unload(&mut self, amount: u32) -> Result<u32, SessionError> {
        self.expect_phase(Phase::Actions, "unload")?;
        let throughput = self
            .graph
            .port(&self.parts.berth)
            .map(|p| p.throughput_per_turn)
            .ok_or_else(|| SessionError::UnknownBerth(self.parts.berth.clone()))?;
        Ok(actions::unload(&mut self.parts.state, amount, throughput)?)
    }

    /// Dispatch yard stock toward a visible demand at the rules' transit time
    /// and per-unit cost.
    pub fn dispatch(&mut self, demand: &DemandId, amount: u32) -> Result<DeliveryId, SessionError> {
        self.expect_phase(Phase::Actions, "dispatch")?;
        let cost = self.rules.delivery_cost_per_unit * Decimal::from(amount);
        Ok(actions::dispatch(
            &mut self.parts.state,
            demand,
            amount,
            self.rules.transit_turns,
            cost,
        )?)
    }

    /// Run `turn_end`. Returns the report; an ended game moves to [`Phase::Ended`].
    pub fn end_turn(&mut self) -> Result<TurnEndReport, SessionError> {
        self.expect_phase(Phase::Actions, "end_turn")?;
        let report = turn_end_in_place(&mut self.parts.state, &self.rules);
        self.parts.moves_left = 0;
        self.parts.phase = if report.game_ended {
            info!(turn = report.turn, "game ended");
            Phase::Ended
        } else {
            Phase::AwaitingStart
        };
        Ok(report)
    }

    /// Host view of the current state.
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot::capture(&self.parts.state, self.parts.phase, self.parts.moves_left)
    }
}
