#![deny(warnings)]

//! Turn runtime for the dispatch simulation.
//!
//! [`turn`] holds the two reducers the host calls every turn, [`actions`]
//! the player mutations allowed between them, and [`Session`] ties both to
//! the movement graph with phase checking and seeded dice.

use dispatch_core::{DemandId, ShipId, Totals, TurnState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod actions;
pub mod autopilot;
pub mod session;
pub mod turn;

pub use actions::ActionError;
pub use autopilot::{autoplay, RunSummary};
pub use session::{roll_moves, Phase, Session, SessionError, SessionParts};
pub use turn::{
    turn_end, turn_end_in_place, turn_start, turn_start_in_place, TurnEndReport, TurnStartReport,
};

/// Board entry shown to the player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DemandView {
    pub id: DemandId,
    pub amount: u32,
    pub fulfilled: u32,
    pub in_transit: u32,
    pub deadline: u32,
    pub reward: Decimal,
}

/// KPI snapshot consumed by frontends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    pub turn: u32,
    pub phase: Phase,
    pub moves_left: u32,
    pub berth_ship: Option<ShipId>,
    pub cargo_aboard: u32,
    pub ships_waiting: usize,
    pub ships_done: usize,
    pub visible_demands: Vec<DemandView>,
    pub pending_demands: usize,
    pub completed_demands: usize,
    pub deliveries_in_transit: usize,
    pub yard_stock: u32,
    pub totals: Totals,
    pub net: Decimal,
}

impl DispatchSnapshot {
    pub fn capture(state: &TurnState, phase: Phase, moves_left: u32) -> Self {
        Self {
            turn: state.turn,
            phase,
            moves_left,
            berth_ship: state.current_ship.as_ref().map(|s| s.id.clone()),
            cargo_aboard: state
                .current_ship
                .as_ref()
                .map(|s| s.remaining_cargo)
                .unwrap_or(0),
            ships_waiting: state.pending_ships.len(),
            ships_done: state.completed_ships.len(),
            visible_demands: state
                .visible_demands
                .iter()
                .map(|d| DemandView {
                    id: d.id.clone(),
                    amount: d.amount,
                    fulfilled: d.fulfilled,
                    in_transit: actions::in_transit(state, &d.id),
                    deadline: d.deadline,
                    reward: d.reward,
                })
                .collect(),
            pending_demands: state.pending_demands.len(),
            completed_demands: state.completed_demands.len(),
            deliveries_in_transit: state.active_deliveries.len(),
            yard_stock: state.yard_stock,
            totals: state.totals.clone(),
            net: state.totals.net(),
        }
    }
}
