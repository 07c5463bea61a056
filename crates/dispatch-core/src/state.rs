//! Mutable simulation state: the berth queue, demand board, deliveries,
//! and running financial totals.

use crate::{CargoKind, DeliveryId, DemandId, ShipId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A bulk carrier waiting for or occupying the berth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub id: ShipId,
    pub cargo_kind: CargoKind,
    /// Turns spent at the berth so far. Reset to zero on promotion.
    #[serde(default)]
    pub berthing_turn: u32,
    /// Cargo still aboard.
    pub remaining_cargo: u32,
    /// Grace period in turns before demurrage accrues.
    pub free_time: u32,
}

impl Ship {
    pub fn new(id: ShipId, cargo_kind: CargoKind, cargo: u32, free_time: u32) -> Self {
        Self {
            id,
            cargo_kind,
            berthing_turn: 0,
            remaining_cargo: cargo,
            free_time,
        }
    }
}

/// When a pending demand may be revealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppearCondition {
    /// Visible from the first turn.
    Start,
    /// Visible once the turn counter reaches `turn`.
    FromTurn { turn: u32 },
    /// Visible once `ship` has reached the berth.
    ShipArrival { ship: ShipId },
}

/// An order for delivered cargo.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub id: DemandId,
    /// Requested cargo units.
    pub amount: u32,
    #[serde(default)]
    pub fulfilled: u32,
    #[serde(default)]
    pub is_fulfilled: bool,
    /// Turn by which the demand should be completed.
    pub deadline: u32,
    pub reward: Decimal,
    pub condition: AppearCondition,
}

impl Demand {
    pub fn new(
        id: DemandId,
        amount: u32,
        deadline: u32,
        reward: Decimal,
        condition: AppearCondition,
    ) -> Self {
        Self {
            id,
            amount,
            fulfilled: 0,
            is_fulfilled: false,
            deadline,
            reward,
            condition,
        }
    }

    /// Cargo still needed to fulfil this demand.
    pub fn remaining(&self) -> u32 {
        self.amount.saturating_sub(self.fulfilled)
    }

    /// Apply incoming cargo, clamped to the remaining need. Returns the
    /// amount actually credited.
    pub fn apply(&mut self, incoming: u32) -> u32 {
        let credited = incoming.min(self.remaining());
        self.fulfilled = (self.fulfilled + credited).min(self.amount);
        if self.fulfilled >= self.amount {
            self.is_fulfilled = true;
        }
        credited
    }
}

/// Cargo in transit toward a demand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub demand: DemandId,
    pub amount: u32,
    pub remaining_turns: u32,
}

/// Ledger entry for a demand that was fulfilled and scored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedDemand {
    pub demand: Demand,
    pub completed_at: u32,
    pub early_bonus: Decimal,
    pub penalty: Decimal,
}

/// Running financial totals. Each field only ever grows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub demurrage: Decimal,
    pub delivery_cost: Decimal,
    pub reward: Decimal,
    pub bonus: Decimal,
    pub penalty: Decimal,
}

impl Totals {
    /// Income minus charges.
    pub fn net(&self) -> Decimal {
        self.reward + self.bonus - self.penalty - self.demurrage - self.delivery_cost
    }

    pub fn is_non_negative(&self) -> bool {
        [
            self.demurrage,
            self.delivery_cost,
            self.reward,
            self.bonus,
            self.penalty,
        ]
        .iter()
        .all(|v| *v >= Decimal::ZERO)
    }

    /// True when no field of `self` is below the same field of `earlier`.
    pub fn dominates(&self, earlier: &Totals) -> bool {
        self.demurrage >= earlier.demurrage
            && self.delivery_cost >= earlier.delivery_cost
            && self.reward >= earlier.reward
            && self.bonus >= earlier.bonus
            && self.penalty >= earlier.penalty
    }
}

/// Aggregate root threaded through `turn_start` / `turn_end`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    /// Current turn; 0 until the first turn starts.
    pub turn: u32,
    pub current_ship: Option<Ship>,
    pub pending_ships: VecDeque<Ship>,
    pub completed_ships: Vec<Ship>,
    /// Ship promoted to the berth during the current turn.
    pub arrived_this_turn: Option<ShipId>,
    pub visible_demands: Vec<Demand>,
    pub pending_demands: Vec<Demand>,
    pub completed_demands: Vec<CompletedDemand>,
    pub active_deliveries: Vec<Delivery>,
    pub completed_deliveries: Vec<Delivery>,
    pub totals: Totals,
    /// Cargo unloaded at the berth during the current turn.
    pub unloading_used: u32,
    /// Cargo unloaded and not yet dispatched.
    pub yard_stock: u32,
    pub next_delivery_id: u32,
}

impl TurnState {
    /// Fresh state with every ship queued and every demand pending.
    pub fn new(ships: Vec<Ship>, demands: Vec<Demand>) -> Self {
        Self {
            pending_ships: ships.into(),
            pending_demands: demands,
            ..Self::default()
        }
    }

    /// Every ship regardless of queue position.
    pub fn all_ships(&self) -> impl Iterator<Item = &Ship> {
        self.current_ship
            .iter()
            .chain(self.pending_ships.iter())
            .chain(self.completed_ships.iter())
    }

    /// Visible demand by id.
    pub fn visible_demand(&self, id: &DemandId) -> Option<&Demand> {
        self.visible_demands.iter().find(|d| &d.id == id)
    }

    /// Whether a ship has reached the berth this turn, is berthed, or has left.
    pub fn ship_has_arrived(&self, id: &ShipId) -> bool {
        self.arrived_this_turn.as_ref() == Some(id)
            || self.current_ship.as_ref().map(|s| &s.id) == Some(id)
            || self.completed_ships.iter().any(|s| &s.id == id)
    }

    /// Nothing left to berth, reveal, fulfil, or deliver.
    pub fn is_finished(&self) -> bool {
        self.current_ship.is_none()
            && self.pending_ships.is_empty()
            && self.pending_demands.is_empty()
            && self.visible_demands.is_empty()
            && self.active_deliveries.is_empty()
    }

    /// Allocate the next delivery id.
    pub fn allocate_delivery_id(&mut self) -> DeliveryId {
        let id = DeliveryId(self.next_delivery_id);
        self.next_delivery_id += 1;
        id
    }
}
