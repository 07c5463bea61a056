#![deny(warnings)]

//! Core domain models and invariants for the bulk dispatch simulation.
//!
//! This crate defines the serializable reference data (ports, routes, cells),
//! the mutable turn state threaded through the turn processor, the tunable
//! [`Rules`], and validation helpers that guard basic invariants.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

mod rules;
mod state;

pub use rules::{DemurrageTariff, Rules};
pub use state::{
    AppearCondition, CompletedDemand, Delivery, Demand, Ship, Totals, TurnState,
};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Port identifier, e.g. "newcastle".
    PortId
);
string_id!(
    /// Route identifier, e.g. "newcastle-rotterdam".
    RouteId
);
string_id!(
    /// Ship identifier, e.g. "MV Cape Orchid".
    ShipId
);
string_id!(
    /// Demand (order) identifier.
    DemandId
);

/// Identifier of a cell on the movement graph. Assigned by the graph builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub u32);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Identifier of a delivery, allocated sequentially by the turn state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(pub u32);

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery#{}", self.0)
    }
}

/// Kinds of dry bulk cargo handled by the berth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CargoKind {
    Coal,
    IronOre,
    Grain,
    Bauxite,
    Cement,
}

/// A port with its handling characteristics. Immutable reference data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    /// Cargo units the berth can unload per turn.
    pub throughput_per_turn: u32,
    /// Cargo kinds the port handles.
    #[serde(default)]
    pub accepts: Vec<CargoKind>,
}

/// A rendering-only point along a route.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f32,
    pub y: f32,
}

/// A sea route between two ports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub from: PortId,
    pub to: PortId,
    /// Route length in movement steps (> 0).
    pub distance: u32,
    /// Ordered points used only for drawing the route.
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

/// Whether a cell is open water or a port hub.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellKind {
    Normal,
    Port { port: PortId },
}

/// An atomic position on the movement graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub route: RouteId,
    /// Position along the route, `0..=distance`.
    pub index: u32,
    pub kind: CellKind,
}

impl Cell {
    /// The port this cell anchors, if it is a port-cell.
    pub fn port(&self) -> Option<&PortId> {
        match &self.kind {
            CellKind::Port { port } => Some(port),
            CellKind::Normal => None,
        }
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("port {0} must have a positive throughput")]
    ZeroThroughput(PortId),
    #[error("route {0} must have a positive distance")]
    ZeroDistance(RouteId),
    #[error("route {0} connects a port to itself")]
    SelfLoop(RouteId),
    #[error("demand {0} must request a positive amount")]
    EmptyDemand(DemandId),
    #[error("demand {id} has fulfilled {fulfilled} of {amount}")]
    Overfulfilled {
        id: DemandId,
        fulfilled: u32,
        amount: u32,
    },
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    #[error("fraction must be within [0,1]")]
    InvalidFraction,
    #[error("rules field {0} must be positive")]
    NonPositiveRule(&'static str),
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    #[error("unknown ship referenced: {0}")]
    UnknownShip(ShipId),
    #[error("unknown demand referenced: {0}")]
    UnknownDemand(DemandId),
    #[error("{visible} visible demands exceed capacity {cap}")]
    VisibleOverflow { visible: usize, cap: usize },
    #[error("ship {0} is both berthed and queued")]
    ShipInTwoPlaces(ShipId),
}

/// Validate a port.
pub fn validate_port(p: &Port) -> Result<(), ValidationError> {
    if p.throughput_per_turn == 0 {
        return Err(ValidationError::ZeroThroughput(p.id.clone()));
    }
    Ok(())
}

/// Validate a route in isolation. Endpoint resolution is the graph builder's job.
pub fn validate_route(r: &Route) -> Result<(), ValidationError> {
    if r.distance == 0 {
        return Err(ValidationError::ZeroDistance(r.id.clone()));
    }
    if r.from == r.to {
        return Err(ValidationError::SelfLoop(r.id.clone()));
    }
    Ok(())
}

/// Validate a demand's amounts and reward.
pub fn validate_demand(d: &Demand) -> Result<(), ValidationError> {
    if d.amount == 0 {
        return Err(ValidationError::EmptyDemand(d.id.clone()));
    }
    if d.fulfilled > d.amount {
        return Err(ValidationError::Overfulfilled {
            id: d.id.clone(),
            fulfilled: d.fulfilled,
            amount: d.amount,
        });
    }
    if d.reward < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}

/// Validate tunable rules.
pub fn validate_rules(r: &Rules) -> Result<(), ValidationError> {
    if r.visible_demand_cap == 0 {
        return Err(ValidationError::NonPositiveRule("visible_demand_cap"));
    }
    if r.dice_sides == 0 {
        return Err(ValidationError::NonPositiveRule("dice_sides"));
    }
    if r.transit_turns == 0 {
        return Err(ValidationError::NonPositiveRule("transit_turns"));
    }
    if r.early_bonus_frac < Decimal::ZERO || r.early_bonus_frac > Decimal::ONE {
        return Err(ValidationError::InvalidFraction);
    }
    if r.late_penalty_per_turn < Decimal::ZERO
        || r.delivery_cost_per_unit < Decimal::ZERO
        || r.demurrage.early_fee < Decimal::ZERO
        || r.demurrage.late_fee < Decimal::ZERO
    {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}

/// Validate a turn state, including cross-references between ships,
/// demands, and deliveries. Used when restoring saved progress and by the
/// turn processor's debug assertions.
pub fn validate_state(state: &TurnState, rules: &Rules) -> Result<(), ValidationError> {
    let mut ships: BTreeSet<&ShipId> = BTreeSet::new();
    for s in state.all_ships() {
        if !ships.insert(&s.id) {
            return Err(ValidationError::DuplicateId(s.id.0.clone()));
        }
    }
    if let Some(cur) = &state.current_ship {
        if state.pending_ships.iter().any(|s| s.id == cur.id) {
            return Err(ValidationError::ShipInTwoPlaces(cur.id.clone()));
        }
    }

    let mut demands: BTreeSet<&DemandId> = BTreeSet::new();
    for d in state.visible_demands.iter().chain(&state.pending_demands) {
        validate_demand(d)?;
        if !demands.insert(&d.id) {
            return Err(ValidationError::DuplicateId(d.id.0.clone()));
        }
        if let AppearCondition::ShipArrival { ship } = &d.condition {
            if !ships.contains(ship) {
                return Err(ValidationError::UnknownShip(ship.clone()));
            }
        }
    }
    for c in &state.completed_demands {
        if !demands.insert(&c.demand.id) {
            return Err(ValidationError::DuplicateId(c.demand.id.0.clone()));
        }
    }
    if state.visible_demands.len() > rules.visible_demand_cap {
        return Err(ValidationError::VisibleOverflow {
            visible: state.visible_demands.len(),
            cap: rules.visible_demand_cap,
        });
    }

    let mut deliveries: BTreeSet<DeliveryId> = BTreeSet::new();
    for d in state
        .active_deliveries
        .iter()
        .chain(&state.completed_deliveries)
    {
        if !deliveries.insert(d.id) {
            return Err(ValidationError::DuplicateId(d.id.to_string()));
        }
        if !demands.contains(&d.demand) {
            return Err(ValidationError::UnknownDemand(d.demand.clone()));
        }
    }
    if !state.totals.is_non_negative() {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}
