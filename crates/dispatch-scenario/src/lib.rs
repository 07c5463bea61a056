#![deny(warnings)]

//! YAML scenario files: reference data, rules, and the opening state.

use dispatch_core::{
    validate_rules, validate_state, CargoKind, Demand, Port, PortId, Route, RouteId, Rules,
    Ship, ShipId, TurnState, ValidationError,
};
use dispatch_graph::{CellGraph, GraphError};
use dispatch_runtime::{Session, SessionError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Scenario bundled with the crate.
pub const PILBARA: &str = include_str!("../scenarios/pilbara.yaml");

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid scenario file: {0}")]
    Yaml(String),
    #[error("invalid scenario: {0}")]
    Invalid(#[from] ValidationError),
    #[error("invalid map: {0}")]
    Graph(#[from] GraphError),
    #[error("berth {0} is not a port of this scenario")]
    UnknownBerth(PortId),
    #[error("ship {ship} carries {cargo:?}, which berth {berth} does not accept")]
    CargoRejected {
        ship: ShipId,
        cargo: CargoKind,
        berth: PortId,
    },
    #[error("start cell {index} of route {route} does not exist")]
    UnknownStart { route: RouteId, index: u32 },
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

impl From<std::io::Error> for ScenarioError {
    fn from(e: std::io::Error) -> Self {
        ScenarioError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for ScenarioError {
    fn from(e: serde_yaml::Error) -> Self {
        ScenarioError::Yaml(e.to_string())
    }
}

/// Where the player's vessel starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartCell {
    pub route: RouteId,
    pub index: u32,
}

/// A playable scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub seed: u64,
    /// Port whose berth the ship queue unloads at.
    pub berth: PortId,
    pub start: StartCell,
    #[serde(default)]
    pub rules: Rules,
    pub ports: Vec<Port>,
    pub routes: Vec<Route>,
    #[serde(default)]
    pub ships: Vec<Ship>,
    #[serde(default)]
    pub demands: Vec<Demand>,
}

impl Scenario {
    /// Parse and validate a scenario from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_yaml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Read, parse and validate a scenario file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path.as_ref())?;
        let scenario = Self::from_yaml(&text)?;
        info!(
            path = %path.as_ref().display(),
            name = %scenario.name,
            ships = scenario.ships.len(),
            demands = scenario.demands.len(),
            "scenario loaded"
        );
        Ok(scenario)
    }

    /// The bundled demo scenario.
    pub fn pilbara() -> Result<Self, ScenarioError> {
        Self::from_yaml(PILBARA)
    }

    /// Check rules, cross-references, the map, the berth and its cargo
    /// kinds, and the start cell.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        validate_rules(&self.rules)?;
        validate_state(&self.initial_state(), &self.rules)?;
        let graph = self.build_graph()?;
        if let Some(berth) = graph.port(&self.berth) {
            if let Some(ship) = self
                .ships
                .iter()
                .find(|s| !berth.accepts.contains(&s.cargo_kind))
            {
                return Err(ScenarioError::CargoRejected {
                    ship: ship.id.clone(),
                    cargo: ship.cargo_kind,
                    berth: berth.id.clone(),
                });
            }
        }
        self.start_cell(&graph)?;
        Ok(())
    }

    pub fn build_graph(&self) -> Result<CellGraph, ScenarioError> {
        let graph = CellGraph::build(&self.ports, &self.routes)?;
        if graph.port(&self.berth).is_none() {
            return Err(ScenarioError::UnknownBerth(self.berth.clone()));
        }
        Ok(graph)
    }

    pub fn start_cell(&self, graph: &CellGraph) -> Result<dispatch_core::CellId, ScenarioError> {
        graph
            .cell_at(&self.start.route, self.start.index)
            .ok_or_else(|| ScenarioError::UnknownStart {
                route: self.start.route.clone(),
                index: self.start.index,
            })
    }

    /// Every ship queued and every demand pending, at turn 0.
    pub fn initial_state(&self) -> TurnState {
        TurnState::new(self.ships.clone(), self.demands.clone())
    }

    /// Open a fresh session on this scenario.
    pub fn session(&self) -> Result<Session, ScenarioError> {
        let graph = Arc::new(self.build_graph()?);
        let start = self.start_cell(&graph)?;
        Ok(Session::new(
            graph,
            self.rules.clone(),
            self.initial_state(),
            self.berth.clone(),
            start,
            self.seed,
        )?)
    }
}
