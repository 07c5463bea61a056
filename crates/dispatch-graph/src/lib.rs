#![deny(warnings)]

//! Movement graph for the dispatch map.
//!
//! [`CellGraph::build`] expands port and route reference tables into an
//! immutable cell table: every route of length `d` becomes `d + 1` cells,
//! with a port-cell at each end. A port anchoring several routes owns one
//! port-cell per route; those cells are linked as a hub for transfers.
//! [`reachable`] answers which cells a vessel can reach with a movement
//! budget.

use dispatch_core::{
    validate_port, validate_route, Cell, CellId, CellKind, Port, PortId, Route, RouteId,
    ValidationError,
};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

mod layout;
mod reach;

pub use layout::{layout, Point};
pub use reach::reachable;

/// Errors raised while building the graph from reference data.
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("duplicate port id: {0}")]
    DuplicatePort(PortId),
    #[error("duplicate route id: {0}")]
    DuplicateRoute(RouteId),
    #[error("route {route} references unknown port {port}")]
    UnknownPort { route: RouteId, port: PortId },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Clone, Debug)]
struct RouteSpan {
    first: CellId,
    distance: u32,
}

/// Immutable cell table with route and hub indexes.
#[derive(Clone, Debug)]
pub struct CellGraph {
    cells: Vec<Cell>,
    ports: BTreeMap<PortId, Port>,
    routes: BTreeMap<RouteId, Route>,
    spans: BTreeMap<RouteId, RouteSpan>,
    /// Port-cells of each port, ordered by route id.
    hubs: BTreeMap<PortId, Vec<CellId>>,
}

impl CellGraph {
    /// Build the cell table. Cell ids are assigned in route table order.
    pub fn build(ports: &[Port], routes: &[Route]) -> Result<Self, GraphError> {
        let mut port_map = BTreeMap::new();
        for p in ports {
            validate_port(p)?;
            if port_map.insert(p.id.clone(), p.clone()).is_some() {
                return Err(GraphError::DuplicatePort(p.id.clone()));
            }
        }

        let mut cells = Vec::new();
        let mut route_map = BTreeMap::new();
        let mut spans = BTreeMap::new();
        let mut hubs: BTreeMap<PortId, Vec<CellId>> = BTreeMap::new();
        for r in routes {
            validate_route(r)?;
            for end in [&r.from, &r.to] {
                if !port_map.contains_key(end) {
                    return Err(GraphError::UnknownPort {
                        route: r.id.clone(),
                        port: end.clone(),
                    });
                }
            }
            if route_map.insert(r.id.clone(), r.clone()).is_some() {
                return Err(GraphError::DuplicateRoute(r.id.clone()));
            }

            let first = CellId(cells.len() as u32);
            for index in 0..=r.distance {
                let kind = if index == 0 {
                    CellKind::Port { port: r.from.clone() }
                } else if index == r.distance {
                    CellKind::Port { port: r.to.clone() }
                } else {
                    CellKind::Normal
                };
                let id = CellId(cells.len() as u32);
                if let CellKind::Port { port } = &kind {
                    hubs.entry(port.clone()).or_default().push(id);
                }
                cells.push(Cell {
                    id,
                    route: r.id.clone(),
                    index,
                    kind,
                });
            }
            spans.insert(
                r.id.clone(),
                RouteSpan {
                    first,
                    distance: r.distance,
                },
            );
        }

        for hub in hubs.values_mut() {
            hub.sort_by(|a, b| {
                let ra = &cells[a.0 as usize].route;
                let rb = &cells[b.0 as usize].route;
                ra.cmp(rb).then(a.cmp(b))
            });
        }

        debug!(
            ports = port_map.len(),
            routes = route_map.len(),
            cells = cells.len(),
            "built cell graph"
        );
        Ok(Self {
            cells,
            ports: port_map,
            routes: route_map,
            spans,
            hubs,
        })
    }

    /// All cells in id order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.0 as usize)
    }

    pub fn port(&self, id: &PortId) -> Option<&Port> {
        self.ports.get(id)
    }

    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    /// The cell at `index` along `route`, if both exist.
    pub fn cell_at(&self, route: &RouteId, index: u32) -> Option<CellId> {
        let span = self.spans.get(route)?;
        (index <= span.distance).then(|| CellId(span.first.0 + index))
    }

    /// Cells of a route ordered by index.
    pub fn route_cells(&self, route: &RouteId) -> &[Cell] {
        match self.spans.get(route) {
            Some(span) => {
                let start = span.first.0 as usize;
                &self.cells[start..=start + span.distance as usize]
            }
            None => &[],
        }
    }

    /// Every port-cell standing for `port`, one per incident route.
    pub fn port_cells(&self, port: &PortId) -> &[CellId] {
        self.hubs.get(port).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Cells reachable from `from` at a cost of one movement unit: the
    /// neighbours on the same route (lower index first), then the first
    /// cell of every other route leaving the same port, by route id.
    pub fn moves_from(&self, from: &Cell) -> Vec<CellId> {
        let mut out = Vec::with_capacity(2);
        if from.index > 0 {
            out.extend(self.cell_at(&from.route, from.index - 1));
        }
        out.extend(self.cell_at(&from.route, from.index + 1));
        if let CellKind::Port { port } = &from.kind {
            for &hub_id in self.port_cells(port) {
                let Some(hub) = self.cell(hub_id) else {
                    continue;
                };
                if hub.route == from.route {
                    continue;
                }
                let next = if hub.index == 0 {
                    hub.index + 1
                } else {
                    hub.index - 1
                };
                out.extend(self.cell_at(&hub.route, next));
            }
        }
        out
    }
}
