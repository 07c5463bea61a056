use crate::CellGraph;
use dispatch_core::{Cell, CellId};
use std::collections::BTreeSet;

/// Cells reachable from `start` within `budget` movement units.
///
/// Exploration is depth-first in [`CellGraph::moves_from`] order and a cell
/// is expanded only the first time it is discovered, so the depth at which a
/// cell is first found fixes how far past it the search continues. This can
/// miss cells that a shortest-path search would reach within the budget.
///
/// The start cell is never part of the result. A zero budget or an unknown
/// start cell yields an empty set.
pub fn reachable(graph: &CellGraph, start: CellId, budget: u32) -> BTreeSet<CellId> {
    let mut visited = BTreeSet::new();
    if budget == 0 {
        return visited;
    }
    let Some(origin) = graph.cell(start) else {
        return visited;
    };
    visited.insert(start);
    explore(graph, origin, budget, &mut visited);
    visited.remove(&start);
    visited
}

/// Depth-first expansion with an explicit stack. Each frame holds the moves
/// of one cell still to try and the budget left after stepping onto it, so
/// discovery order matches a recursive walk without its stack depth.
fn explore(graph: &CellGraph, from: &Cell, budget: u32, visited: &mut BTreeSet<CellId>) {
    let mut stack = vec![(graph.moves_from(from).into_iter(), budget)];
    while let Some((moves, left)) = stack.last_mut() {
        let left = *left;
        let Some(next) = moves.next() else {
            stack.pop();
            continue;
        };
        if !visited.insert(next) || left <= 1 {
            continue;
        }
        if let Some(cell) = graph.cell(next) {
            stack.push((graph.moves_from(cell).into_iter(), left - 1));
        }
    }
}
