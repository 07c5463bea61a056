//! Screen placement of route cells. Rendering only; game logic never
//! looks at positions.

use crate::CellGraph;
use dispatch_core::{CellId, RouteId, Waypoint};
use serde::{Deserialize, Serialize};

/// A cell's position on the map.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub cell: CellId,
    pub x: f32,
    pub y: f32,
}

/// Place the cells of `route` evenly by arc length along its waypoints.
/// Returns an empty list for an unknown route or one without waypoints.
pub fn layout(graph: &CellGraph, route: &RouteId) -> Vec<Point> {
    let Some(r) = graph.route(route) else {
        return Vec::new();
    };
    let cells = graph.route_cells(route);
    let Some(first) = r.waypoints.first() else {
        return Vec::new();
    };

    let mut cumulative = Vec::with_capacity(r.waypoints.len());
    let mut total = 0.0f32;
    cumulative.push(0.0);
    for pair in r.waypoints.windows(2) {
        total += segment_len(&pair[0], &pair[1]);
        cumulative.push(total);
    }

    cells
        .iter()
        .map(|c| {
            if total <= f32::EPSILON {
                return Point {
                    cell: c.id,
                    x: first.x,
                    y: first.y,
                };
            }
            let target = total * c.index as f32 / r.distance as f32;
            let seg = cumulative
                .windows(2)
                .position(|w| target <= w[1])
                .unwrap_or(cumulative.len().saturating_sub(2));
            let (a, b) = (&r.waypoints[seg], &r.waypoints[seg + 1]);
            let len = cumulative[seg + 1] - cumulative[seg];
            let t = if len <= f32::EPSILON {
                0.0
            } else {
                ((target - cumulative[seg]) / len).clamp(0.0, 1.0)
            };
            Point {
                cell: c.id,
                x: a.x + (b.x - a.x) * t,
                y: a.y + (b.y - a.y) * t,
            }
        })
        .collect()
}

fn segment_len(a: &Waypoint, b: &Waypoint) -> f32 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}
