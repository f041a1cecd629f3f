//! Solver output expressed in entity identities.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{DropReason, StopId, VehicleId};
use crate::problem::{NodeKind, Problem};
use crate::solver::RawSolverOutput;

/// Ordered stops served by one vehicle, excluding its start and end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRoute {
    pub vehicle_id: VehicleId,
    pub stops: Vec<StopId>,
    pub travel_minutes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedStop {
    pub stop_id: StopId,
    pub reason: DropReason,
}

/// Every stop is either on exactly one route or in exactly one drop entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub routes: Vec<VehicleRoute>,
    pub dropped: Vec<DroppedStop>,
}

impl Solution {
    /// Map node indices back to vehicle and stop ids.
    pub fn from_raw(problem: &Problem, raw: &RawSolverOutput) -> Self {
        let routes = raw
            .routes
            .iter()
            .filter_map(|route| {
                let Some(vehicle_id) = problem.vehicle_id(route.vehicle) else {
                    warn!(vehicle = route.vehicle, "route names no known vehicle; skipped");
                    return None;
                };
                Some(VehicleRoute {
                    vehicle_id,
                    stops: route
                        .stop_nodes()
                        .iter()
                        .filter_map(|&node| stop_id_at(problem, node))
                        .collect(),
                    travel_minutes: route.travel_minutes,
                })
            })
            .collect();

        let dropped = raw
            .dropped
            .iter()
            .filter_map(|&(node, reason)| {
                stop_id_at(problem, node).map(|stop_id| DroppedStop { stop_id, reason })
            })
            .collect();

        Self { routes, dropped }
    }

    pub fn route_for(&self, vehicle_id: VehicleId) -> Option<&VehicleRoute> {
        self.routes.iter().find(|route| route.vehicle_id == vehicle_id)
    }

    /// Vehicle serving `stop_id` and its 0-based position on that route.
    pub fn assignment_of(&self, stop_id: StopId) -> Option<(VehicleId, usize)> {
        self.routes.iter().find_map(|route| {
            route
                .stops
                .iter()
                .position(|&id| id == stop_id)
                .map(|order| (route.vehicle_id, order))
        })
    }

    pub fn drop_reason(&self, stop_id: StopId) -> Option<DropReason> {
        self.dropped
            .iter()
            .find(|dropped| dropped.stop_id == stop_id)
            .map(|dropped| dropped.reason)
    }

    pub fn served_count(&self) -> usize {
        self.routes.iter().map(|route| route.stops.len()).sum()
    }

    /// The run completed but nothing could be served.
    pub fn is_all_dropped(&self) -> bool {
        self.served_count() == 0
    }
}

/// Node index minus the number of start nodes gives the stop's input index.
fn stop_id_at(problem: &Problem, node: usize) -> Option<StopId> {
    match problem.kind(node) {
        NodeKind::Stop(index) => problem.stop_id(index),
        NodeKind::Start(_) | NodeKind::End(_) => None,
    }
}
