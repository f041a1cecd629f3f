//! Mutable route set the construction and search phases work on.

use std::collections::BTreeSet;

use super::routing::{RouteEval, RoutingModel};

/// Per-vehicle stop sequences plus the optional stops currently left out.
///
/// Forced-excluded stops are never part of a plan: they are neither routed
/// nor counted in `unassigned`.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub routes: Vec<Vec<usize>>,
    pub evals: Vec<RouteEval>,
    pub unassigned: BTreeSet<usize>,
}

impl Plan {
    pub fn empty(model: &RoutingModel<'_>) -> Self {
        let unassigned = model
            .problem
            .stop_nodes()
            .filter(|&node| !model.is_forced_excluded(node))
            .collect();
        Self {
            routes: vec![Vec::new(); model.num_vehicles()],
            evals: vec![RouteEval::default(); model.num_vehicles()],
            unassigned,
        }
    }

    /// True objective: travel, soft-bound penalties and drop penalties.
    pub fn objective(&self, model: &RoutingModel<'_>) -> u64 {
        let routes: u64 = self
            .evals
            .iter()
            .enumerate()
            .map(|(vehicle, eval)| model.route_cost(vehicle, eval))
            .sum();
        let dropped: u64 = self.unassigned.iter().map(|&node| model.penalty(node)).sum();
        routes + dropped
    }

    pub fn total_travel(&self) -> u64 {
        self.evals.iter().map(|eval| eval.travel).sum()
    }

    /// Arcs driven by non-empty routes, start to end.
    pub fn arcs(&self, model: &RoutingModel<'_>) -> Vec<(usize, usize)> {
        let mut arcs = Vec::new();
        for (vehicle, route) in self.routes.iter().enumerate() {
            if route.is_empty() {
                continue;
            }
            let mut prev = model.problem.starts[vehicle];
            for &node in route {
                arcs.push((prev, node));
                prev = node;
            }
            arcs.push((prev, model.problem.ends[vehicle]));
        }
        arcs
    }

    /// Replace one vehicle's route with an already-evaluated sequence.
    pub fn set_route(&mut self, vehicle: usize, route: Vec<usize>, eval: RouteEval) {
        self.routes[vehicle] = route;
        self.evals[vehicle] = eval;
    }
}
