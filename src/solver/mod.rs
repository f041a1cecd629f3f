//! Route optimizer: VRPTW with optional stops, solved heuristically.
//!
//! The model carries a time dimension (shift-pinned starts, per-stop windows,
//! shift-bounded ends), a capacity dimension (hard ceiling, soft floor), a
//! soft per-vehicle stop-count floor for fairness, per-stop allowed-vehicle
//! sets from skill and discipline compatibility, and a drop penalty per
//! optional stop. Search is an anytime loop: it stops at the time budget or
//! on cancellation and returns the best plan found.

mod construct;
mod plan;
mod routing;
mod search;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cancel::CancellationToken;
use crate::matrix::Matrix;
use crate::model::DropReason;
use crate::problem::Problem;

pub use routing::VisitTiming;

use plan::Plan;
use routing::RoutingModel;
use search::Budget;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Cost per stop a vehicle falls short of its fair share.
    pub fairness_penalty: u64,
    /// Fraction of an even split of stops each vehicle should reach.
    pub fairness_ratio: f64,
    /// Fraction of capacity a non-empty route should fill.
    pub capacity_floor_ratio: f64,
    /// Cost per capacity unit a non-empty route falls short of its floor.
    pub capacity_floor_penalty: u64,
    /// Scales the guided local search penalty weight.
    pub gls_lambda_factor: f64,
    /// Stop after this many search iterations even if time remains.
    pub max_iterations: Option<usize>,
    /// Upper bound on every time cumul, in minutes from midnight.
    pub horizon_minutes: u32,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            fairness_penalty: 100,
            fairness_ratio: 0.8,
            capacity_floor_ratio: 0.8,
            capacity_floor_penalty: 1,
            gls_lambda_factor: 0.1,
            max_iterations: None,
            horizon_minutes: 1410,
        }
    }
}

/// One vehicle's route in node indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRoute {
    pub vehicle: usize,
    /// Start node, visited stop nodes in order, end node.
    pub nodes: Vec<usize>,
    /// Timing of each visited stop, parallel to `nodes[1..nodes.len() - 1]`.
    pub timings: Vec<VisitTiming>,
    pub travel_minutes: u64,
}

impl RawRoute {
    /// Visited stop nodes without the start and end.
    pub fn stop_nodes(&self) -> &[usize] {
        match self.nodes.len() {
            0..=2 => &[],
            len => &self.nodes[1..len - 1],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    /// Travel, soft-bound penalties and drop penalties of the returned plan.
    pub objective: u64,
    pub travel_minutes: u64,
    pub iterations: usize,
    pub penalty_rounds: usize,
    pub elapsed: Duration,
}

/// Optimizer output before it is mapped back onto entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSolverOutput {
    /// One route per vehicle, in vehicle order.
    pub routes: Vec<RawRoute>,
    /// Stop nodes left off every route.
    pub dropped: Vec<(usize, DropReason)>,
    pub stats: SolveStats,
}

impl RawSolverOutput {
    /// Output of a run that serves nothing. Stops no vehicle could ever serve
    /// are still reported as skill mismatches.
    fn all_dropped(problem: &Problem) -> Self {
        let routes = (0..problem.num_vehicles())
            .map(|vehicle| RawRoute {
                vehicle,
                nodes: vec![problem.starts[vehicle], problem.ends[vehicle]],
                timings: Vec::new(),
                travel_minutes: 0,
            })
            .collect();
        let dropped = problem
            .stop_nodes()
            .map(|node| {
                let reason = if problem.compatible_vehicles(node).is_empty() {
                    DropReason::SkillMismatch
                } else {
                    DropReason::Infeasible
                };
                (node, reason)
            })
            .collect();
        Self {
            routes,
            dropped,
            stats: SolveStats::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteOptimizer {
    options: SolveOptions,
}

impl RouteOptimizer {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    /// Route `problem` over `matrix` within `time_budget`.
    ///
    /// Never fails: a problem with no feasible route yields every stop
    /// dropped. Cancellation ends the search early with the best plan so far.
    #[instrument(skip_all, fields(vehicles = problem.num_vehicles(), stops = problem.num_stops()))]
    pub fn solve(
        &self,
        problem: &Problem,
        matrix: &Matrix,
        time_budget: Duration,
        cancel: &CancellationToken,
    ) -> RawSolverOutput {
        let started = Instant::now();
        if matrix.size() != problem.num_nodes() {
            warn!(
                matrix = matrix.size(),
                nodes = problem.num_nodes(),
                "matrix does not match problem layout; nothing can be routed"
            );
            return RawSolverOutput::all_dropped(problem);
        }

        let model = RoutingModel::new(problem, matrix, &self.options);
        let budget = Budget::new(time_budget, cancel, self.options.max_iterations);

        let initial = construct::construct(&model, &budget);
        let (best, search) =
            search::improve(&model, initial, &budget, self.options.gls_lambda_factor);

        let stats = SolveStats {
            objective: best.objective(&model),
            travel_minutes: best.total_travel(),
            iterations: search.iterations,
            penalty_rounds: search.penalty_rounds,
            elapsed: started.elapsed(),
        };
        let output = extract(&model, &best, stats);

        info!(
            objective = stats.objective,
            travel_minutes = stats.travel_minutes,
            dropped = output.dropped.len(),
            iterations = stats.iterations,
            cancelled = cancel.is_cancelled(),
            "route optimization finished"
        );
        output
    }
}

/// Walk each route from start to end; every stop not visited is a drop.
fn extract(model: &RoutingModel<'_>, plan: &Plan, stats: SolveStats) -> RawSolverOutput {
    let problem = model.problem;
    let routes: Vec<RawRoute> = plan
        .routes
        .iter()
        .enumerate()
        .map(|(vehicle, stops)| {
            let mut nodes = Vec::with_capacity(stops.len() + 2);
            nodes.push(problem.starts[vehicle]);
            nodes.extend_from_slice(stops);
            nodes.push(problem.ends[vehicle]);
            RawRoute {
                vehicle,
                nodes,
                timings: model.schedule(vehicle, stops),
                travel_minutes: plan.evals[vehicle].travel,
            }
        })
        .collect();

    let visited: HashSet<usize> = plan.routes.iter().flatten().copied().collect();
    let dropped = problem
        .stop_nodes()
        .filter(|node| !visited.contains(node))
        .map(|node| {
            let reason = if model.is_forced_excluded(node) {
                DropReason::SkillMismatch
            } else {
                DropReason::Infeasible
            };
            (node, reason)
        })
        .collect();

    RawSolverOutput {
        routes,
        dropped,
        stats,
    }
}
