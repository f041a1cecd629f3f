//! Routing model: dimensions, compatibility and route evaluation.

use crate::matrix::Matrix;
use crate::problem::Problem;

use super::SolveOptions;

/// Totals of a feasible route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RouteEval {
    pub travel: u64,
    pub load: u32,
    pub count: u32,
}

/// Service timing for one stop of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitTiming {
    pub node: usize,
    /// Earliest feasible service start (minutes from midnight).
    pub earliest: u32,
    /// Latest service start that keeps the remainder of the route feasible.
    pub latest: u32,
    /// Drive time accumulated from the route start up to this stop.
    pub drive_minutes: u64,
}

/// Compiled dimensions and constraints over a [`Problem`] and its matrix.
pub(crate) struct RoutingModel<'a> {
    pub problem: &'a Problem,
    pub matrix: &'a Matrix,
    options: &'a SolveOptions,
    /// `allowed[vehicle][node]`.
    allowed: Vec<Vec<bool>>,
    /// Stops no vehicle may serve.
    forced_excluded: Vec<bool>,
    capacity_floors: Vec<u32>,
    count_floor: u32,
}

impl<'a> RoutingModel<'a> {
    pub fn new(problem: &'a Problem, matrix: &'a Matrix, options: &'a SolveOptions) -> Self {
        let nodes = problem.num_nodes();
        let mut allowed = vec![vec![false; nodes]; problem.num_vehicles()];
        let mut forced_excluded = vec![false; nodes];

        for node in problem.stop_nodes() {
            let compatible = problem.compatible_vehicles(node);
            if compatible.is_empty() {
                forced_excluded[node] = true;
            }
            for vehicle in compatible {
                allowed[vehicle][node] = true;
            }
        }

        let capacity_floors = problem
            .capacities
            .iter()
            .map(|&capacity| ratio_floor(capacity, options.capacity_floor_ratio))
            .collect();

        let even_split = problem.num_stops() as f64 / problem.num_vehicles().max(1) as f64;
        let count_floor = (options.fairness_ratio * even_split).floor().max(0.0) as u32;

        Self {
            problem,
            matrix,
            options,
            allowed,
            forced_excluded,
            capacity_floors,
            count_floor,
        }
    }

    pub fn num_vehicles(&self) -> usize {
        self.problem.num_vehicles()
    }

    pub fn is_allowed(&self, vehicle: usize, node: usize) -> bool {
        self.allowed[vehicle][node]
    }

    pub fn is_forced_excluded(&self, node: usize) -> bool {
        self.forced_excluded[node]
    }

    pub fn penalty(&self, node: usize) -> u64 {
        self.problem.penalties[node]
    }

    /// Load below which a non-empty route pays the capacity floor penalty.
    pub fn capacity_floor(&self, vehicle: usize) -> u32 {
        self.capacity_floors[vehicle]
    }

    /// Stops every route should carry before the fairness penalty stops.
    pub fn count_floor(&self) -> u32 {
        self.count_floor
    }

    pub fn arc(&self, from: usize, to: usize) -> Option<u32> {
        let minutes = self.matrix.get(from, to);
        (minutes != Matrix::UNREACHABLE).then_some(minutes)
    }

    /// Check the time and capacity dimensions for `stops` driven by `vehicle`.
    ///
    /// The start cumul is pinned to the shift start, each stop's cumul lies in
    /// its window (waiting allowed), the end cumul lies within the shift and
    /// every cumul stays under the horizon. Empty routes cost nothing.
    pub fn evaluate(&self, vehicle: usize, stops: &[usize]) -> Option<RouteEval> {
        if stops.is_empty() {
            return Some(RouteEval::default());
        }
        let problem = self.problem;
        let start = problem.starts[vehicle];
        let end = problem.ends[vehicle];
        let horizon = u64::from(self.options.horizon_minutes);
        let capacity = problem.capacities[vehicle];

        let mut time = u64::from(problem.time_windows[start].earliest());
        let mut eval = RouteEval::default();
        let mut prev = start;

        for &node in stops {
            let travel = self.arc(prev, node)?;
            let window = problem.time_windows[node];
            time = (time + u64::from(travel)).max(u64::from(window.earliest()));
            if time > u64::from(window.latest()) || time > horizon {
                return None;
            }
            eval.travel += u64::from(travel);
            eval.load += problem.demands[node];
            if eval.load > capacity {
                return None;
            }
            eval.count += 1;
            prev = node;
        }

        let travel = self.arc(prev, end)?;
        let shift = problem.time_windows[end];
        let arrival = (time + u64::from(travel)).max(u64::from(shift.earliest()));
        if arrival > u64::from(shift.latest()) || arrival > horizon {
            return None;
        }
        eval.travel += u64::from(travel);
        Some(eval)
    }

    /// Travel plus the soft-bound penalties of one route.
    pub fn route_cost(&self, vehicle: usize, eval: &RouteEval) -> u64 {
        let fairness = u64::from(self.count_floor().saturating_sub(eval.count))
            * self.options.fairness_penalty;
        let capacity = if eval.count > 0 {
            u64::from(self.capacity_floor(vehicle).saturating_sub(eval.load))
                * self.options.capacity_floor_penalty
        } else {
            0
        };
        eval.travel + fairness + capacity
    }

    /// Forward and backward passes over the time dimension of a feasible route.
    pub fn schedule(&self, vehicle: usize, stops: &[usize]) -> Vec<VisitTiming> {
        let problem = self.problem;
        let start = problem.starts[vehicle];
        let end = problem.ends[vehicle];

        let mut timings = Vec::with_capacity(stops.len());
        let mut time = problem.time_windows[start].earliest();
        let mut drive = 0u64;
        let mut prev = start;
        for &node in stops {
            let travel = self.matrix.get(prev, node);
            drive += u64::from(travel);
            time = time
                .saturating_add(travel)
                .max(problem.time_windows[node].earliest());
            timings.push(VisitTiming {
                node,
                earliest: time,
                latest: problem.time_windows[node].latest(),
                drive_minutes: drive,
            });
            prev = node;
        }

        let mut next_latest = problem.time_windows[end]
            .latest()
            .min(self.options.horizon_minutes);
        let mut next = end;
        for timing in timings.iter_mut().rev() {
            let travel = self.matrix.get(timing.node, next);
            timing.latest = timing.latest.min(next_latest.saturating_sub(travel));
            next_latest = timing.latest;
            next = timing.node;
        }
        timings
    }
}

fn ratio_floor(value: u32, ratio: f64) -> u32 {
    (f64::from(value) * ratio).floor().max(0.0) as u32
}
