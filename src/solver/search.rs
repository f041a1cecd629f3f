//! Guided local search over the plan.
//!
//! The neighbourhood is scanned first-improvement against an augmented cost:
//! the true objective plus `lambda` times the penalties accumulated on the
//! arcs each route drives. When no move improves the augmented cost, the arcs
//! of the current plan with the highest `cost / (1 + penalty)` utility are
//! penalised, which pushes the search out of the local minimum. A plan that
//! drives no arcs has nothing to penalise, so the search instead kicks one
//! dropped stop onto its cheapest feasible position, rotating through the
//! candidates on successive kicks. The best plan under the true objective is
//! kept throughout.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::cancel::CancellationToken;

use super::plan::Plan;
use super::routing::{RouteEval, RoutingModel};

/// Wall-clock, cancellation and iteration bounds for one solve.
pub(crate) struct Budget<'c> {
    deadline: Option<Instant>,
    cancel: &'c CancellationToken,
    max_iterations: Option<usize>,
}

impl<'c> Budget<'c> {
    pub fn new(time: Duration, cancel: &'c CancellationToken, max_iterations: Option<usize>) -> Self {
        Self {
            deadline: Instant::now().checked_add(time),
            cancel,
            max_iterations,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn iterations_left(&self, done: usize) -> bool {
        self.max_iterations.is_none_or(|max| done < max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SearchStats {
    pub iterations: usize,
    pub penalty_rounds: usize,
    pub kicks: usize,
}

/// A change to at most two routes and the unassigned set.
struct Move {
    routes: Vec<(usize, Vec<usize>, RouteEval)>,
    served: Option<usize>,
    dropped: Option<usize>,
}

impl Move {
    fn single(vehicle: usize, route: Vec<usize>, eval: RouteEval) -> Self {
        Self {
            routes: vec![(vehicle, route, eval)],
            served: None,
            dropped: None,
        }
    }

    fn apply(self, plan: &mut Plan) {
        for (vehicle, route, eval) in self.routes {
            plan.set_route(vehicle, route, eval);
        }
        if let Some(node) = self.served {
            plan.unassigned.remove(&node);
        }
        if let Some(node) = self.dropped {
            plan.unassigned.insert(node);
        }
    }
}

/// Arc penalties and their weight in the augmented cost.
struct Guide {
    nodes: usize,
    penalties: Vec<u64>,
    lambda: u64,
}

impl Guide {
    fn new(nodes: usize) -> Self {
        Self {
            nodes,
            penalties: vec![0; nodes * nodes],
            lambda: 0,
        }
    }

    fn arc_penalty(&self, from: usize, to: usize) -> u64 {
        self.penalties[from * self.nodes + to]
    }

    fn route_penalty(&self, model: &RoutingModel<'_>, vehicle: usize, route: &[usize]) -> u64 {
        if self.lambda == 0 || route.is_empty() {
            return 0;
        }
        let mut prev = model.problem.starts[vehicle];
        let mut total = 0;
        for &node in route {
            total += self.arc_penalty(prev, node);
            prev = node;
        }
        total + self.arc_penalty(prev, model.problem.ends[vehicle])
    }

    /// Penalise the maximum-utility arcs of `plan`. Returns false when the
    /// plan drives no arcs, leaving nothing to escape with.
    fn penalize(&mut self, model: &RoutingModel<'_>, plan: &Plan, factor: f64) -> bool {
        let arcs = plan.arcs(model);
        if arcs.is_empty() {
            return false;
        }
        if self.lambda == 0 {
            let per_arc = plan.objective(model) as f64 / arcs.len() as f64;
            self.lambda = (factor * per_arc).ceil().max(1.0) as u64;
            debug!(lambda = self.lambda, "guided local search engaged");
        }

        // utility a > utility b  <=>  cost_a * (1 + p_b) > cost_b * (1 + p_a)
        let utility = |&(from, to): &(usize, usize)| {
            (u64::from(model.matrix.get(from, to)), 1 + self.arc_penalty(from, to))
        };
        let mut top = Vec::new();
        let mut best = (0u64, 1u64);
        for arc in &arcs {
            let (cost, weight) = utility(arc);
            let lhs = u128::from(cost) * u128::from(best.1);
            let rhs = u128::from(best.0) * u128::from(weight);
            if top.is_empty() || lhs > rhs {
                best = (cost, weight);
                top.clear();
                top.push(*arc);
            } else if lhs == rhs {
                top.push(*arc);
            }
        }
        for (from, to) in top {
            self.penalties[from * self.nodes + to] += 1;
        }
        true
    }
}

/// Improve `plan` until the budget runs out; return the best plan seen.
pub(crate) fn improve(
    model: &RoutingModel<'_>,
    plan: Plan,
    budget: &Budget<'_>,
    lambda_factor: f64,
) -> (Plan, SearchStats) {
    let mut stats = SearchStats::default();
    let mut best_objective = plan.objective(model);
    let mut best = plan.clone();
    let mut current = plan;
    let mut guide = Guide::new(model.problem.num_nodes());

    while !budget.exhausted() && budget.iterations_left(stats.iterations) {
        stats.iterations += 1;
        let search = Neighbourhood {
            model,
            guide: &guide,
            budget,
        };
        match search.first_improvement(&current) {
            Some(step) => {
                step.apply(&mut current);
                let objective = current.objective(model);
                if objective < best_objective {
                    debug!(
                        objective,
                        iteration = stats.iterations,
                        unassigned = current.unassigned.len(),
                        "new best plan"
                    );
                    best_objective = objective;
                    best = current.clone();
                }
            }
            None => {
                if budget.exhausted() {
                    break;
                }
                if guide.penalize(model, &current, lambda_factor) {
                    stats.penalty_rounds += 1;
                    continue;
                }
                let search = Neighbourhood {
                    model,
                    guide: &guide,
                    budget,
                };
                match search.kick(&current, stats.kicks) {
                    Some(step) => {
                        step.apply(&mut current);
                        stats.kicks += 1;
                    }
                    // no arcs and no stop fits anywhere: no move can change the plan
                    None => break,
                }
            }
        }
    }

    debug!(
        iterations = stats.iterations,
        penalty_rounds = stats.penalty_rounds,
        kicks = stats.kicks,
        "search finished"
    );
    (best, stats)
}

struct Neighbourhood<'s, 'm, 'a> {
    model: &'s RoutingModel<'m>,
    guide: &'s Guide,
    budget: &'s Budget<'a>,
}

impl Neighbourhood<'_, '_, '_> {
    fn cost(&self, vehicle: usize, route: &[usize], eval: &RouteEval) -> i64 {
        let augmented = self.model.route_cost(vehicle, eval)
            + self.guide.lambda * self.guide.route_penalty(self.model, vehicle, route);
        augmented as i64
    }

    fn current_cost(&self, plan: &Plan, vehicle: usize) -> i64 {
        self.cost(vehicle, &plan.routes[vehicle], &plan.evals[vehicle])
    }

    fn penalty(&self, node: usize) -> i64 {
        self.model.penalty(node) as i64
    }

    fn first_improvement(&self, plan: &Plan) -> Option<Move> {
        self.insert_unassigned(plan)
            .or_else(|| self.relocate(plan))
            .or_else(|| self.exchange(plan))
            .or_else(|| self.two_opt(plan))
            .or_else(|| self.replace(plan))
            .or_else(|| self.remove(plan))
    }

    /// Serve a dropped stop at its best position, if that pays for itself.
    fn insert_unassigned(&self, plan: &Plan) -> Option<Move> {
        for &node in &plan.unassigned {
            if self.budget.exhausted() {
                return None;
            }
            let mut best: Option<(i64, usize, Vec<usize>, RouteEval)> = None;
            for vehicle in 0..self.model.num_vehicles() {
                if !self.model.is_allowed(vehicle, node) {
                    continue;
                }
                let route = &plan.routes[vehicle];
                let current = self.current_cost(plan, vehicle);
                for position in 0..=route.len() {
                    let mut candidate = route.clone();
                    candidate.insert(position, node);
                    let Some(eval) = self.model.evaluate(vehicle, &candidate) else {
                        continue;
                    };
                    let delta = self.cost(vehicle, &candidate, &eval) - current - self.penalty(node);
                    if delta < 0 && best.as_ref().is_none_or(|(lowest, ..)| delta < *lowest) {
                        best = Some((delta, vehicle, candidate, eval));
                    }
                }
            }
            if let Some((_, vehicle, route, eval)) = best {
                let mut step = Move::single(vehicle, route, eval);
                step.served = Some(node);
                return Some(step);
            }
        }
        None
    }

    /// Move one stop to another position, on the same or another route.
    fn relocate(&self, plan: &Plan) -> Option<Move> {
        let vehicles = self.model.num_vehicles();
        for from in 0..vehicles {
            let source = &plan.routes[from];
            let source_cost = self.current_cost(plan, from);
            for index in 0..source.len() {
                if self.budget.exhausted() {
                    return None;
                }
                let node = source[index];
                let mut shrunk = source.clone();
                shrunk.remove(index);
                let shrunk_eval = self.model.evaluate(from, &shrunk);

                for to in 0..vehicles {
                    if !self.model.is_allowed(to, node) {
                        continue;
                    }
                    if to == from {
                        for position in 0..=shrunk.len() {
                            if position == index {
                                continue;
                            }
                            let mut candidate = shrunk.clone();
                            candidate.insert(position, node);
                            let Some(eval) = self.model.evaluate(from, &candidate) else {
                                continue;
                            };
                            if self.cost(from, &candidate, &eval) < source_cost {
                                return Some(Move::single(from, candidate, eval));
                            }
                        }
                        continue;
                    }

                    let Some(shrunk_eval) = shrunk_eval else {
                        continue;
                    };
                    let target = &plan.routes[to];
                    let before = source_cost + self.current_cost(plan, to);
                    let shrunk_cost = self.cost(from, &shrunk, &shrunk_eval);
                    for position in 0..=target.len() {
                        let mut candidate = target.clone();
                        candidate.insert(position, node);
                        let Some(eval) = self.model.evaluate(to, &candidate) else {
                            continue;
                        };
                        if shrunk_cost + self.cost(to, &candidate, &eval) < before {
                            return Some(Move {
                                routes: vec![(from, shrunk, shrunk_eval), (to, candidate, eval)],
                                served: None,
                                dropped: None,
                            });
                        }
                    }
                }
            }
        }
        None
    }

    /// Swap one stop between two routes.
    fn exchange(&self, plan: &Plan) -> Option<Move> {
        let vehicles = self.model.num_vehicles();
        for first in 0..vehicles {
            for second in first + 1..vehicles {
                if self.budget.exhausted() {
                    return None;
                }
                let before = self.current_cost(plan, first) + self.current_cost(plan, second);
                let (left, right) = (&plan.routes[first], &plan.routes[second]);
                for i in 0..left.len() {
                    for j in 0..right.len() {
                        let (a, b) = (left[i], right[j]);
                        if !self.model.is_allowed(second, a) || !self.model.is_allowed(first, b) {
                            continue;
                        }
                        let mut new_left = left.clone();
                        new_left[i] = b;
                        let Some(left_eval) = self.model.evaluate(first, &new_left) else {
                            continue;
                        };
                        let mut new_right = right.clone();
                        new_right[j] = a;
                        let Some(right_eval) = self.model.evaluate(second, &new_right) else {
                            continue;
                        };
                        let after = self.cost(first, &new_left, &left_eval)
                            + self.cost(second, &new_right, &right_eval);
                        if after < before {
                            return Some(Move {
                                routes: vec![
                                    (first, new_left, left_eval),
                                    (second, new_right, right_eval),
                                ],
                                served: None,
                                dropped: None,
                            });
                        }
                    }
                }
            }
        }
        None
    }

    /// Reverse a segment within a route.
    fn two_opt(&self, plan: &Plan) -> Option<Move> {
        for vehicle in 0..self.model.num_vehicles() {
            if self.budget.exhausted() {
                return None;
            }
            let route = &plan.routes[vehicle];
            if route.len() < 2 {
                continue;
            }
            let current = self.current_cost(plan, vehicle);
            for i in 0..route.len() - 1 {
                for j in i + 1..route.len() {
                    let mut candidate = route.clone();
                    candidate[i..=j].reverse();
                    let Some(eval) = self.model.evaluate(vehicle, &candidate) else {
                        continue;
                    };
                    if self.cost(vehicle, &candidate, &eval) < current {
                        return Some(Move::single(vehicle, candidate, eval));
                    }
                }
            }
        }
        None
    }

    /// Trade a served stop for a dropped one in the same slot.
    fn replace(&self, plan: &Plan) -> Option<Move> {
        if plan.unassigned.is_empty() {
            return None;
        }
        for vehicle in 0..self.model.num_vehicles() {
            if self.budget.exhausted() {
                return None;
            }
            let route = &plan.routes[vehicle];
            let current = self.current_cost(plan, vehicle);
            for index in 0..route.len() {
                let out = route[index];
                for &node in &plan.unassigned {
                    if !self.model.is_allowed(vehicle, node) {
                        continue;
                    }
                    let mut candidate = route.clone();
                    candidate[index] = node;
                    let Some(eval) = self.model.evaluate(vehicle, &candidate) else {
                        continue;
                    };
                    let delta = self.cost(vehicle, &candidate, &eval) - current
                        - self.penalty(node)
                        + self.penalty(out);
                    if delta < 0 {
                        return Some(Move {
                            routes: vec![(vehicle, candidate, eval)],
                            served: Some(node),
                            dropped: Some(out),
                        });
                    }
                }
            }
        }
        None
    }

    /// Serve a dropped stop even at a loss. Candidates are ordered by their
    /// cheapest feasible insertion and `round` picks which one goes in.
    fn kick(&self, plan: &Plan, round: usize) -> Option<Move> {
        let mut candidates: Vec<(i64, usize, usize, Vec<usize>, RouteEval)> = Vec::new();
        for &node in &plan.unassigned {
            let mut best: Option<(i64, usize, Vec<usize>, RouteEval)> = None;
            for vehicle in 0..self.model.num_vehicles() {
                if !self.model.is_allowed(vehicle, node) {
                    continue;
                }
                let route = &plan.routes[vehicle];
                let current = self.current_cost(plan, vehicle);
                for position in 0..=route.len() {
                    let mut candidate = route.clone();
                    candidate.insert(position, node);
                    let Some(eval) = self.model.evaluate(vehicle, &candidate) else {
                        continue;
                    };
                    let delta = self.cost(vehicle, &candidate, &eval) - current - self.penalty(node);
                    if best.as_ref().is_none_or(|(lowest, ..)| delta < *lowest) {
                        best = Some((delta, vehicle, candidate, eval));
                    }
                }
            }
            if let Some((delta, vehicle, route, eval)) = best {
                candidates.push((delta, node, vehicle, route, eval));
            }
        }
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by_key(|&(delta, node, ..)| (delta, node));
        let pick = round % candidates.len();
        let (_, node, vehicle, route, eval) = candidates.swap_remove(pick);
        let mut step = Move::single(vehicle, route, eval);
        step.served = Some(node);
        Some(step)
    }

    /// Drop a served stop when its cost exceeds its penalty.
    fn remove(&self, plan: &Plan) -> Option<Move> {
        for vehicle in 0..self.model.num_vehicles() {
            if self.budget.exhausted() {
                return None;
            }
            let route = &plan.routes[vehicle];
            let current = self.current_cost(plan, vehicle);
            for index in 0..route.len() {
                let node = route[index];
                let mut candidate = route.clone();
                candidate.remove(index);
                let Some(eval) = self.model.evaluate(vehicle, &candidate) else {
                    continue;
                };
                let delta = self.cost(vehicle, &candidate, &eval) - current + self.penalty(node);
                if delta < 0 {
                    let mut step = Move::single(vehicle, candidate, eval);
                    step.dropped = Some(node);
                    return Some(step);
                }
            }
        }
        None
    }
}
