//! First solution: cheapest arc per vehicle, then cheapest insertion.

use std::cmp::Reverse;

use super::plan::Plan;
use super::routing::{RouteEval, RoutingModel};
use super::search::Budget;

/// Build an initial plan.
///
/// Each vehicle in turn extends its path along the cheapest feasible arc to an
/// unassigned stop it may serve, ties going to the lower node index, until no
/// stop fits. The finished path is then pruned: stops whose removal saves more
/// than their drop penalty go back to the unassigned pool for the next
/// vehicle. Stops still left over are placed at their cheapest feasible position
/// across all routes, highest penalty first.
pub(crate) fn construct(model: &RoutingModel<'_>, budget: &Budget<'_>) -> Plan {
    let mut plan = Plan::empty(model);

    for vehicle in 0..model.num_vehicles() {
        while !budget.exhausted() {
            match cheapest_extension(model, &plan, vehicle) {
                Some((node, route, eval)) => {
                    plan.set_route(vehicle, route, eval);
                    plan.unassigned.remove(&node);
                }
                None => break,
            }
        }
        prune(model, &mut plan, vehicle);
        if budget.exhausted() {
            return plan;
        }
    }

    let mut leftovers: Vec<usize> = plan.unassigned.iter().copied().collect();
    leftovers.sort_by_key(|&node| (Reverse(model.penalty(node)), node));
    for node in leftovers {
        if budget.exhausted() {
            break;
        }
        if let Some((vehicle, route, eval)) = cheapest_insertion(model, &plan, node) {
            plan.set_route(vehicle, route, eval);
            plan.unassigned.remove(&node);
        }
    }

    plan
}

fn cheapest_extension(
    model: &RoutingModel<'_>,
    plan: &Plan,
    vehicle: usize,
) -> Option<(usize, Vec<usize>, RouteEval)> {
    let route = &plan.routes[vehicle];
    let last = route
        .last()
        .copied()
        .unwrap_or(model.problem.starts[vehicle]);

    let mut best: Option<(u32, usize, Vec<usize>, RouteEval)> = None;
    for &node in &plan.unassigned {
        if !model.is_allowed(vehicle, node) {
            continue;
        }
        let Some(arc) = model.arc(last, node) else {
            continue;
        };
        if best.as_ref().is_some_and(|(cheapest, ..)| arc >= *cheapest) {
            continue;
        }
        let mut candidate = route.clone();
        candidate.push(node);
        let Some(eval) = model.evaluate(vehicle, &candidate) else {
            continue;
        };
        best = Some((arc, node, candidate, eval));
    }

    best.map(|(_, node, route, eval)| (node, route, eval))
}

/// Hand back stops of `vehicle`'s route that cost more than they are worth.
///
/// A route that loses to leaving the vehicle idle and dropping all of its
/// stops is cleared outright. Otherwise the single most profitable removal is
/// applied until none saves more than the stop's drop penalty.
fn prune(model: &RoutingModel<'_>, plan: &mut Plan, vehicle: usize) {
    loop {
        let route = &plan.routes[vehicle];
        if route.is_empty() {
            return;
        }
        let current = model.route_cost(vehicle, &plan.evals[vehicle]);
        let idle = model.route_cost(vehicle, &RouteEval::default())
            + route.iter().map(|&node| model.penalty(node)).sum::<u64>();
        if current > idle {
            let stops = route.clone();
            plan.set_route(vehicle, Vec::new(), RouteEval::default());
            plan.unassigned.extend(stops);
            return;
        }

        let mut best: Option<(u64, usize, Vec<usize>, RouteEval)> = None;
        for index in 0..route.len() {
            let mut candidate = route.clone();
            let node = candidate.remove(index);
            let Some(eval) = model.evaluate(vehicle, &candidate) else {
                continue;
            };
            let after = model.route_cost(vehicle, &eval) + model.penalty(node);
            if after < current && best.as_ref().is_none_or(|(lowest, ..)| after < *lowest) {
                best = Some((after, node, candidate, eval));
            }
        }
        let Some((_, node, candidate, eval)) = best else {
            return;
        };
        plan.set_route(vehicle, candidate, eval);
        plan.unassigned.insert(node);
    }
}

fn cheapest_insertion(
    model: &RoutingModel<'_>,
    plan: &Plan,
    node: usize,
) -> Option<(usize, Vec<usize>, RouteEval)> {
    let mut best: Option<(i64, usize, Vec<usize>, RouteEval)> = None;
    let penalty = model.penalty(node) as i64;

    for vehicle in 0..model.num_vehicles() {
        if !model.is_allowed(vehicle, node) {
            continue;
        }
        let route = &plan.routes[vehicle];
        let current = model.route_cost(vehicle, &plan.evals[vehicle]) as i64;
        for position in 0..=route.len() {
            let mut candidate = route.clone();
            candidate.insert(position, node);
            let Some(eval) = model.evaluate(vehicle, &candidate) else {
                continue;
            };
            let delta = model.route_cost(vehicle, &eval) as i64 - current;
            if delta >= penalty {
                continue;
            }
            if best.as_ref().is_none_or(|(cheapest, ..)| delta < *cheapest) {
                best = Some((delta, vehicle, candidate, eval));
            }
        }
    }

    best.map(|(_, vehicle, route, eval)| (vehicle, route, eval))
}
