//! Route optimizer tests
//!
//! Windows, capacity, compatibility, priority dropping and fairness over small
//! hand-built instances.

mod fixtures;

use std::collections::HashSet;
use std::time::Duration;

use visit_router::cancel::CancellationToken;
use visit_router::matrix::Matrix;
use visit_router::model::{
    Complexity, Discipline, DropReason, Priority, StopId, Vehicle, VehicleId,
};
use visit_router::problem::Problem;
use visit_router::solution::Solution;
use visit_router::solver::{RawSolverOutput, RouteOptimizer, SolveOptions};

use fixtures::{grid_seconds, stop, vehicle, window};

// ============================================================================
// Helpers
// ============================================================================

fn options() -> SolveOptions {
    SolveOptions {
        max_iterations: Some(500),
        ..SolveOptions::default()
    }
}

fn solve(problem: &Problem, matrix: &Matrix) -> RawSolverOutput {
    RouteOptimizer::new(options()).solve(problem, matrix, Duration::from_secs(5), &CancellationToken::new())
}

/// Whole-minute grid matrix over the problem's node locations.
fn grid_matrix(problem: &Problem) -> Matrix {
    let locations = &problem.locations;
    Matrix::from_fn(locations.len(), |i, j| {
        (grid_seconds(&locations[i], &locations[j]) / 60.0) as u32
    })
}

fn served(solution: &Solution, vehicle_id: u64) -> Vec<u64> {
    solution
        .route_for(VehicleId(vehicle_id))
        .map(|route| route.stops.iter().map(|id| id.0).collect())
        .unwrap_or_default()
}

fn dropped_with(solution: &Solution, reason: DropReason) -> Vec<u64> {
    solution
        .dropped
        .iter()
        .filter(|dropped| dropped.reason == reason)
        .map(|dropped| dropped.stop_id.0)
        .collect()
}

/// Every input stop appears on exactly one route or in the drop list.
fn assert_partition(problem: &Problem, solution: &Solution) {
    let mut seen = HashSet::new();
    for route in &solution.routes {
        for stop_id in &route.stops {
            assert!(seen.insert(*stop_id), "{stop_id} served twice");
        }
    }
    for dropped in &solution.dropped {
        assert!(seen.insert(dropped.stop_id), "{} both served and dropped", dropped.stop_id);
    }
    let expected: HashSet<StopId> = problem.stops.iter().map(|stop| stop.id).collect();
    assert_eq!(seen, expected);
}

// ============================================================================
// Three-stop instance
// ============================================================================
//
// Nodes: 0 start, 1 A, 2 B, 3 C, 4 end (end shares the depot with the start).

const A: u64 = 1;
const B: u64 = 2;
const C: u64 = 3;

fn three_stop_matrix() -> Matrix {
    Matrix::from_rows(vec![
        vec![0, 30, 70, 60, 0],
        vec![30, 0, 20, 40, 30],
        vec![70, 20, 0, 50, 70],
        vec![60, 40, 50, 0, 40],
        vec![0, 30, 70, 60, 0],
    ])
    .unwrap()
}

fn three_stop_problem(b_window: (u32, u32)) -> Problem {
    let shift_vehicle = vehicle(1).with_capacity(15);
    let stops = vec![
        stop(A, 1.0, 0.0)
            .with_label("A")
            .with_window(window(540, 720))
            .with_complexity(Complexity::Simple)
            .with_priority(Priority::Green),
        stop(B, 2.0, 0.0)
            .with_label("B")
            .with_window(window(b_window.0, b_window.1))
            .with_complexity(Complexity::Routine)
            .with_priority(Priority::Red),
        stop(C, 3.0, 0.0)
            .with_label("C")
            .with_window(window(960, 1020))
            .with_complexity(Complexity::Simple)
            .with_priority(Priority::Green),
    ];
    Problem::build(vec![shift_vehicle], stops).unwrap()
}

#[test]
fn test_all_three_served_when_windows_allow() {
    let problem = three_stop_problem((540, 600));
    let raw = solve(&problem, &three_stop_matrix());
    let solution = Solution::from_raw(&problem, &raw);

    assert!(solution.dropped.is_empty(), "nothing should be dropped: {:?}", solution.dropped);
    assert_eq!(served(&solution, 1), vec![A, B, C]);
    assert_eq!(raw.stats.travel_minutes, 140);
    assert_partition(&problem, &solution);
}

#[test]
fn test_arrival_windows_for_served_route() {
    let problem = three_stop_problem((540, 600));
    let raw = solve(&problem, &three_stop_matrix());
    let timings = &raw.routes[0].timings;

    let earliest: Vec<u32> = timings.iter().map(|t| t.earliest).collect();
    let latest: Vec<u32> = timings.iter().map(|t| t.latest).collect();
    let drive: Vec<u64> = timings.iter().map(|t| t.drive_minutes).collect();

    // waits at A until 540; C opens at 960
    assert_eq!(earliest, vec![540, 560, 960]);
    // C must leave 40 minutes before the shift closes; B's own window binds;
    // A must reach B by 600
    assert_eq!(latest, vec![580, 600, 980]);
    assert_eq!(drive, vec![30, 50, 100]);
}

#[test]
fn test_narrow_window_drops_unreachable_stop() {
    let problem = three_stop_problem((540, 545));
    let raw = solve(&problem, &three_stop_matrix());
    let solution = Solution::from_raw(&problem, &raw);

    assert_eq!(dropped_with(&solution, DropReason::Infeasible), vec![B]);
    assert_eq!(served(&solution, 1), vec![A, C]);
    assert_partition(&problem, &solution);
}

#[test]
fn test_missing_skill_is_skill_mismatch() {
    let problem = Problem::build(
        vec![vehicle(1).with_skill("wound care")],
        vec![stop(1, 1.0, 0.0).requiring("specimen collection")],
    )
    .unwrap();
    let raw = solve(&problem, &grid_matrix(&problem));
    let solution = Solution::from_raw(&problem, &raw);

    assert_eq!(dropped_with(&solution, DropReason::SkillMismatch), vec![1]);
    assert!(solution.is_all_dropped());
}

// ============================================================================
// Dimensions
// ============================================================================

#[test]
fn test_capacity_ceiling_is_never_exceeded() {
    // three routine stops weigh 2 each; only one fits
    let problem = Problem::build(
        vec![vehicle(1).with_capacity(3)],
        vec![stop(1, 1.0, 0.0), stop(2, 2.0, 0.0), stop(3, 3.0, 0.0)],
    )
    .unwrap();
    let raw = solve(&problem, &grid_matrix(&problem));
    let solution = Solution::from_raw(&problem, &raw);

    assert_eq!(solution.served_count(), 1);
    assert_eq!(dropped_with(&solution, DropReason::Infeasible).len(), 2);
    assert_partition(&problem, &solution);
}

#[test]
fn test_shift_end_bounds_the_route() {
    // the far stop is 300 minutes out: no way back before 17:00 after 08:00 + 300 + wait
    let far = stop(2, 300.0, 0.0).with_window(window(900, 1000));
    let problem = Problem::build(vec![vehicle(1)], vec![stop(1, 5.0, 0.0), far]).unwrap();
    let raw = solve(&problem, &grid_matrix(&problem));
    let solution = Solution::from_raw(&problem, &raw);

    assert_eq!(served(&solution, 1), vec![1]);
    assert_eq!(dropped_with(&solution, DropReason::Infeasible), vec![2]);
}

#[test]
fn test_unreachable_arcs_are_never_driven() {
    let problem = Problem::build(vec![vehicle(1)], vec![stop(1, 1.0, 0.0), stop(2, 2.0, 0.0)]).unwrap();
    let grid = grid_matrix(&problem);
    // stop 2 (node 2) cannot be reached from anywhere
    let matrix = Matrix::from_fn(grid.size(), |i, j| {
        if j == 2 && i != 2 { Matrix::UNREACHABLE } else { grid.get(i, j) }
    });
    let raw = solve(&problem, &matrix);
    let solution = Solution::from_raw(&problem, &raw);

    assert_eq!(served(&solution, 1), vec![1]);
    assert_eq!(dropped_with(&solution, DropReason::Infeasible), vec![2]);
}

// ============================================================================
// Compatibility
// ============================================================================

#[test]
fn test_served_stops_respect_skills_and_discipline() {
    let vehicles = vec![
        vehicle(1)
            .with_discipline(Discipline::Nurse)
            .with_skill("specimen collection")
            .with_skill("med administration"),
        vehicle(2).with_discipline(Discipline::PhysicalTherapist),
    ];
    let stops = vec![
        stop(1, 1.0, 0.0).requiring("specimen collection"),
        stop(2, 2.0, 0.0).with_discipline(Discipline::PhysicalTherapist),
        stop(3, 0.0, 1.0).with_discipline(Discipline::Nurse).requiring("med administration"),
        stop(4, 0.0, 2.0),
        stop(5, 1.0, 1.0).with_discipline(Discipline::Doctor),
        stop(6, 2.0, 2.0).requiring("ventilator care"),
    ];
    let problem = Problem::build(vehicles.clone(), stops.clone()).unwrap();
    let raw = solve(&problem, &grid_matrix(&problem));
    let solution = Solution::from_raw(&problem, &raw);

    for route in &solution.routes {
        let worker: &Vehicle = vehicles.iter().find(|v| v.id == route.vehicle_id).unwrap();
        for stop_id in &route.stops {
            let visit = stops.iter().find(|s| s.id == *stop_id).unwrap();
            assert!(worker.can_serve(visit), "{} cannot serve {}", worker.id, stop_id);
        }
    }

    let mut mismatched = dropped_with(&solution, DropReason::SkillMismatch);
    mismatched.sort();
    assert_eq!(mismatched, vec![5, 6]);
    assert_eq!(solution.served_count(), 4);
    assert_partition(&problem, &solution);
}

// ============================================================================
// Priorities and fairness
// ============================================================================

#[test]
fn test_higher_priority_kept_when_capacity_forces_a_drop() {
    // capacity 2 fits a single routine stop; the red one is far but costly to drop
    let problem = Problem::build(
        vec![vehicle(1).with_capacity(2)],
        vec![
            stop(1, 10.0, 0.0).with_priority(Priority::Green),
            stop(2, 100.0, 0.0).with_priority(Priority::Red),
        ],
    )
    .unwrap();
    let raw = solve(&problem, &grid_matrix(&problem));
    let solution = Solution::from_raw(&problem, &raw);

    assert_eq!(served(&solution, 1), vec![2]);
    assert_eq!(solution.drop_reason(StopId(1)), Some(DropReason::Infeasible));
}

#[test]
fn test_fairness_spreads_stops_across_vehicles() {
    let stops = (1..=4).map(|i| stop(i, i as f64, 0.0)).collect();
    let problem = Problem::build(vec![vehicle(1), vehicle(2)], stops).unwrap();
    let raw = solve(&problem, &grid_matrix(&problem));
    let solution = Solution::from_raw(&problem, &raw);

    assert!(solution.dropped.is_empty());
    assert!(!served(&solution, 1).is_empty(), "vehicle 1 left idle");
    assert!(!served(&solution, 2).is_empty(), "vehicle 2 left idle");
    assert_partition(&problem, &solution);
}

// ============================================================================
// Remote clusters
// ============================================================================
//
// A single stop far from the depot costs more to reach than its drop
// penalty, but a group of them shares the drive.

#[test]
fn test_remote_cluster_is_served_by_one_worker() {
    // four 08:00-16:00 workers, four routine visits together 40 minutes out
    let vehicles = (1..=4).map(|id| vehicle(id).with_capacity(15)).collect();
    let stops = (1..=4).map(|id| stop(id, 40.0, 0.0)).collect();
    let problem = Problem::build(vehicles, stops).unwrap();
    let raw = solve(&problem, &grid_matrix(&problem));
    let solution = Solution::from_raw(&problem, &raw);

    assert!(solution.dropped.is_empty());
    assert_eq!(solution.served_count(), 4);
    // 80 minutes of driving plus four units short of the load floor,
    // against 4 * 81 for dropping them all
    assert_eq!(raw.stats.objective, 84);
    assert_partition(&problem, &solution);
}

#[test]
fn test_search_keeps_going_while_budget_remains() {
    let vehicles = (1..=4).map(|id| vehicle(id).with_capacity(15)).collect();
    let stops = (1..=4).map(|id| stop(id, 40.0, 0.0)).collect();
    let problem = Problem::build(vehicles, stops).unwrap();
    let raw = solve(&problem, &grid_matrix(&problem));

    assert!(raw.stats.iterations > 1);
    assert!(raw.stats.penalty_rounds > 0);
}

#[test]
fn test_large_cluster_fills_one_big_vehicle() {
    let stops = (1..=200).map(|id| stop(id, 5.0, 0.0)).collect();
    let problem = Problem::build(vec![vehicle(1).with_capacity(10_000)], stops).unwrap();
    let options = SolveOptions {
        max_iterations: Some(3),
        ..SolveOptions::default()
    };
    let raw = RouteOptimizer::new(options).solve(
        &problem,
        &grid_matrix(&problem),
        Duration::from_secs(2),
        &CancellationToken::new(),
    );
    let solution = Solution::from_raw(&problem, &raw);

    assert!(solution.dropped.is_empty());
    assert_eq!(served(&solution, 1).len(), 200);
    assert_eq!(raw.stats.travel_minutes, 10);
}

// ============================================================================
// Degenerate runs
// ============================================================================

#[test]
fn test_nothing_feasible_drops_everything() {
    // every window closes before the shift starts
    let early = |id| stop(id, 1.0, 0.0).with_window(window(300, 400));
    let problem = Problem::build(vec![vehicle(1)], vec![early(1), early(2)]).unwrap();
    let raw = solve(&problem, &grid_matrix(&problem));
    let solution = Solution::from_raw(&problem, &raw);

    assert!(solution.is_all_dropped());
    assert_eq!(dropped_with(&solution, DropReason::Infeasible), vec![1, 2]);
    assert_eq!(raw.routes.len(), 1);
    assert!(raw.routes[0].stop_nodes().is_empty());
}

#[test]
fn test_mismatched_matrix_drops_everything() {
    let problem = Problem::build(vec![vehicle(1)], vec![stop(1, 1.0, 0.0)]).unwrap();
    let raw = solve(&problem, &Matrix::from_fn(2, |_, _| 1));
    let solution = Solution::from_raw(&problem, &raw);

    assert!(solution.is_all_dropped());
    assert_eq!(solution.drop_reason(StopId(1)), Some(DropReason::Infeasible));
}

#[test]
fn test_cancelled_solve_still_partitions_stops() {
    let stops = (1..=6).map(|i| stop(i, i as f64, 1.0)).collect();
    let problem = Problem::build(vec![vehicle(1), vehicle(2)], stops).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let raw = RouteOptimizer::new(SolveOptions::default()).solve(
        &problem,
        &grid_matrix(&problem),
        Duration::from_secs(30),
        &cancel,
    );
    let solution = Solution::from_raw(&problem, &raw);

    assert!(raw.stats.elapsed < Duration::from_secs(5));
    assert_eq!(raw.stats.iterations, 0);
    assert_partition(&problem, &solution);
}

#[test]
fn test_zero_budget_returns_a_plan() {
    let problem = Problem::build(vec![vehicle(1)], vec![stop(1, 1.0, 0.0), stop(2, 2.0, 0.0)]).unwrap();
    let raw = RouteOptimizer::new(SolveOptions::default()).solve(
        &problem,
        &grid_matrix(&problem),
        Duration::ZERO,
        &CancellationToken::new(),
    );
    let solution = Solution::from_raw(&problem, &raw);
    assert_partition(&problem, &solution);
}

#[test]
fn test_search_reports_stats() {
    let stops = (1..=5).map(|i| stop(i, (i * 3 % 7) as f64, (i % 3) as f64)).collect();
    let problem = Problem::build(vec![vehicle(1), vehicle(2)], stops).unwrap();
    let raw = solve(&problem, &grid_matrix(&problem));

    let travel: u64 = raw.routes.iter().map(|route| route.travel_minutes).sum();
    assert_eq!(raw.stats.travel_minutes, travel);
    assert!(raw.stats.objective >= travel);
    assert!(raw.stats.iterations > 0);
}
