//! Solution applier: pushes assignments to the persistence layer.
//!
//! Writes are issued stop by stop. A refused write is recorded and the
//! remaining writes still go out; nothing is rolled back. Dropped stops are
//! reported but never written, so they keep whatever status they had.

use tracing::{info, warn};

use crate::error::ApplyError;
use crate::model::{AssignmentStatus, StopId};
use crate::problem::Problem;
use crate::solution::Solution;
use crate::solver::RawSolverOutput;
use crate::traits::PersistenceSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub solution: Solution,
    /// Successful assignment writes.
    pub written: usize,
    pub failures: Vec<ApplyError>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Stops whose write failed, for a caller-driven retry.
    pub fn failed_stops(&self) -> Vec<StopId> {
        self.failures.iter().map(|failure| failure.stop_id).collect()
    }
}

pub fn apply<S>(problem: &Problem, raw: &RawSolverOutput, sink: &mut S) -> ApplyReport
where
    S: PersistenceSink + ?Sized,
{
    let solution = Solution::from_raw(problem, raw);
    let mut written = 0;
    let mut failures = Vec::new();

    for route in &solution.routes {
        for (order, &stop_id) in route.stops.iter().enumerate() {
            match sink.write_assignment(stop_id, route.vehicle_id, order, AssignmentStatus::Assigned) {
                Ok(()) => written += 1,
                Err(source) => {
                    warn!(%stop_id, vehicle_id = %route.vehicle_id, error = %source, "assignment write failed");
                    failures.push(ApplyError {
                        stop_id,
                        vehicle_id: route.vehicle_id,
                        source,
                    });
                }
            }
        }
    }

    for dropped in &solution.dropped {
        warn!(stop_id = %dropped.stop_id, reason = %dropped.reason, "stop left unserved");
    }
    info!(
        written,
        failed = failures.len(),
        dropped = solution.dropped.len(),
        "applied solution"
    );

    ApplyReport {
        solution,
        written,
        failures,
    }
}
