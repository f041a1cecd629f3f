//! Tabular route summary for a reporting layer.
//!
//! Dropped stops come first, then each vehicle's stops in route order.

use std::fmt;

use serde::Serialize;

use crate::model::{Complexity, Discipline, DropReason, Priority, StopId, clock};
use crate::problem::Problem;
use crate::solver::RawSolverOutput;

const UNASSIGNED: &str = "UNASSIGNED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    /// Serving vehicle's name, `None` for a dropped stop.
    pub vehicle: Option<String>,
    pub stop_id: StopId,
    pub label: String,
    /// Earliest service start, minutes from midnight.
    pub start_by: Option<u32>,
    /// Latest service start that keeps the rest of the route on time.
    pub leave_by: Option<u32>,
    pub priority: Priority,
    pub complexity: Complexity,
    pub skills: Vec<String>,
    pub discipline: Discipline,
    pub address: String,
    /// Drive time accumulated on the route up to this stop.
    pub drive_minutes: Option<u64>,
    pub drop_reason: Option<DropReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RouteSummary {
    pub rows: Vec<SummaryRow>,
}

impl RouteSummary {
    pub fn new(problem: &Problem, raw: &RawSolverOutput) -> Self {
        let mut rows = Vec::new();

        for &(node, reason) in &raw.dropped {
            let Some(stop) = problem.stop_at(node) else {
                continue;
            };
            rows.push(SummaryRow {
                vehicle: None,
                stop_id: stop.id,
                label: stop.label.clone(),
                start_by: None,
                leave_by: None,
                priority: stop.priority,
                complexity: stop.complexity,
                skills: stop.skills.iter().cloned().collect(),
                discipline: stop.discipline,
                address: stop.address.clone(),
                drive_minutes: None,
                drop_reason: Some(reason),
            });
        }

        for route in &raw.routes {
            let Some(vehicle) = problem.vehicles.get(route.vehicle) else {
                continue;
            };
            for timing in &route.timings {
                let Some(stop) = problem.stop_at(timing.node) else {
                    continue;
                };
                rows.push(SummaryRow {
                    vehicle: Some(vehicle.name.clone()),
                    stop_id: stop.id,
                    label: stop.label.clone(),
                    start_by: Some(timing.earliest),
                    leave_by: Some(timing.latest),
                    priority: stop.priority,
                    complexity: stop.complexity,
                    skills: stop.skills.iter().cloned().collect(),
                    discipline: stop.discipline,
                    address: stop.address.clone(),
                    drive_minutes: Some(timing.drive_minutes),
                    drop_reason: None,
                });
            }
        }

        Self { rows }
    }
}

impl fmt::Display for RouteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:<10} {:<20} {:>8} {:>8} {:<8} {:<10} {:<20} {:<10} {:<24} {:>6}  {}",
            "Vehicle",
            "Stop",
            "Name",
            "Start By",
            "Leave By",
            "Priority",
            "Complexity",
            "Skills",
            "Discipline",
            "Address",
            "Drive",
            "Reason"
        )?;
        for row in &self.rows {
            let time = |value: Option<u32>| value.map_or_else(|| "-".to_string(), clock);
            let skills = if row.skills.is_empty() {
                "-".to_string()
            } else {
                row.skills.join(",")
            };
            writeln!(
                f,
                "{:<16} {:<10} {:<20} {:>8} {:>8} {:<8} {:<10} {:<20} {:<10} {:<24} {:>6}  {}",
                row.vehicle.as_deref().unwrap_or(UNASSIGNED),
                row.stop_id.to_string(),
                row.label,
                time(row.start_by),
                time(row.leave_by),
                row.priority.to_string(),
                row.complexity.to_string(),
                skills,
                row.discipline.to_string(),
                row.address,
                row.drive_minutes.map_or_else(|| "N/A".to_string(), |m| m.to_string()),
                row.drop_reason.map_or_else(|| "-".to_string(), |r| r.to_string()),
            )?;
        }
        Ok(())
    }
}
