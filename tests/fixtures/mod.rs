//! Test fixtures for visit-router.
//!
//! Provides:
//! - Real Las Vegas / Henderson coordinates
//! - Stub entity, distance and persistence seams
//! - Builders for vehicles and stops

#![allow(dead_code)]

pub mod las_vegas_locations;
pub mod stubs;

pub use stubs::*;

use visit_router::model::{Location, Stop, StopId, TimeWindow, Vehicle, VehicleId};

pub fn window(earliest: u32, latest: u32) -> TimeWindow {
    TimeWindow::new(earliest, latest).unwrap()
}

/// A point on the grid used by [`GridProvider`]: one unit of distance is one
/// minute of travel.
pub fn point(name: &str, x: f64, y: f64) -> Location {
    Location::new(name, x, y)
}

/// Vehicle starting and ending at the grid origin on an 08:00-17:00 shift.
pub fn vehicle(id: u64) -> Vehicle {
    Vehicle::new(
        VehicleId(id),
        point(&format!("depot-{id}"), 0.0, 0.0),
        point(&format!("depot-{id}"), 0.0, 0.0),
        window(480, 1020),
    )
}

/// Stop on the grid with a full-day window.
pub fn stop(id: u64, x: f64, y: f64) -> Stop {
    Stop::new(StopId(id), point(&format!("stop-{id}"), x, y), window(480, 1020))
}
