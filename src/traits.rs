//! Seams to the collaborators around the optimization core.
//!
//! These are intentionally narrow. The embedding service implements them over
//! its own entity store, map API and database.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EntityError, ProviderError, SinkError};
use crate::model::{AssignmentStatus, Location, Scope, Stop, StopId, TransitMode, Vehicle, VehicleId};

/// Durations returned by one provider call, in seconds.
///
/// `fragment[i][j]` is the travel time from `origins[i]` to `destinations[j]`;
/// `None` marks a pair the provider could not route.
pub type MatrixFragment = Vec<Vec<Option<f64>>>;

/// Per-call size limits a distance provider enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkLimits {
    /// Origins × destinations per call.
    pub max_elements: usize,
    /// Origins per call.
    pub max_rows: usize,
    /// Destinations per call.
    pub max_cols: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_elements: 100,
            max_rows: 25,
            max_cols: 25,
        }
    }
}

impl ChunkLimits {
    /// No effective limit; every build is a single call.
    pub fn unbounded() -> Self {
        Self {
            max_elements: usize::MAX,
            max_rows: usize::MAX,
            max_cols: usize::MAX,
        }
    }
}

/// Provides travel times between locations.
///
/// Calls may be issued concurrently from several threads. Failures are
/// surfaced to the caller, never retried here.
pub trait GeoDistanceProvider: Sync {
    fn distances(
        &self,
        origins: &[Location],
        destinations: &[Location],
        mode: TransitMode,
    ) -> Result<MatrixFragment, ProviderError>;

    /// Size limits every call must respect.
    fn limits(&self) -> ChunkLimits {
        ChunkLimits::default()
    }
}

impl<T: GeoDistanceProvider + ?Sized> GeoDistanceProvider for &T {
    fn distances(
        &self,
        origins: &[Location],
        destinations: &[Location],
        mode: TransitMode,
    ) -> Result<MatrixFragment, ProviderError> {
        (**self).distances(origins, destinations, mode)
    }

    fn limits(&self) -> ChunkLimits {
        (**self).limits()
    }
}

/// Read-only access to the active vehicles and stops of a run.
pub trait EntityProvider {
    fn vehicles_for(&self, scope: &Scope, date: NaiveDate) -> Result<Vec<Vehicle>, EntityError>;

    fn stops_for(&self, scope: &Scope, date: NaiveDate) -> Result<Vec<Stop>, EntityError>;
}

impl<T: EntityProvider + ?Sized> EntityProvider for &T {
    fn vehicles_for(&self, scope: &Scope, date: NaiveDate) -> Result<Vec<Vehicle>, EntityError> {
        (**self).vehicles_for(scope, date)
    }

    fn stops_for(&self, scope: &Scope, date: NaiveDate) -> Result<Vec<Stop>, EntityError> {
        (**self).stops_for(scope, date)
    }
}

/// Receives assignment writes. Each call stands alone: there is no batch or
/// transaction across stops.
pub trait PersistenceSink {
    fn write_assignment(
        &mut self,
        stop_id: StopId,
        vehicle_id: VehicleId,
        order: usize,
        status: AssignmentStatus,
    ) -> Result<(), SinkError>;
}
