//! Deterministic stand-ins for the entity store, distance service and
//! persistence layer.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;

use visit_router::cancel::CancellationToken;
use visit_router::error::{EntityError, ProviderError, SinkError};
use visit_router::model::{AssignmentStatus, Location, Scope, Stop, StopId, TransitMode, Vehicle, VehicleId};
use visit_router::traits::{ChunkLimits, EntityProvider, GeoDistanceProvider, MatrixFragment, PersistenceSink};

/// Manhattan distance on (lat, lng) treated as a plain grid; one unit is one
/// minute of travel.
pub fn grid_seconds(from: &Location, to: &Location) -> f64 {
    ((from.lat - to.lat).abs() + (from.lng - to.lng).abs()) * 60.0
}

/// Grid distance provider with knobs for chunking, delays and failures.
#[derive(Debug)]
pub struct GridProvider {
    limits: ChunkLimits,
    calls: AtomicUsize,
    elements: AtomicUsize,
    largest_call: AtomicUsize,
    max_delay_ms: u64,
    poison: Option<String>,
    short_rows: bool,
    cancel_on_call: Option<CancellationToken>,
}

impl Default for GridProvider {
    fn default() -> Self {
        Self {
            limits: ChunkLimits::unbounded(),
            calls: AtomicUsize::new(0),
            elements: AtomicUsize::new(0),
            largest_call: AtomicUsize::new(0),
            max_delay_ms: 0,
            poison: None,
            short_rows: false,
            cancel_on_call: None,
        }
    }
}

impl GridProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: ChunkLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sleep up to `max_delay_ms` per call, varying by request, so chunks
    /// complete out of order.
    pub fn with_jitter(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Fail every call that touches the location with this id.
    pub fn failing_on(mut self, location_id: &str) -> Self {
        self.poison = Some(location_id.to_string());
        self
    }

    /// Answer every call with one row too few.
    pub fn with_short_rows(mut self) -> Self {
        self.short_rows = true;
        self
    }

    /// Cancel `token` as soon as the first call arrives.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_call = Some(token);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Origin × destination pairs requested so far.
    pub fn elements(&self) -> usize {
        self.elements.load(Ordering::SeqCst)
    }

    /// Most origin × destination pairs requested in a single call.
    pub fn largest_call(&self) -> usize {
        self.largest_call.load(Ordering::SeqCst)
    }

    fn delay_for(&self, origins: &[Location], destinations: &[Location]) -> Duration {
        if self.max_delay_ms == 0 {
            return Duration::ZERO;
        }
        let seed: u64 = origins
            .iter()
            .chain(destinations)
            .map(|location| (location.lat * 13.0 + location.lng * 7.0).abs() as u64)
            .sum();
        Duration::from_millis(seed.wrapping_mul(7919) % self.max_delay_ms)
    }
}

impl GeoDistanceProvider for GridProvider {
    fn distances(
        &self,
        origins: &[Location],
        destinations: &[Location],
        _mode: TransitMode,
    ) -> Result<MatrixFragment, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pairs = origins.len() * destinations.len();
        self.elements.fetch_add(pairs, Ordering::SeqCst);
        self.largest_call.fetch_max(pairs, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        thread::sleep(self.delay_for(origins, destinations));

        if let Some(poison) = &self.poison {
            if origins.iter().chain(destinations).any(|location| &location.id == poison) {
                return Err(ProviderError::Service {
                    code: "NoRoute".to_string(),
                    message: format!("no route touching {poison}"),
                });
            }
        }

        let mut fragment: MatrixFragment = origins
            .iter()
            .map(|from| destinations.iter().map(|to| Some(grid_seconds(from, to))).collect())
            .collect();
        if self.short_rows {
            fragment.pop();
        }
        Ok(fragment)
    }

    fn limits(&self) -> ChunkLimits {
        self.limits
    }
}

/// Entity store backed by plain vectors.
///
/// A vehicle scope narrows the vehicles to that one worker; a team scope
/// returns all of them. Stops are returned for every scope.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntities {
    pub vehicles: Vec<Vehicle>,
    pub stops: Vec<Stop>,
    pub offline: bool,
}

impl InMemoryEntities {
    pub fn new(vehicles: Vec<Vehicle>, stops: Vec<Stop>) -> Self {
        Self {
            vehicles,
            stops,
            offline: false,
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), EntityError> {
        if self.offline {
            return Err(EntityError::new("entity store offline"));
        }
        Ok(())
    }
}

impl EntityProvider for InMemoryEntities {
    fn vehicles_for(&self, scope: &Scope, _date: NaiveDate) -> Result<Vec<Vehicle>, EntityError> {
        self.check()?;
        Ok(match scope {
            Scope::Vehicle(id) => self.vehicles.iter().filter(|v| v.id == *id).cloned().collect(),
            Scope::Team(_) => self.vehicles.clone(),
        })
    }

    fn stops_for(&self, _scope: &Scope, _date: NaiveDate) -> Result<Vec<Stop>, EntityError> {
        self.check()?;
        Ok(self.stops.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentWrite {
    pub stop_id: StopId,
    pub vehicle_id: VehicleId,
    pub order: usize,
    pub status: AssignmentStatus,
}

/// Records successful writes; refuses writes for selected stops.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub writes: Vec<AssignmentWrite>,
    pub attempts: usize,
    refuse: BTreeSet<StopId>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(mut self, stop_id: StopId) -> Self {
        self.refuse.insert(stop_id);
        self
    }

    pub fn written_stops(&self) -> Vec<StopId> {
        self.writes.iter().map(|write| write.stop_id).collect()
    }
}

impl PersistenceSink for RecordingSink {
    fn write_assignment(
        &mut self,
        stop_id: StopId,
        vehicle_id: VehicleId,
        order: usize,
        status: AssignmentStatus,
    ) -> Result<(), SinkError> {
        self.attempts += 1;
        if self.refuse.contains(&stop_id) {
            return Err(SinkError::new(format!("{stop_id} is locked")));
        }
        self.writes.push(AssignmentWrite {
            stop_id,
            vehicle_id,
            order,
            status,
        });
        Ok(())
    }
}

pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}
