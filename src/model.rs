//! Domain snapshots handed to the optimizer.
//!
//! Vehicles and stops are flat, read-only records pulled once per run from an
//! [`EntityProvider`](crate::traits::EntityProvider). Nothing here is mutated
//! by the optimization core.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Minutes of shift that make up one unit of vehicle capacity.
pub const MINUTES_PER_CAPACITY_UNIT: u32 = 32;

/// Added to a priority tier's rank before raising it to the fourth power.
pub const PRIORITY_OFFSET: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StopId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub u64);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vehicle-{}", self.0)
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stop-{}", self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team-{}", self.0)
    }
}

/// What a single optimization run covers: one worker, or every worker on a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Vehicle(VehicleId),
    Team(TeamId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Vehicle(id) => write!(f, "{id}"),
            Scope::Team(id) => write!(f, "{id}"),
        }
    }
}

/// Exclusivity key: at most one run may be in flight per scope and date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub scope: Scope,
    pub date: NaiveDate,
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.scope, self.date)
    }
}

/// A geocoded place. `id` is the provider-facing identifier (e.g. a plus code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lng,
        }
    }

    /// Coordinates as (lat, lng).
    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

/// Inclusive window in minutes from midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    earliest: u32,
    latest: u32,
}

impl TimeWindow {
    pub fn new(earliest: u32, latest: u32) -> Result<Self, InputError> {
        if latest < earliest {
            return Err(InputError::InvalidTimeWindow { earliest, latest });
        }
        Ok(Self { earliest, latest })
    }

    /// Build a window from wall-clock hours and minutes, e.g. `(8, 0)`..`(17, 0)`.
    pub fn from_hm(start: (u32, u32), end: (u32, u32)) -> Result<Self, InputError> {
        Self::new(start.0 * 60 + start.1, end.0 * 60 + end.1)
    }

    pub fn earliest(&self) -> u32 {
        self.earliest
    }

    pub fn latest(&self) -> u32 {
        self.latest
    }

    pub fn length(&self) -> u32 {
        self.latest - self.earliest
    }

    pub fn contains(&self, minute: u32) -> bool {
        (self.earliest..=self.latest).contains(&minute)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", clock(self.earliest), clock(self.latest))
    }
}

/// Render minutes from midnight as `HHMM`.
pub fn clock(minutes: u32) -> String {
    format!("{:02}{:02}", minutes / 60, minutes % 60)
}

/// Visit urgency. Higher tiers are costlier to leave unserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Green,
    Amber,
    Red,
}

impl Priority {
    pub const TIERS: [Priority; 3] = [Priority::Green, Priority::Amber, Priority::Red];

    pub fn rank(self) -> u64 {
        match self {
            Priority::Green => 0,
            Priority::Amber => 1,
            Priority::Red => 2,
        }
    }

    /// Cost of leaving a stop of this tier unserved: `(rank + offset)^4`.
    pub fn drop_penalty(self) -> u64 {
        (self.rank() + PRIORITY_OFFSET).pow(4)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Green => "green",
            Priority::Amber => "amber",
            Priority::Red => "red",
        };
        f.write_str(label)
    }
}

/// Visit complexity tier; doubles as capacity demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Routine,
    Complex,
}

impl Complexity {
    pub fn rank(self) -> u32 {
        match self {
            Complexity::Simple => 0,
            Complexity::Routine => 1,
            Complexity::Complex => 2,
        }
    }

    pub fn weight(self) -> u32 {
        self.rank() + 1
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Complexity::Simple => "simple",
            Complexity::Routine => "routine",
            Complexity::Complex => "complex",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    Any,
    Doctor,
    Nurse,
    PhysicalTherapist,
    OccupationalTherapist,
    MedicalAssistant,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Discipline::Any => "any",
            Discipline::Doctor => "doctor",
            Discipline::Nurse => "nurse",
            Discipline::PhysicalTherapist => "physical therapist",
            Discipline::OccupationalTherapist => "occupational therapist",
            Discipline::MedicalAssistant => "medical assistant",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
    Transit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Unscheduled,
    Assigned,
    NoShow,
    Cancelled,
}

/// Why a stop was left off every route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// No vehicle has the required skills and discipline.
    SkillMismatch,
    /// Compatible vehicles exist, but time, capacity or priority ruled it out.
    Infeasible,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::SkillMismatch => f.write_str("skill/discipline mismatch"),
            DropReason::Infeasible => f.write_str("infeasible"),
        }
    }
}

/// A worker on shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub name: String,
    pub start: Location,
    pub end: Location,
    pub shift: TimeWindow,
    pub capacity: u32,
    pub skills: BTreeSet<String>,
    pub discipline: Discipline,
}

impl Vehicle {
    /// Capacity is derived from the shift: one unit per 32 minutes.
    pub fn new(id: VehicleId, start: Location, end: Location, shift: TimeWindow) -> Self {
        Self {
            id,
            name: id.to_string(),
            start,
            end,
            capacity: capacity_for_shift(shift),
            shift,
            skills: BTreeSet::new(),
            discipline: Discipline::Any,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.insert(skill.into());
        self
    }

    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Whether this vehicle may serve `stop`: it holds every required skill and
    /// the stop either accepts any discipline or asks for this vehicle's one.
    pub fn can_serve(&self, stop: &Stop) -> bool {
        let discipline_ok =
            stop.discipline == Discipline::Any || stop.discipline == self.discipline;
        discipline_ok && stop.skills.is_subset(&self.skills)
    }
}

pub fn capacity_for_shift(shift: TimeWindow) -> u32 {
    shift.length() / MINUTES_PER_CAPACITY_UNIT
}

/// A visit to be placed on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    /// Display label, normally the patient's name.
    pub label: String,
    pub location: Location,
    pub address: String,
    pub window: TimeWindow,
    pub complexity: Complexity,
    pub priority: Priority,
    pub skills: BTreeSet<String>,
    pub discipline: Discipline,
    pub status: AssignmentStatus,
}

impl Stop {
    pub fn new(id: StopId, location: Location, window: TimeWindow) -> Self {
        Self {
            id,
            label: id.to_string(),
            address: location.id.clone(),
            location,
            window,
            complexity: Complexity::Routine,
            priority: Priority::Green,
            skills: BTreeSet::new(),
            discipline: Discipline::Any,
            status: AssignmentStatus::Unscheduled,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn requiring(mut self, skill: impl Into<String>) -> Self {
        self.skills.insert(skill.into());
        self
    }

    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Capacity demand.
    pub fn weight(&self) -> u32 {
        self.complexity.weight()
    }
}
