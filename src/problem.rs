//! Optimizer inputs assembled from vehicle and stop snapshots.
//!
//! Node layout is fixed: `[vehicle starts][stops][vehicle ends]`. The solver
//! and the solution applier both rely on this index arithmetic.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::InputError;
use crate::model::{Discipline, Location, Stop, StopId, TimeWindow, Vehicle, VehicleId};

/// What a node in the routing graph stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Start(usize),
    Stop(usize),
    End(usize),
}

/// A single optimization instance.
///
/// All per-node vectors share the location list's indexing. Start and end
/// nodes carry their vehicle's shift, skills and discipline, with zero demand
/// and zero penalty.
#[derive(Debug, Clone)]
pub struct Problem {
    pub vehicles: Vec<Vehicle>,
    pub stops: Vec<Stop>,
    pub locations: Vec<Location>,
    pub time_windows: Vec<TimeWindow>,
    pub capacities: Vec<u32>,
    pub demands: Vec<u32>,
    pub penalties: Vec<u64>,
    pub skills: Vec<BTreeSet<String>>,
    pub disciplines: Vec<Discipline>,
    pub starts: Vec<usize>,
    pub ends: Vec<usize>,
}

impl Problem {
    /// Lay out vehicles and stops as routing nodes.
    pub fn build(vehicles: Vec<Vehicle>, stops: Vec<Stop>) -> Result<Self, InputError> {
        if stops.is_empty() {
            return Err(InputError::NoStops);
        }
        if vehicles.is_empty() {
            return Err(InputError::NoVehicles);
        }

        let v = vehicles.len();
        let s = stops.len();
        let starts: Vec<usize> = (0..v).collect();
        let ends: Vec<usize> = (v + s..v + s + v).collect();

        let mut locations = Vec::with_capacity(2 * v + s);
        let mut time_windows = Vec::with_capacity(2 * v + s);
        let mut demands = Vec::with_capacity(2 * v + s);
        let mut penalties = Vec::with_capacity(2 * v + s);
        let mut skills = Vec::with_capacity(2 * v + s);
        let mut disciplines = Vec::with_capacity(2 * v + s);

        for vehicle in &vehicles {
            locations.push(vehicle.start.clone());
            time_windows.push(vehicle.shift);
            demands.push(0);
            penalties.push(0);
            skills.push(vehicle.skills.clone());
            disciplines.push(vehicle.discipline);
        }
        for stop in &stops {
            locations.push(stop.location.clone());
            time_windows.push(stop.window);
            demands.push(stop.weight());
            penalties.push(stop.priority.drop_penalty());
            skills.push(stop.skills.clone());
            disciplines.push(stop.discipline);
        }
        for vehicle in &vehicles {
            locations.push(vehicle.end.clone());
            time_windows.push(vehicle.shift);
            demands.push(0);
            penalties.push(0);
            skills.push(vehicle.skills.clone());
            disciplines.push(vehicle.discipline);
        }

        let capacities = vehicles.iter().map(|vehicle| vehicle.capacity).collect();

        debug!(vehicles = v, stops = s, nodes = locations.len(), "built problem model");

        Ok(Self {
            vehicles,
            stops,
            locations,
            time_windows,
            capacities,
            demands,
            penalties,
            skills,
            disciplines,
            starts,
            ends,
        })
    }

    pub fn num_vehicles(&self) -> usize {
        self.vehicles.len()
    }

    pub fn num_stops(&self) -> usize {
        self.stops.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.locations.len()
    }

    /// Node indices of all stops, in input order.
    pub fn stop_nodes(&self) -> std::ops::Range<usize> {
        self.num_vehicles()..self.num_vehicles() + self.num_stops()
    }

    pub fn stop_node(&self, stop_index: usize) -> usize {
        self.num_vehicles() + stop_index
    }

    pub fn kind(&self, node: usize) -> NodeKind {
        let v = self.num_vehicles();
        let s = self.num_stops();
        if node < v {
            NodeKind::Start(node)
        } else if node < v + s {
            NodeKind::Stop(node - v)
        } else {
            NodeKind::End(node - v - s)
        }
    }

    /// The stop a node stands for, if it is a stop node.
    pub fn stop_at(&self, node: usize) -> Option<&Stop> {
        match self.kind(node) {
            NodeKind::Stop(index) => self.stops.get(index),
            _ => None,
        }
    }

    pub fn vehicle_id(&self, vehicle: usize) -> Option<VehicleId> {
        self.vehicles.get(vehicle).map(|vehicle| vehicle.id)
    }

    pub fn stop_id(&self, stop_index: usize) -> Option<StopId> {
        self.stops.get(stop_index).map(|stop| stop.id)
    }

    /// Whether `vehicle` holds every skill `node` requires and matches its
    /// discipline (or the node accepts any discipline).
    pub fn is_compatible(&self, vehicle: usize, node: usize) -> bool {
        let start = self.starts[vehicle];
        let discipline_ok = self.disciplines[node] == Discipline::Any
            || self.disciplines[node] == self.disciplines[start];
        discipline_ok && self.skills[node].is_subset(&self.skills[start])
    }

    /// Vehicles allowed to serve the stop at `node`.
    pub fn compatible_vehicles(&self, node: usize) -> Vec<usize> {
        (0..self.num_vehicles())
            .filter(|&vehicle| self.is_compatible(vehicle, node))
            .collect()
    }
}
