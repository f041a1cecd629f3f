//! Haversine travel-time provider (fallback when no routing service is reachable).
//!
//! Uses great-circle distance at an assumed speed per transit mode.
//! Less accurate than a road network but always available.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::model::{Location, TransitMode};
use crate::traits::{ChunkLimits, GeoDistanceProvider, MatrixFragment};

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed average speeds in km/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Speeds {
    pub driving_kmh: f64,
    pub walking_kmh: f64,
    pub bicycling_kmh: f64,
    pub transit_kmh: f64,
}

impl Default for Speeds {
    fn default() -> Self {
        Self {
            driving_kmh: 40.0,
            walking_kmh: 5.0,
            bicycling_kmh: 15.0,
            transit_kmh: 25.0,
        }
    }
}

impl Speeds {
    pub fn for_mode(&self, mode: TransitMode) -> f64 {
        match mode {
            TransitMode::Driving => self.driving_kmh,
            TransitMode::Walking => self.walking_kmh,
            TransitMode::Bicycling => self.bicycling_kmh,
            TransitMode::Transit => self.transit_kmh,
        }
    }
}

/// Straight-line provider. Computes locally, so it accepts any request size.
#[derive(Debug, Clone, Default)]
pub struct HaversineProvider {
    pub speeds: Speeds,
}

impl HaversineProvider {
    pub fn new(speeds: Speeds) -> Self {
        Self { speeds }
    }

    /// Great-circle distance between two (lat, lng) points in kilometers.
    fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    /// A non-positive speed leaves every pair but identical points unroutable.
    fn seconds(&self, km: f64, mode: TransitMode) -> Option<f64> {
        let speed = self.speeds.for_mode(mode);
        if km == 0.0 {
            return Some(0.0);
        }
        if speed <= 0.0 || !speed.is_finite() {
            return None;
        }
        Some((km / speed * 3600.0).round())
    }
}

impl GeoDistanceProvider for HaversineProvider {
    fn distances(
        &self,
        origins: &[Location],
        destinations: &[Location],
        mode: TransitMode,
    ) -> Result<MatrixFragment, ProviderError> {
        Ok(origins
            .iter()
            .map(|from| {
                destinations
                    .iter()
                    .map(|to| self.seconds(Self::haversine_km(from.coords(), to.coords()), mode))
                    .collect()
            })
            .collect())
    }

    fn limits(&self) -> ChunkLimits {
        ChunkLimits::unbounded()
    }
}
