//! Real Las Vegas / Henderson coordinates for realistic routing fixtures.
//!
//! Coordinates sourced from OpenStreetMap. Clinics serve as shift start and
//! end points; homes are visit sites spread over the metro area.

use visit_router::model::Location;

/// A named place with coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Place {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Place {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn location(&self) -> Location {
        Location::new(self.name, self.lat, self.lng)
    }
}

pub const CLINICS: &[Place] = &[
    Place::new("Strip Clinic", 36.1126, -115.1767),
    Place::new("Henderson Clinic", 36.0308, -115.0825),
    Place::new("North Clinic", 36.1450055, -115.0482587),
];

pub const HOMES: &[Place] = &[
    Place::new("Paradise Rd", 36.1177772, -115.1546882),
    Place::new("Koval Ln", 36.1004202, -115.1652380),
    Place::new("Flamingo Rd", 36.1162678, -115.1719679),
    Place::new("Sands Ave", 36.1218938, -115.1684071),
    Place::new("Tropicana Ave", 36.1023654, -115.1688720),
    Place::new("Las Vegas Blvd S", 36.0543044, -115.1714860),
    Place::new("Windmill Ln", 36.0366259, -115.1713361),
    Place::new("Sunset Rd", 36.0614, -115.0631),
    Place::new("Eastern Ave", 35.9916660, -115.1028343),
    Place::new("Stephanie St", 36.0335058, -114.9856162),
    Place::new("Boulder Hwy", 36.1072491, -115.0593482),
    Place::new("Nellis Blvd", 36.1013492, -115.0646473),
    Place::new("Charleston Blvd", 36.1294005, -115.1135106),
    Place::new("Sahara Ave", 36.1428945, -115.1573836),
    Place::new("Town Square", 36.0810469, -115.1472694),
    Place::new("Pecos Rd", 36.0861327, -115.1387345),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_in_vegas_area() {
        for place in CLINICS.iter().chain(HOMES) {
            assert!(place.lat > 35.9 && place.lat < 36.3, "{} lat out of range: {}", place.name, place.lat);
            assert!(place.lng > -115.4 && place.lng < -114.8, "{} lng out of range: {}", place.name, place.lng);
        }
    }
}
