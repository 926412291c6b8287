//! Preset notable systems for the live simulation.
//!
//! Values are rounded catalog figures; they only need to be good enough for
//! a faithful-feeling orbit dance and a pleasant chord.

use crate::types::{SimulatedPlanet, SimulatedSystem};

fn planet(
    id: &str,
    name: &str,
    period_days: f64,
    eccentricity: f64,
    radius_earth: f64,
    mass_earth: Option<f64>,
    semi_major_axis_au: f64,
) -> SimulatedPlanet {
    SimulatedPlanet {
        id: id.to_owned(),
        name: name.to_owned(),
        period_days,
        eccentricity,
        radius_earth,
        mass_earth,
        semi_major_axis_au,
    }
}

/// Seven temperate rocky planets around an ultra-cool M dwarf; the compact
/// resonant chain makes the densest chime rhythm in the catalog.
pub fn trappist_1() -> SimulatedSystem {
    SimulatedSystem {
        host_star: "TRAPPIST-1".into(),
        star_temperature_k: 2559.0,
        planets: vec![
            planet("trappist-1-b", "TRAPPIST-1 b", 1.51, 0.006, 1.12, Some(1.37), 0.0115),
            planet("trappist-1-c", "TRAPPIST-1 c", 2.42, 0.007, 1.10, Some(1.31), 0.0158),
            planet("trappist-1-d", "TRAPPIST-1 d", 4.05, 0.008, 0.79, Some(0.39), 0.0223),
            planet("trappist-1-e", "TRAPPIST-1 e", 6.10, 0.005, 0.92, Some(0.69), 0.0293),
            planet("trappist-1-f", "TRAPPIST-1 f", 9.21, 0.010, 1.05, Some(1.04), 0.0385),
            planet("trappist-1-g", "TRAPPIST-1 g", 12.35, 0.002, 1.13, Some(1.32), 0.0468),
            planet("trappist-1-h", "TRAPPIST-1 h", 18.77, 0.006, 0.76, Some(0.33), 0.0619),
        ],
    }
}

/// Eight planets around a G star; the widest period spread, so the chord
/// spans most of the scale.
pub fn kepler_90() -> SimulatedSystem {
    SimulatedSystem {
        host_star: "Kepler-90".into(),
        star_temperature_k: 6080.0,
        planets: vec![
            planet("kepler-90-b", "Kepler-90 b", 7.01, 0.0, 1.31, None, 0.074),
            planet("kepler-90-c", "Kepler-90 c", 8.72, 0.0, 1.19, None, 0.089),
            planet("kepler-90-i", "Kepler-90 i", 14.45, 0.0, 1.32, None, 0.107),
            planet("kepler-90-d", "Kepler-90 d", 59.74, 0.0, 2.88, None, 0.32),
            planet("kepler-90-e", "Kepler-90 e", 91.94, 0.0, 2.67, None, 0.42),
            planet("kepler-90-f", "Kepler-90 f", 124.91, 0.01, 2.89, None, 0.48),
            planet("kepler-90-g", "Kepler-90 g", 210.61, 0.049, 8.13, None, 0.71),
            planet("kepler-90-h", "Kepler-90 h", 331.60, 0.011, 11.32, None, 1.01),
        ],
    }
}

/// Five planets around a naked-eye K dwarf, including the eccentric outer
/// giant 55 Cnc d; good periapsis material.
pub fn cancri_55() -> SimulatedSystem {
    SimulatedSystem {
        host_star: "55 Cancri".into(),
        star_temperature_k: 5172.0,
        planets: vec![
            planet("55-cnc-e", "55 Cancri e", 0.74, 0.05, 1.88, Some(7.99), 0.0154),
            planet("55-cnc-b", "55 Cancri b", 14.65, 0.0048, 13.9, Some(263.0), 0.1134),
            planet("55-cnc-c", "55 Cancri c", 44.39, 0.03, 8.51, Some(54.3), 0.2373),
            planet("55-cnc-f", "55 Cancri f", 259.88, 0.08, 7.27, Some(44.8), 0.7708),
            planet("55-cnc-d", "55 Cancri d", 5574.2, 0.13, 13.0, Some(1232.0), 5.957),
        ],
    }
}

/// All bundled systems, default first.
pub fn all_systems() -> Vec<SimulatedSystem> {
    vec![trappist_1(), kepler_90(), cancri_55()]
}
