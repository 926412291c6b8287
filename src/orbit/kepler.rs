//! Kepler orbit solver using Newton's method for the Kepler equation.

use std::f64::consts::TAU;

use crate::types::SimulatedPlanet;

/// Below this eccentricity an orbit is treated as circular and the solver
/// is skipped entirely (`true anomaly = mean anomaly`).
pub const CIRCULAR_ECCENTRICITY: f64 = 1e-6;

/// Fixed Newton iteration count. Sufficient for e < 0.95; exoplanet catalog
/// entries rarely exceed e ~ 0.9.
const NEWTON_ITERATIONS: usize = 8;

/// Keplerian orbital elements for one simulated planet.
/// Immutable for the lifetime of a simulation session.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitalElements {
    /// Planet id this element set belongs to.
    pub id: String,
    /// Orbital period in days (> 0).
    pub period_days: f64,
    /// Semi-major axis in AU (> 0).
    pub semi_major_axis_au: f64,
    /// Eccentricity (0 <= e < 1).
    pub eccentricity: f64,
    /// Planet radius in Earth radii (> 0).
    pub radius_earth: f64,
    /// Planet mass in Earth masses, when known.
    pub mass_earth: Option<f64>,
    /// Epoch (days) at which the planet sits at periapsis.
    pub reference_epoch_days: f64,
}

/// Instantaneous position along an orbit, derived from elements + time.
/// Recomputed every tick; never persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitalPosition {
    /// True anomaly in radians, normalized to [0, 2π).
    pub true_anomaly: f64,
    /// Distance from the host star in AU.
    pub distance_au: f64,
    /// Orbital-plane x coordinate in AU (periapsis direction).
    pub x_au: f64,
    /// Orbital-plane y coordinate in AU.
    pub y_au: f64,
}

impl OrbitalElements {
    /// Derive elements from a catalog planet, placing periapsis passage at
    /// `reference_epoch_days`.
    ///
    /// Inputs are validated by the system-grouping collaborator; the solver
    /// itself never re-validates (hot path). Debug builds assert the
    /// preconditions so a degenerate orbit fails loudly instead of silently
    /// producing NaN positions.
    pub fn from_planet(planet: &SimulatedPlanet, reference_epoch_days: f64) -> Self {
        debug_assert!(planet.period_days > 0.0, "period must be positive");
        debug_assert!(
            (0.0..1.0).contains(&planet.eccentricity),
            "eccentricity must be in [0, 1)"
        );
        debug_assert!(planet.semi_major_axis_au > 0.0, "semi-major axis must be positive");

        Self {
            id: planet.id.clone(),
            period_days: planet.period_days,
            semi_major_axis_au: planet.semi_major_axis_au,
            eccentricity: planet.eccentricity,
            radius_earth: planet.radius_earth,
            mass_earth: planet.mass_earth,
            reference_epoch_days,
        }
    }

    /// Mean anomaly at `time_days`, normalized to [0, 2π).
    pub fn mean_anomaly(&self, time_days: f64) -> f64 {
        let phase = (time_days - self.reference_epoch_days).rem_euclid(self.period_days);
        TAU * phase / self.period_days
    }

    /// Solve Kepler's equation M = E - e*sin(E) for eccentric anomaly E.
    ///
    /// Newton's method with a fixed iteration count. Initial guess: E = M for
    /// low eccentricity, π for high e (avoids the small-derivative region
    /// near E = 0 where Newton overshoots).
    pub fn solve_eccentric_anomaly(&self, mean_anomaly: f64) -> f64 {
        let m = mean_anomaly.rem_euclid(TAU);
        let e = self.eccentricity;

        let mut e_anomaly = if e < 0.8 { m } else { std::f64::consts::PI };

        for _ in 0..NEWTON_ITERATIONS {
            // f(E) = E - e*sin(E) - M, f'(E) = 1 - e*cos(E)
            let f = e_anomaly - e * e_anomaly.sin() - m;
            let f_prime = 1.0 - e * e_anomaly.cos();

            let delta = f / f_prime;
            e_anomaly -= delta;

            if delta.abs() < 1e-12 {
                break;
            }
        }

        e_anomaly
    }

    /// True anomaly from eccentric anomaly, normalized to [0, 2π).
    ///
    /// Uses atan2 for full quadrant coverage:
    /// ν = 2 * atan2(sqrt(1+e) * sin(E/2), sqrt(1-e) * cos(E/2))
    pub fn true_anomaly_from_eccentric(&self, eccentric_anomaly: f64) -> f64 {
        let e = self.eccentricity;
        let half_e = eccentric_anomaly / 2.0;

        let y = (1.0 + e).sqrt() * half_e.sin();
        let x = (1.0 - e).sqrt() * half_e.cos();
        (2.0 * y.atan2(x)).rem_euclid(TAU)
    }

    /// Orbital radius from eccentric anomaly, in AU: r = a * (1 - e*cos(E)).
    pub fn radius_au(&self, eccentric_anomaly: f64) -> f64 {
        self.semi_major_axis_au * (1.0 - self.eccentricity * eccentric_anomaly.cos())
    }

    /// Position along the orbit at the given simulated time.
    ///
    /// Near-circular orbits skip the solver: ν = M and r = a.
    pub fn position_at(&self, time_days: f64) -> OrbitalPosition {
        let m = self.mean_anomaly(time_days);

        let (true_anomaly, distance_au) = if self.eccentricity < CIRCULAR_ECCENTRICITY {
            (m, self.semi_major_axis_au)
        } else {
            let e_anomaly = self.solve_eccentric_anomaly(m);
            (
                self.true_anomaly_from_eccentric(e_anomaly),
                self.radius_au(e_anomaly),
            )
        };

        OrbitalPosition {
            true_anomaly,
            distance_au,
            x_au: distance_au * true_anomaly.cos(),
            y_au: distance_au * true_anomaly.sin(),
        }
    }
}
