//! Property-based tests for orbital computations using proptest.
//!
//! These tests verify that the Kepler solver and position derivation maintain
//! expected properties across a wide range of inputs.

use proptest::prelude::*;
use std::f64::consts::TAU;

use super::kepler::OrbitalElements;

fn elements(period_days: f64, eccentricity: f64) -> OrbitalElements {
    OrbitalElements {
        id: "prop-planet".into(),
        period_days,
        semi_major_axis_au: 1.0,
        eccentricity,
        radius_earth: 1.0,
        mass_earth: None,
        reference_epoch_days: 0.0,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The solver converges for all valid eccentricities and mean anomalies:
    /// the returned E satisfies M = E - e*sin(E) after the fixed iteration count.
    #[test]
    fn prop_kepler_solver_convergence(
        mean_anomaly_normalized in 0.0f64..1.0,
        eccentricity in 0.0f64..0.95,
    ) {
        let mean_anomaly = mean_anomaly_normalized * TAU;
        let orbit = elements(100.0, eccentricity);

        let e_anom = orbit.solve_eccentric_anomaly(mean_anomaly);
        let m_check = e_anom - eccentricity * e_anom.sin();
        let error = (m_check - mean_anomaly).abs();

        prop_assert!(
            error < 1e-6,
            "Kepler solver failed: M={}, e={}, E={}, M_check={}, error={}",
            mean_anomaly, eccentricity, e_anom, m_check, error
        );
    }

    /// Orbital motion is exactly periodic: position_at(t) == position_at(t + P).
    #[test]
    fn prop_position_periodicity(
        time_days in 0.0f64..10_000.0,
        period_days in 0.5f64..2_000.0,
        eccentricity in 0.0f64..0.9,
    ) {
        let orbit = elements(period_days, eccentricity);

        let p1 = orbit.position_at(time_days);
        let p2 = orbit.position_at(time_days + period_days);

        prop_assert!((p1.x_au - p2.x_au).abs() < 1e-6);
        prop_assert!((p1.y_au - p2.y_au).abs() < 1e-6);
    }

    /// For e = 0 the circular fast path equals the general solver's output.
    #[test]
    fn prop_circular_shortcut_equivalence(
        time_normalized in 0.0f64..1.0,
    ) {
        let period = 40.0;
        let time = time_normalized * period;

        let circular = elements(period, 0.0);
        let pos = circular.position_at(time);

        // General solver at e = 0: E = M, ν = M, r = a
        let m = circular.mean_anomaly(time);
        let e_anom = circular.solve_eccentric_anomaly(m);
        let nu = circular.true_anomaly_from_eccentric(e_anom);

        prop_assert!((pos.true_anomaly - nu).abs() < 1e-9);
        prop_assert!((pos.distance_au - circular.radius_au(e_anom)).abs() < 1e-9);
    }

    /// Distance stays within the geometric bounds [a(1-e), a(1+e)].
    #[test]
    fn prop_distance_bounded_by_apsides(
        time_days in 0.0f64..5_000.0,
        eccentricity in 0.0f64..0.9,
    ) {
        let orbit = elements(100.0, eccentricity);
        let pos = orbit.position_at(time_days);

        let periapsis = orbit.semi_major_axis_au * (1.0 - eccentricity);
        let apoapsis = orbit.semi_major_axis_au * (1.0 + eccentricity);

        prop_assert!(pos.distance_au >= periapsis - 1e-9);
        prop_assert!(pos.distance_au <= apoapsis + 1e-9);
    }

    /// True anomaly is always normalized to [0, 2π).
    #[test]
    fn prop_true_anomaly_normalized(
        time_days in 0.0f64..5_000.0,
        eccentricity in 0.0f64..0.9,
    ) {
        let orbit = elements(73.0, eccentricity);
        let pos = orbit.position_at(time_days);

        prop_assert!((0.0..TAU).contains(&pos.true_anomaly));
    }
}
