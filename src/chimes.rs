//! Orbital event detection: reference-angle crossings and periapsis passages.
//!
//! The detector consumes the per-tick angle series of every simulated planet
//! and turns it into discrete, throttled events. The first observed frame for
//! a planet only seeds its baseline; events start on the second frame.

use bevy::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::f64::consts::PI;

/// Fixed orbit orientation whose crossing triggers a chime. The exact value
/// is arbitrary (it only sets where in the orbit the rhythm lands); it is a
/// constant, not a tunable.
pub const REFERENCE_ANGLE: f64 = 0.0;

/// Minimum wall-clock gap between two chimes of the same planet.
/// Bounds event rate independent of the simulation speed multiplier.
pub const MIN_CHIME_INTERVAL_MS: f64 = 200.0;

/// Periapsis fires on entry into [0, PERIAPSIS_WINDOW_RAD) rather than on an
/// exact angle match.
pub const PERIAPSIS_WINDOW_RAD: f64 = 0.1;

/// Orbits below this eccentricity never fire periapsis events; the passage
/// is visually and aurally meaningless for near-circular orbits.
pub const PERIAPSIS_MIN_ECCENTRICITY: f64 = 0.1;

/// A planet crossed the reference angle.
#[derive(Message, Clone, Debug)]
pub struct ChimeEvent {
    pub planet_id: String,
    pub period_days: f64,
}

/// A sufficiently eccentric planet passed periapsis.
#[derive(Message, Clone, Debug)]
pub struct PeriapsisEvent {
    pub planet_id: String,
    pub eccentricity: f64,
}

/// Request to clear all simulation-derived state (system swap or reset).
#[derive(Message, Clone, Copy, Debug, Default)]
pub struct SimulationResetEvent;

/// What one observation of a planet produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Crossings {
    pub chime: bool,
    pub periapsis: bool,
}

#[derive(Clone, Debug)]
struct PlanetTracker {
    last_angle: f64,
    last_chime_ms: Option<f64>,
    last_periapsis_ms: Option<f64>,
}

/// Per-planet crossing state. Created lazily on first observation; must be
/// cleared whenever the simulated system changes or the clock resets, or
/// stale `last_angle` values produce spurious crossings on the next frame.
#[derive(Resource, Default, Debug)]
pub struct OrbitalEventDetector {
    trackers: HashMap<String, PlanetTracker>,
}

impl OrbitalEventDetector {
    /// Feed one tick's angle for a planet; returns which events fired.
    ///
    /// `now_ms` is wall-clock milliseconds and must be monotonic.
    pub fn observe(
        &mut self,
        planet_id: &str,
        angle: f64,
        eccentricity: f64,
        now_ms: f64,
    ) -> Crossings {
        let tracker = match self.trackers.entry(planet_id.to_owned()) {
            // First frame establishes the baseline and never fires.
            Entry::Vacant(entry) => {
                entry.insert(PlanetTracker {
                    last_angle: angle,
                    last_chime_ms: None,
                    last_periapsis_ms: None,
                });
                return Crossings::default();
            }
            Entry::Occupied(entry) => entry.into_mut(),
        };

        let last = tracker.last_angle;
        tracker.last_angle = angle;

        let mut crossings = Crossings::default();

        if crossed_reference(last, angle)
            && throttle_elapsed(tracker.last_chime_ms, now_ms)
        {
            debug_assert!(tracker.last_chime_ms.is_none_or(|t| now_ms >= t));
            tracker.last_chime_ms = Some(now_ms);
            crossings.chime = true;
        }

        if eccentricity >= PERIAPSIS_MIN_ECCENTRICITY
            && entered_periapsis_window(last, angle)
            && throttle_elapsed(tracker.last_periapsis_ms, now_ms)
        {
            tracker.last_periapsis_ms = Some(now_ms);
            crossings.periapsis = true;
        }

        crossings
    }

    /// Forget all per-planet state. Called on system change and clock reset.
    pub fn reset(&mut self) {
        self.trackers.clear();
    }

    /// Number of planets currently tracked.
    pub fn tracked_planets(&self) -> usize {
        self.trackers.len()
    }
}

fn throttle_elapsed(last_ms: Option<f64>, now_ms: f64) -> bool {
    last_ms.is_none_or(|t| now_ms - t >= MIN_CHIME_INTERVAL_MS)
}

/// Did the angle sweep cross [`REFERENCE_ANGLE`] between two frames?
///
/// Angles are in [0, 2π) and advance forward, so a crossing of 0 shows up as
/// a wrap (current < last). A backward step smaller than a half turn is
/// solver jitter, not a wrap, and never counts as a crossing.
fn crossed_reference(last: f64, current: f64) -> bool {
    if last <= current {
        last < REFERENCE_ANGLE && REFERENCE_ANGLE <= current
    } else if last - current > PI {
        // Wrapped past 2π going forward
        last < REFERENCE_ANGLE || current >= REFERENCE_ANGLE
    } else {
        false
    }
}

fn entered_periapsis_window(last: f64, current: f64) -> bool {
    let in_window = |a: f64| (REFERENCE_ANGLE..REFERENCE_ANGLE + PERIAPSIS_WINDOW_RAD).contains(&a);
    in_window(current) && !in_window(last)
}
