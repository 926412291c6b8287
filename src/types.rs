//! Core simulation types and constants for the orbital sonification engine.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::orbit::{OrbitalElements, OrbitalPosition};

/// Simulated days that pass per real-world second at 1x speed.
///
/// Chosen so a 10-day orbit completes in 10 seconds at default speed:
/// hot Jupiters stay watchable, compact systems like TRAPPIST-1 stay lively.
pub const BASE_DAYS_PER_REAL_SECOND: f64 = 1.0;

/// Lower bound for the speed multiplier.
pub const MIN_SPEED: f64 = 0.1;

/// Upper bound for the speed multiplier.
pub const MAX_SPEED: f64 = 100.0;

/// A planet as delivered by the system-grouping collaborator.
///
/// All values are assumed pre-validated upstream (`period_days > 0`,
/// `0 <= eccentricity < 1`, `semi_major_axis_au > 0`, `radius_earth > 0`).
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedPlanet {
    /// Catalog identifier, unique within a system (e.g. "trappist-1-e").
    pub id: String,
    /// Display name (e.g. "TRAPPIST-1 e").
    pub name: String,
    /// Orbital period in days.
    pub period_days: f64,
    /// Orbital eccentricity (0 = circular).
    pub eccentricity: f64,
    /// Planet radius in Earth radii.
    pub radius_earth: f64,
    /// Planet mass in Earth masses, when known.
    pub mass_earth: Option<f64>,
    /// Semi-major axis in AU.
    pub semi_major_axis_au: f64,
}

/// A planetary system selected for live simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedSystem {
    /// Host star name (e.g. "TRAPPIST-1").
    pub host_star: String,
    /// Stellar effective temperature in Kelvin.
    pub star_temperature_k: f64,
    /// Planets orbiting the host, in catalog order.
    pub planets: Vec<SimulatedPlanet>,
}

impl SimulatedSystem {
    /// Look up a planet by its trailing letter designation (e.g. "e").
    ///
    /// Falls back to the first planet when the letter is missing, so a stale
    /// deep link still opens something sensible. Returns `None` only for a
    /// system with no planets.
    pub fn highlight_planet(&self, letter: &str) -> Option<&SimulatedPlanet> {
        self.planets
            .iter()
            .find(|p| {
                p.name
                    .rsplit(' ')
                    .next()
                    .is_some_and(|suffix| suffix.eq_ignore_ascii_case(letter))
            })
            .or_else(|| self.planets.first())
    }
}

/// Clock lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockState {
    /// No system started yet, or the clock was reset.
    #[default]
    Stopped,
    /// Time advances on every tick.
    Running,
    /// Hard suspension: no time, no positions, no events.
    Paused,
}

/// Simulation clock resource owning simulated time and playback speed.
///
/// One instance per open simulation. All mutation goes through the control
/// methods; the tick system only ever calls [`SimulationClock::advance`].
#[derive(Resource, Clone, Debug)]
pub struct SimulationClock {
    /// Simulated time in days since the session started. Monotonic unless reset.
    pub simulated_days: f64,
    /// Speed multiplier, clamped to [`MIN_SPEED`]..=[`MAX_SPEED`].
    pub speed: f64,
    /// Current lifecycle state.
    pub state: ClockState,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            simulated_days: 0.0,
            speed: 1.0,
            state: ClockState::Stopped,
        }
    }
}

impl SimulationClock {
    /// Begin (or restart) running from zero simulated time.
    pub fn start(&mut self) {
        self.simulated_days = 0.0;
        self.state = ClockState::Running;
    }

    /// Suspend time advancement.
    pub fn pause(&mut self) {
        if self.state == ClockState::Running {
            self.state = ClockState::Paused;
        }
    }

    /// Resume from a paused state.
    pub fn resume(&mut self) {
        if self.state == ClockState::Paused {
            self.state = ClockState::Running;
        }
    }

    /// Set the speed multiplier, clamped to the configured bounds.
    /// Valid while running or paused.
    pub fn set_speed(&mut self, multiplier: f64) {
        self.speed = multiplier.clamp(MIN_SPEED, MAX_SPEED);
    }

    /// Stop the clock and clear simulated time.
    ///
    /// Dependent per-planet state (event trackers, positions, completion
    /// sets) is cleared by the reset event handlers, not here.
    pub fn reset(&mut self) {
        self.simulated_days = 0.0;
        self.state = ClockState::Stopped;
    }

    /// Whether ticks should advance time and produce positions/events.
    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// Advance simulated time by a real-world delta. No-op unless running.
    pub fn advance(&mut self, delta_real_secs: f64) {
        if self.is_running() {
            self.simulated_days += delta_real_secs * self.speed * BASE_DAYS_PER_REAL_SECOND;
        }
    }
}

/// The system currently loaded into the simulation, if any, plus the
/// immutable orbital elements derived from it at load time.
#[derive(Resource, Default)]
pub struct ActiveSystem {
    /// The loaded system.
    pub system: Option<SimulatedSystem>,
    /// One set of elements per planet, same order as `system.planets`.
    pub elements: Vec<OrbitalElements>,
}

impl ActiveSystem {
    /// Install a new system, deriving orbital elements for every planet.
    pub fn load(&mut self, system: SimulatedSystem) {
        self.elements = system
            .planets
            .iter()
            .map(|p| OrbitalElements::from_planet(p, 0.0))
            .collect();
        self.system = Some(system);
    }

    /// Drop the loaded system.
    pub fn clear(&mut self) {
        self.system = None;
        self.elements.clear();
    }
}

/// Per-tick positions of every simulated planet, keyed by planet id.
///
/// Recomputed each running tick; read-only to the renderer.
#[derive(Resource, Default, Debug)]
pub struct PositionStream {
    positions: HashMap<String, OrbitalPosition>,
}

impl PositionStream {
    /// Current position of a planet, if it is being simulated.
    pub fn get(&self, planet_id: &str) -> Option<&OrbitalPosition> {
        self.positions.get(planet_id)
    }

    /// Replace a planet's position for this tick.
    pub fn insert(&mut self, planet_id: String, position: OrbitalPosition) {
        self.positions.insert(planet_id, position);
    }

    /// Iterate over all (planet id, position) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OrbitalPosition)> {
        self.positions.iter()
    }

    /// Number of tracked planets.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True when no positions have been computed.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Clear all positions (system swap or reset).
    pub fn clear(&mut self) {
        self.positions.clear();
    }
}
