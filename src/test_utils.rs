//! Test utilities for the simulation and audio engine tests.
//!
//! Provides fixtures for simulated systems and a recording audio backend
//! that captures call order for structural assertions (ramp-before-stop,
//! FIFO stealing) without rendering any audio.

use crate::audio::backend::{AudioBackend, SourceSpec, VoiceId};
use crate::types::{SimulatedPlanet, SimulatedSystem};

/// One recorded backend call. `at` is the backend clock at call time.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    Start {
        id: VoiceId,
        gain: f64,
        at: f64,
    },
    RampGain {
        id: VoiceId,
        target: f64,
        duration: f64,
        at: f64,
    },
    SetFrequency {
        id: VoiceId,
        freq_hz: f64,
    },
    Stop {
        id: VoiceId,
        at: f64,
    },
    SetMaster {
        target: f64,
        duration: f64,
    },
}

/// Backend double with a manually driven clock and a call log.
#[derive(Default)]
pub struct RecordingBackend {
    now: f64,
    calls: Vec<BackendCall>,
    specs: Vec<SourceSpec>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the backend clock; tests drive time explicitly.
    pub fn set_now(&mut self, now: f64) {
        self.now = now;
    }

    /// Everything recorded so far, in call order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.clone()
    }

    /// Specs of started sources, in start order.
    pub fn started_specs(&self) -> Vec<SourceSpec> {
        self.specs.clone()
    }

    /// Whether `stop` was recorded for a voice.
    pub fn stopped(&self, id: VoiceId) -> bool {
        self.calls
            .iter()
            .any(|c| matches!(c, BackendCall::Stop { id: i, .. } if *i == id))
    }

    /// Check the no-click discipline for one voice: its stop call must come
    /// after a ramp-to-zero, delayed by at least that ramp's duration.
    pub fn assert_fade_then_stop(&self, id: VoiceId) {
        let stop_at = self
            .calls
            .iter()
            .find_map(|c| match c {
                BackendCall::Stop { id: i, at } if *i == id => Some(*at),
                _ => None,
            })
            .unwrap_or_else(|| panic!("voice {id} was never stopped"));

        let fade = self
            .calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::RampGain {
                    id: i,
                    target,
                    duration,
                    at,
                } if *i == id && *target == 0.0 => Some((*at, *duration)),
                _ => None,
            })
            .next_back()
            .unwrap_or_else(|| panic!("voice {id} was stopped without a ramp to zero"));

        let (fade_at, fade_duration) = fade;
        assert!(
            stop_at >= fade_at + fade_duration - 1e-9,
            "voice {id}: stop at {stop_at:.3}s but fade to zero (started {fade_at:.3}s, \
             {fade_duration:.3}s long) had not finished"
        );
    }
}

impl AudioBackend for RecordingBackend {
    fn now(&self) -> f64 {
        self.now
    }

    fn start(&mut self, id: VoiceId, spec: SourceSpec, gain: f64) {
        self.specs.push(spec);
        self.calls.push(BackendCall::Start {
            id,
            gain,
            at: self.now,
        });
    }

    fn ramp_gain(&mut self, id: VoiceId, target: f64, duration_secs: f64) {
        self.calls.push(BackendCall::RampGain {
            id,
            target,
            duration: duration_secs,
            at: self.now,
        });
    }

    fn set_frequency(&mut self, id: VoiceId, freq_hz: f64) {
        self.calls.push(BackendCall::SetFrequency { id, freq_hz });
    }

    fn stop(&mut self, id: VoiceId) {
        self.calls.push(BackendCall::Stop { id, at: self.now });
    }

    fn set_master_gain(&mut self, target: f64, duration_secs: f64) {
        self.calls.push(BackendCall::SetMaster {
            target,
            duration: duration_secs,
        });
    }
}

/// Fixtures for creating test systems.
pub mod fixtures {
    use super::*;

    pub fn planet(id: &str, period_days: f64, eccentricity: f64, radius_earth: f64) -> SimulatedPlanet {
        SimulatedPlanet {
            id: id.to_owned(),
            name: id.to_owned(),
            period_days,
            eccentricity,
            radius_earth,
            mass_earth: None,
            semi_major_axis_au: 0.05 * period_days.powf(2.0 / 3.0),
        }
    }

    /// A small two-planet system around a K dwarf.
    pub fn two_planet_system() -> SimulatedSystem {
        SimulatedSystem {
            host_star: "Test-1".into(),
            star_temperature_k: 4500.0,
            planets: vec![
                planet("test-1-b", 3.0, 0.0, 1.1),
                planet("test-1-c", 12.0, 0.3, 2.4),
            ],
        }
    }

    /// One eccentric planet with a 10-day period.
    pub fn single_eccentric_system() -> SimulatedSystem {
        SimulatedSystem {
            host_star: "Solo".into(),
            star_temperature_k: 5700.0,
            planets: vec![planet("solo-b", 10.0, 0.5, 1.0)],
        }
    }
}
