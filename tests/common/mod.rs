//! Common test utilities for integration tests.
//!
//! Each integration test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sonorbit::audio::backend::{AudioBackend, SourceSpec, VoiceId};
use sonorbit::types::{SimulatedPlanet, SimulatedSystem};

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

#[derive(Default)]
struct Inner {
    now: f64,
    calls: Vec<BackendCall>,
}

/// Call-recording backend with a shared handle, so a test keeps visibility
/// into the log after moving a clone into the engine.
#[derive(Clone, Default)]
pub struct SharedRecordingBackend(Arc<Mutex<Inner>>);

impl SharedRecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the backend clock; tests drive time explicitly.
    pub fn set_now(&self, now: f64) {
        self.0.lock().unwrap().now = now;
    }

    /// Everything recorded so far, in call order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.0.lock().unwrap().calls.clone()
    }

    /// Whether `stop` was recorded for a voice.
    pub fn stopped(&self, id: VoiceId) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, BackendCall::Stop { id: i, .. } if *i == id))
    }

    /// Ids of all started voices, in start order.
    pub fn started_ids(&self) -> Vec<VoiceId> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                BackendCall::Start { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Check the no-click discipline for one voice: the stop call comes after
    /// a ramp-to-zero, delayed by at least that ramp's duration.
    pub fn assert_fade_then_stop(&self, id: VoiceId) {
        let calls = self.calls();
        let stop_at = calls
            .iter()
            .find_map(|c| match c {
                BackendCall::Stop { id: i, at } if *i == id => Some(*at),
                _ => None,
            })
            .unwrap_or_else(|| panic!("voice {id} was never stopped"));

        let (fade_at, fade_duration) = calls
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

        assert!(
            stop_at >= fade_at + fade_duration - 1e-9,
            "voice {id}: stop at {stop_at:.3}s but fade to zero (started {fade_at:.3}s, \
             {fade_duration:.3}s long) had not finished"
        );
    }

    /// Check that every started voice began at (near-)zero gain.
    pub fn assert_all_starts_near_silent(&self) {
        for call in self.calls() {
            if let BackendCall::Start { id, gain, .. } = call {
                assert!(
                    gain.abs() < 1e-3,
                    "voice {id} started at audible gain {gain}"
                );
            }
        }
    }
}

impl AudioBackend for SharedRecordingBackend {
    fn now(&self) -> f64 {
        self.0.lock().unwrap().now
    }

    fn start(&mut self, id: VoiceId, _spec: SourceSpec, gain: f64) {
        let mut inner = self.0.lock().unwrap();
        let at = inner.now;
        inner.calls.push(BackendCall::Start { id, gain, at });
    }

    fn ramp_gain(&mut self, id: VoiceId, target: f64, duration_secs: f64) {
        let mut inner = self.0.lock().unwrap();
        let at = inner.now;
        inner.calls.push(BackendCall::RampGain {
            id,
            target,
            duration: duration_secs,
            at,
        });
    }

    fn set_frequency(&mut self, id: VoiceId, freq_hz: f64) {
        self.0
            .lock()
            .unwrap()
            .calls
            .push(BackendCall::SetFrequency { id, freq_hz });
    }

    fn stop(&mut self, id: VoiceId) {
        let mut inner = self.0.lock().unwrap();
        let at = inner.now;
        inner.calls.push(BackendCall::Stop { id, at });
    }

    fn set_master_gain(&mut self, target: f64, duration_secs: f64) {
        self.0.lock().unwrap().calls.push(BackendCall::SetMaster {
            target,
            duration: duration_secs,
        });
    }
}

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

/// A five-planet system, enough to exercise the polyphony cap.
pub fn five_planet_system() -> SimulatedSystem {
    SimulatedSystem {
        host_star: "Cap-Test".into(),
        star_temperature_k: 5000.0,
        planets: vec![
            planet("cap-b", 2.0, 0.0, 1.0),
            planet("cap-c", 5.0, 0.1, 1.3),
            planet("cap-d", 11.0, 0.2, 1.9),
            planet("cap-e", 24.0, 0.0, 0.8),
            planet("cap-f", 60.0, 0.4, 3.2),
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
