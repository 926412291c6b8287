//! Per-voice envelope state machine.
//!
//! Every sounding voice walks `Attacking -> Sustaining -> Releasing ->
//! Cleanup`. The machine owns the fade-then-stop ordering: a backend `stop`
//! is only issued from `Cleanup`, which is reachable only after the release
//! ramp's full duration (plus a margin) has elapsed.

use super::backend::{AudioBackend, SourceSpec, VoiceId};

/// Extra time granted after a release ramp before the source is stopped,
/// so the ramp is guaranteed inaudible when the voice is cut.
pub const STOP_MARGIN_SECS: f64 = 0.05;

/// Attack/release durations for a voice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub attack_secs: f64,
    pub release_secs: f64,
}

/// Lifecycle of a sounding voice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VoicePhase {
    /// Gain ramping up from (near-)zero.
    Attacking { until: f64 },
    /// Holding at peak gain.
    Sustaining,
    /// Gain ramping down to zero.
    Releasing { until: f64 },
    /// Ramp complete; backend stop due at the stored time.
    Cleanup { at: f64 },
}

/// One engine-side voice: bookkeeping for a backend source.
#[derive(Clone, Debug)]
pub struct Voice {
    pub id: VoiceId,
    pub spec: SourceSpec,
    /// Backend time the voice started; FIFO voice stealing keys off this.
    pub started_at: f64,
    pub peak_gain: f64,
    pub env: Envelope,
    /// One-shots release as soon as the attack completes.
    pub auto_release: bool,
    pub phase: VoicePhase,
}

impl Voice {
    /// Start a source with gain pre-set to zero, then ramp up. This ordering
    /// is the no-click invariant; there is no other way to construct a
    /// sounding `Voice`.
    pub fn start(
        backend: &mut dyn AudioBackend,
        id: VoiceId,
        spec: SourceSpec,
        peak_gain: f64,
        env: Envelope,
        auto_release: bool,
    ) -> Self {
        let now = backend.now();
        backend.start(id, spec, 0.0);
        backend.ramp_gain(id, peak_gain, env.attack_secs);

        Self {
            id,
            spec,
            started_at: now,
            peak_gain,
            env,
            auto_release,
            phase: VoicePhase::Attacking {
                until: now + env.attack_secs,
            },
        }
    }

    /// Begin the release ramp unless it is already underway.
    pub fn release(&mut self, backend: &mut dyn AudioBackend) {
        self.release_over(backend, self.env.release_secs);
    }

    /// Begin a release with an override duration (category gating uses a
    /// shorter ramp than the voice's own envelope).
    pub fn release_over(&mut self, backend: &mut dyn AudioBackend, duration_secs: f64) {
        match self.phase {
            VoicePhase::Releasing { .. } | VoicePhase::Cleanup { .. } => {}
            _ => {
                let now = backend.now();
                backend.ramp_gain(self.id, 0.0, duration_secs);
                self.phase = VoicePhase::Releasing {
                    until: now + duration_secs,
                };
            }
        }
    }

    /// Advance the state machine. Returns `true` once the voice is fully
    /// cleaned up and can be dropped.
    pub fn advance(&mut self, now: f64, backend: &mut dyn AudioBackend) -> bool {
        match self.phase {
            VoicePhase::Attacking { until } => {
                if now >= until {
                    if self.auto_release {
                        backend.ramp_gain(self.id, 0.0, self.env.release_secs);
                        self.phase = VoicePhase::Releasing {
                            until: now + self.env.release_secs,
                        };
                    } else {
                        self.phase = VoicePhase::Sustaining;
                    }
                }
                false
            }
            VoicePhase::Sustaining => false,
            VoicePhase::Releasing { until } => {
                if now >= until {
                    self.phase = VoicePhase::Cleanup {
                        at: until + STOP_MARGIN_SECS,
                    };
                }
                false
            }
            VoicePhase::Cleanup { at } => {
                if now >= at {
                    backend.stop(self.id);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Whether the voice is past its sounding life (releasing or later).
    pub fn is_winding_down(&self) -> bool {
        matches!(
            self.phase,
            VoicePhase::Releasing { .. } | VoicePhase::Cleanup { .. }
        )
    }
}

/// Advance a collection of voices, dropping the ones that finished.
pub fn advance_voices(voices: &mut Vec<Voice>, now: f64, backend: &mut dyn AudioBackend) {
    voices.retain_mut(|v| !v.advance(now, backend));
}
