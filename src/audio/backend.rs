//! Audio output abstraction and the cpal-based realtime backend.
//!
//! The engine core talks to [`AudioBackend`] only; the realtime
//! implementation runs a dedicated audio thread owning the output stream and
//! a small additive mixer, fed through a command channel. Tests substitute a
//! recording backend and assert on call order instead of rendered audio.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use bevy::prelude::*;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Handle for one sounding source in the backend.
pub type VoiceId = u64;

/// What a voice sounds like.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SourceSpec {
    /// Pure sine oscillator at a fixed frequency.
    Sine { freq_hz: f64 },
    /// White noise through a one-pole lowpass.
    FilteredNoise { cutoff_hz: f64 },
}

/// Platform audio abstraction.
///
/// Contract shared by all implementations: `start` is only called with a
/// (near-)zero gain, and `stop` is only called after a ramp to zero has had
/// at least its stated duration to complete. Implementations may therefore
/// cut a voice immediately on `stop` without producing a click.
pub trait AudioBackend: Send + Sync + 'static {
    /// Seconds since the backend started; the engine's scheduling clock.
    fn now(&self) -> f64;

    /// Begin sounding a source at the given gain.
    fn start(&mut self, id: VoiceId, spec: SourceSpec, gain: f64);

    /// Linearly ramp a voice's gain to `target` over `duration_secs`.
    fn ramp_gain(&mut self, id: VoiceId, target: f64, duration_secs: f64);

    /// Retune a running oscillator.
    fn set_frequency(&mut self, id: VoiceId, freq_hz: f64);

    /// Release the voice's resources.
    fn stop(&mut self, id: VoiceId);

    /// Ramp the master output gain (applied after per-voice gains).
    fn set_master_gain(&mut self, target: f64, duration_secs: f64);
}

/// Audio backend initialization failures. These are absorbed by the caller
/// (the engine stays silent), never propagated into the simulation.
#[derive(thiserror::Error, Debug)]
pub enum AudioBackendError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("failed to query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

enum MixerCommand {
    Start {
        id: VoiceId,
        spec: SourceSpec,
        gain: f64,
    },
    RampGain {
        id: VoiceId,
        target: f64,
        duration_secs: f64,
    },
    SetFrequency {
        id: VoiceId,
        freq_hz: f64,
    },
    Stop {
        id: VoiceId,
    },
    SetMaster {
        target: f64,
        duration_secs: f64,
    },
}

/// Realtime backend: command channel into a dedicated audio thread.
pub struct CpalBackend {
    commands: Sender<MixerCommand>,
    started: Instant,
}

impl CpalBackend {
    /// Open the default output device and start the mixer thread.
    pub fn start() -> Result<Self, AudioBackendError> {
        let (tx, rx) = mpsc::channel::<MixerCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioBackendError>>();

        thread::Builder::new()
            .name("sonorbit-audio".into())
            .spawn(move || {
                let host = cpal::default_host();
                let Some(device) = host.default_output_device() else {
                    let _ = ready_tx.send(Err(AudioBackendError::NoDevice));
                    return;
                };

                let config = match device.default_output_config() {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };

                let sample_rate = config.sample_rate().0 as f64;
                let channels = config.channels() as usize;
                let mixer = Arc::new(Mutex::new(Mixer::new(sample_rate)));
                let render_mixer = Arc::clone(&mixer);

                let stream = match device.build_output_stream(
                    &config.into(),
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut mixer = render_mixer.lock().unwrap();
                        mixer.render(data, channels);
                    },
                    |err| warn!("audio stream error: {err}"),
                    None,
                ) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Drain commands until the backend is dropped; the stream
                // lives exactly as long as this loop.
                while let Ok(cmd) = rx.recv() {
                    let mut mixer = mixer.lock().unwrap();
                    mixer.apply(cmd);
                }
                drop(stream);
            })
            .expect("failed to spawn audio thread");

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands: tx,
                started: Instant::now(),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AudioBackendError::NoDevice),
        }
    }

    fn send(&self, cmd: MixerCommand) {
        // A dead audio thread degrades to silence; never propagate.
        let _ = self.commands.send(cmd);
    }
}

impl AudioBackend for CpalBackend {
    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn start(&mut self, id: VoiceId, spec: SourceSpec, gain: f64) {
        self.send(MixerCommand::Start { id, spec, gain });
    }

    fn ramp_gain(&mut self, id: VoiceId, target: f64, duration_secs: f64) {
        self.send(MixerCommand::RampGain {
            id,
            target,
            duration_secs,
        });
    }

    fn set_frequency(&mut self, id: VoiceId, freq_hz: f64) {
        self.send(MixerCommand::SetFrequency { id, freq_hz });
    }

    fn stop(&mut self, id: VoiceId) {
        self.send(MixerCommand::Stop { id });
    }

    fn set_master_gain(&mut self, target: f64, duration_secs: f64) {
        self.send(MixerCommand::SetMaster {
            target,
            duration_secs,
        });
    }
}

/// Per-voice render state inside the mixer.
struct MixVoice {
    spec: SourceSpec,
    /// Oscillator phase in [0, 1).
    phase: f64,
    /// One-pole lowpass memory for noise voices.
    filter_state: f64,
    /// Noise generator state (xorshift32).
    noise_state: u32,
    gain: Ramped,
}

/// A linearly ramped parameter, stepped once per sample.
struct Ramped {
    current: f64,
    target: f64,
    step_per_sample: f64,
}

impl Ramped {
    fn new(value: f64) -> Self {
        Self {
            current: value,
            target: value,
            step_per_sample: 0.0,
        }
    }

    fn ramp_to(&mut self, target: f64, duration_secs: f64, sample_rate: f64) {
        self.target = target;
        let samples = (duration_secs * sample_rate).max(1.0);
        self.step_per_sample = (target - self.current) / samples;
    }

    fn advance(&mut self) -> f64 {
        if self.step_per_sample != 0.0 {
            self.current += self.step_per_sample;
            let overshot = (self.step_per_sample > 0.0 && self.current >= self.target)
                || (self.step_per_sample < 0.0 && self.current <= self.target);
            if overshot {
                self.current = self.target;
                self.step_per_sample = 0.0;
            }
        }
        self.current
    }
}

/// Tiny additive mixer: sines and filtered noise with ramped gains.
struct Mixer {
    sample_rate: f64,
    voices: Vec<(VoiceId, MixVoice)>,
    master: Ramped,
}

impl Mixer {
    fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            voices: Vec::new(),
            master: Ramped::new(0.0),
        }
    }

    fn apply(&mut self, cmd: MixerCommand) {
        match cmd {
            MixerCommand::Start { id, spec, gain } => {
                self.voices.push((
                    id,
                    MixVoice {
                        spec,
                        phase: 0.0,
                        filter_state: 0.0,
                        noise_state: 0x9e3779b9 ^ id as u32,
                        gain: Ramped::new(gain),
                    },
                ));
            }
            MixerCommand::RampGain {
                id,
                target,
                duration_secs,
            } => {
                if let Some((_, v)) = self.voices.iter_mut().find(|(vid, _)| *vid == id) {
                    v.gain.ramp_to(target, duration_secs, self.sample_rate);
                }
            }
            MixerCommand::SetFrequency { id, freq_hz } => {
                if let Some((_, v)) = self.voices.iter_mut().find(|(vid, _)| *vid == id) {
                    if let SourceSpec::Sine { .. } = v.spec {
                        v.spec = SourceSpec::Sine { freq_hz };
                    }
                }
            }
            MixerCommand::Stop { id } => {
                self.voices.retain(|(vid, _)| *vid != id);
            }
            MixerCommand::SetMaster {
                target,
                duration_secs,
            } => {
                self.master.ramp_to(target, duration_secs, self.sample_rate);
            }
        }
    }

    fn render(&mut self, data: &mut [f32], channels: usize) {
        for frame in data.chunks_mut(channels.max(1)) {
            let master = self.master.advance();
            let mut sample = 0.0f64;

            for (_, voice) in &mut self.voices {
                let gain = voice.gain.advance();
                sample += gain * voice.next_sample(self.sample_rate);
            }

            // Safety limiter: hard clip to ±0.5 to protect ears on bugs
            let out = (sample * master).clamp(-0.5, 0.5) as f32;
            for slot in frame.iter_mut() {
                *slot = out;
            }
        }
    }
}

impl MixVoice {
    fn next_sample(&mut self, sample_rate: f64) -> f64 {
        match self.spec {
            SourceSpec::Sine { freq_hz } => {
                self.phase = (self.phase + freq_hz / sample_rate).fract();
                (self.phase * std::f64::consts::TAU).sin()
            }
            SourceSpec::FilteredNoise { cutoff_hz } => {
                // xorshift32 white noise
                let mut x = self.noise_state;
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                self.noise_state = x;
                let white = (x as f64 / u32::MAX as f64) * 2.0 - 1.0;

                let alpha =
                    (std::f64::consts::TAU * cutoff_hz / sample_rate).clamp(0.0, 1.0);
                self.filter_state += alpha * (white - self.filter_state);
                self.filter_state
            }
        }
    }
}
