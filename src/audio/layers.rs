//! The named sound layers: ambient bed, chord pad, texture bursts, planet
//! voices and one-shots.
//!
//! Every layer owns its voices and drives them through the state machine in
//! [`super::voice`]; no layer ever steps a gain or stops a live source
//! directly.

use super::backend::{AudioBackend, SourceSpec, VoiceId};
use super::rng::Rng;
use super::voice::{Envelope, Voice, advance_voices};
use crate::scale::{self, ConsonantInterval, NoteOptions};
use crate::types::SimulatedSystem;

/// Ramp used when a whole category (or the engine) toggles on/off.
pub const CATEGORY_RAMP_SECS: f64 = 0.1;

/// Concurrent planet-voice cap; the oldest voice is stolen beyond this.
pub const MAX_POLYPHONY: usize = 4;

const AMBIENT_LFO_PERIOD_SECS: f64 = 30.0;
const AMBIENT_FADE_SECS: f64 = 3.0;
const AMBIENT_LFO_UPDATE_SECS: f64 = 0.25;
const AMBIENT_RUMBLE_HZ: f64 = 55.0;
const AMBIENT_NOISE_CUTOFF_HZ: f64 = 180.0;
const AMBIENT_GAIN: f64 = 0.12;

const CHORD_FADE_OUT_SECS: f64 = 1.5;
const CHORD_SETTLE_SECS: f64 = 0.2;
const CHORD_FADE_IN_SECS: f64 = 2.5;
const CHORD_EVOLVE_MIN_SECS: f64 = 15.0;
const CHORD_EVOLVE_MAX_SECS: f64 = 25.0;
const CHORD_NOTE_GAIN: f64 = 0.08;
const CHORD_MIN_NOTES: usize = 3;
const CHORD_MAX_NOTES: usize = 5;

const TEXTURE_MIN_INTERVAL_SECS: f64 = 5.0;
const TEXTURE_MAX_INTERVAL_SECS: f64 = 15.0;
const TEXTURE_FADE_IN_SECS: f64 = 0.3;
const TEXTURE_FADE_OUT_SECS: f64 = 1.5;
const TEXTURE_HOLD_SECS: f64 = 0.8;
const TEXTURE_GAIN: f64 = 0.1;

const PLANET_VOICE_ATTACK_SECS: f64 = 0.2;
const PLANET_VOICE_RELEASE_SECS: f64 = 0.3;
const PLANET_VOICE_GAIN: f64 = 0.25;

/// Settings category a layer belongs to; gating is per category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerCategory {
    Ambient,
    Sonification,
    Ui,
}

/// The named layer kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Ambient,
    ChordPad,
    Texture,
    PlanetVoice,
    OneShot,
}

impl LayerKind {
    pub fn category(self) -> LayerCategory {
        match self {
            LayerKind::Ambient | LayerKind::Texture => LayerCategory::Ambient,
            LayerKind::ChordPad | LayerKind::PlanetVoice => LayerCategory::Sonification,
            // One-shots route per trigger; UI is the catch-all for the layer
            LayerKind::OneShot => LayerCategory::Ui,
        }
    }
}

/// Long-envelope bed: sub rumble + filtered noise, gain breathing on a slow
/// LFO instead of discrete triggers.
#[derive(Default)]
pub struct AmbientLayer {
    voices: Vec<Voice>,
    active: bool,
    next_lfo_update: f64,
}

impl AmbientLayer {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start the bed: sources begin at zero gain and fade in.
    pub fn activate(&mut self, now: f64, backend: &mut dyn AudioBackend, next_id: &mut VoiceId) {
        if self.active {
            return;
        }
        self.active = true;
        self.next_lfo_update = now + AMBIENT_LFO_UPDATE_SECS;

        let env = Envelope {
            attack_secs: AMBIENT_FADE_SECS,
            release_secs: AMBIENT_FADE_SECS,
        };
        for spec in [
            SourceSpec::Sine {
                freq_hz: AMBIENT_RUMBLE_HZ,
            },
            SourceSpec::FilteredNoise {
                cutoff_hz: AMBIENT_NOISE_CUTOFF_HZ,
            },
        ] {
            let id = alloc_id(next_id);
            self.voices
                .push(Voice::start(backend, id, spec, AMBIENT_GAIN, env, false));
        }
    }

    /// Fade the bed out; sources stop once their ramps finish.
    pub fn deactivate(&mut self, backend: &mut dyn AudioBackend, ramp_secs: f64) {
        if !self.active {
            return;
        }
        self.active = false;
        for voice in &mut self.voices {
            voice.release_over(backend, ramp_secs);
        }
    }

    pub fn update(&mut self, now: f64, backend: &mut dyn AudioBackend) {
        if self.active && now >= self.next_lfo_update {
            self.next_lfo_update = now + AMBIENT_LFO_UPDATE_SECS;

            // Slow breathing: 0.6..1.0 of base gain over tens of seconds
            let lfo = (std::f64::consts::TAU * now / AMBIENT_LFO_PERIOD_SECS).sin();
            let level = AMBIENT_GAIN * (0.8 + 0.2 * lfo);

            for voice in &mut self.voices {
                if !voice.is_winding_down() {
                    // Ramp spans the polling interval, so the gain curve is
                    // piecewise-linear, never stepped
                    backend.ramp_gain(voice.id, level, AMBIENT_LFO_UPDATE_SECS);
                }
            }
        }

        advance_voices(&mut self.voices, now, backend);
    }
}

/// Chord evolution sequence. The settle gap between releasing the old notes
/// and starting the new ones is what keeps attack/release pairs from
/// overlapping into runaway polyphony.
#[derive(Clone, Debug, Default, PartialEq)]
enum ChordState {
    #[default]
    Idle,
    Holding {
        evolve_at: f64,
    },
    FadingOut {
        until: f64,
    },
    Settling {
        until: f64,
        pending: Vec<f64>,
    },
}

/// Sustained chord derived from the most prominent bodies in the system.
#[derive(Default)]
pub struct ChordPadLayer {
    voices: Vec<Voice>,
    state: ChordState,
    /// Snapped note pool for the loaded system, largest planets first.
    note_pool: Vec<f64>,
    active: bool,
}

impl ChordPadLayer {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Derive the note pool for a newly loaded system: planets ordered by
    /// radius, periods mapped and snapped, plus the stellar root note.
    pub fn set_system(&mut self, system: &SimulatedSystem) {
        let mut planets: Vec<_> = system.planets.iter().collect();
        planets.sort_by(|a, b| {
            b.radius_earth
                .partial_cmp(&a.radius_earth)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let opts = NoteOptions::default();
        self.note_pool = planets
            .iter()
            .take(CHORD_MAX_NOTES)
            .map(|p| scale::clamp_sustained(scale::period_to_note(p.period_days, opts)))
            .collect();

        let root = scale::clamp_sustained(scale::star_temperature_to_note(
            system.star_temperature_k,
        ));
        if !self.note_pool.contains(&root) {
            self.note_pool.push(root);
        }
        self.note_pool.dedup_by(|a, b| (*a - *b).abs() < 0.5);
    }

    pub fn clear_system(&mut self) {
        self.note_pool.clear();
    }

    pub fn activate(
        &mut self,
        now: f64,
        backend: &mut dyn AudioBackend,
        next_id: &mut VoiceId,
        rng: &mut Rng,
    ) {
        if self.active || self.note_pool.is_empty() {
            return;
        }
        self.active = true;

        let chord = self.pick_chord(rng);
        self.start_notes(now, backend, next_id, &chord, rng);
    }

    pub fn deactivate(&mut self, backend: &mut dyn AudioBackend, ramp_secs: f64) {
        if !self.active {
            return;
        }
        self.active = false;
        self.state = ChordState::Idle;
        for voice in &mut self.voices {
            voice.release_over(backend, ramp_secs);
        }
    }

    pub fn update(
        &mut self,
        now: f64,
        backend: &mut dyn AudioBackend,
        next_id: &mut VoiceId,
        rng: &mut Rng,
    ) {
        if self.active {
            match self.state.clone() {
                ChordState::Idle => {}
                ChordState::Holding { evolve_at } => {
                    if now >= evolve_at {
                        // Strict sequence: fade out, release, settle, restart
                        for voice in &mut self.voices {
                            voice.release_over(backend, CHORD_FADE_OUT_SECS);
                        }
                        self.state = ChordState::FadingOut {
                            until: now + CHORD_FADE_OUT_SECS,
                        };
                    }
                }
                ChordState::FadingOut { until } => {
                    if now >= until {
                        let pending = self.pick_chord(rng);
                        self.state = ChordState::Settling {
                            until: now + CHORD_SETTLE_SECS,
                            pending,
                        };
                    }
                }
                ChordState::Settling { until, pending } => {
                    if now >= until {
                        self.start_notes(now, backend, next_id, &pending, rng);
                    }
                }
            }
        }

        advance_voices(&mut self.voices, now, backend);
    }

    /// 3-5 notes from the pool, with an occasional consonant-fifth
    /// substitution so repeated evolutions do not sound identical.
    fn pick_chord(&self, rng: &mut Rng) -> Vec<f64> {
        let pool = &self.note_pool;
        if pool.is_empty() {
            return Vec::new();
        }

        let span = CHORD_MAX_NOTES.min(pool.len());
        let count = CHORD_MIN_NOTES.min(span) + {
            let extra = span.saturating_sub(CHORD_MIN_NOTES);
            if extra > 0 {
                rng.next_int(extra as u32 + 1) as usize
            } else {
                0
            }
        };

        let mut chord: Vec<f64> = pool.iter().take(count).copied().collect();
        for note in &mut chord {
            if rng.next_f64() < 0.3 {
                *note = scale::clamp_sustained(scale::consonant_interval(
                    *note,
                    ConsonantInterval::Fifth,
                ));
            }
        }

        // Thin systems still get a full triad: stack fifth and octave-down
        while chord.len() < CHORD_MIN_NOTES {
            let base = chord[chord.len() - 1];
            let next = if chord.len() % 2 == 0 {
                base / 2.0
            } else {
                scale::clamp_sustained(scale::consonant_interval(base, ConsonantInterval::Fifth))
            };
            chord.push(next);
        }

        chord
    }

    fn start_notes(
        &mut self,
        now: f64,
        backend: &mut dyn AudioBackend,
        next_id: &mut VoiceId,
        chord: &[f64],
        rng: &mut Rng,
    ) {
        let env = Envelope {
            attack_secs: CHORD_FADE_IN_SECS,
            release_secs: CHORD_FADE_OUT_SECS,
        };
        for &freq_hz in chord {
            let id = alloc_id(next_id);
            self.voices.push(Voice::start(
                backend,
                id,
                SourceSpec::Sine { freq_hz },
                CHORD_NOTE_GAIN,
                env,
                false,
            ));
        }

        self.state = ChordState::Holding {
            evolve_at: now + rng.range_weighted(CHORD_EVOLVE_MIN_SECS, CHORD_EVOLVE_MAX_SECS),
        };
    }
}

/// Short filtered-noise bursts at randomized intervals; silent in between.
#[derive(Default)]
pub struct TextureLayer {
    voices: Vec<Voice>,
    active: bool,
    next_burst_at: f64,
    /// Pending release time for the currently sounding burst.
    release_at: Option<(VoiceId, f64)>,
}

impl TextureLayer {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self, now: f64, rng: &mut Rng) {
        if self.active {
            return;
        }
        self.active = true;
        self.next_burst_at = now + rng.range(TEXTURE_MIN_INTERVAL_SECS, TEXTURE_MAX_INTERVAL_SECS);
    }

    pub fn deactivate(&mut self, backend: &mut dyn AudioBackend, ramp_secs: f64) {
        if !self.active {
            return;
        }
        self.active = false;
        self.release_at = None;
        for voice in &mut self.voices {
            voice.release_over(backend, ramp_secs);
        }
    }

    pub fn update(
        &mut self,
        now: f64,
        backend: &mut dyn AudioBackend,
        next_id: &mut VoiceId,
        rng: &mut Rng,
    ) {
        if self.active {
            if now >= self.next_burst_at {
                self.next_burst_at =
                    now + rng.range(TEXTURE_MIN_INTERVAL_SECS, TEXTURE_MAX_INTERVAL_SECS);

                let id = alloc_id(next_id);
                let cutoff_hz = rng.range(400.0, 1600.0);
                self.voices.push(Voice::start(
                    backend,
                    id,
                    SourceSpec::FilteredNoise { cutoff_hz },
                    TEXTURE_GAIN,
                    Envelope {
                        attack_secs: TEXTURE_FADE_IN_SECS,
                        release_secs: TEXTURE_FADE_OUT_SECS,
                    },
                    false,
                ));
                self.release_at = Some((id, now + TEXTURE_FADE_IN_SECS + TEXTURE_HOLD_SECS));
            }

            if let Some((id, at)) = self.release_at
                && now >= at
            {
                if let Some(voice) = self.voices.iter_mut().find(|v| v.id == id) {
                    voice.release(backend);
                }
                self.release_at = None;
            }
        }

        advance_voices(&mut self.voices, now, backend);
    }
}

/// One sustained tone per hovered/selected planet, FIFO-stolen at the cap.
#[derive(Default)]
pub struct PlanetVoiceLayer {
    /// Active voices in start order (front = oldest).
    voices: Vec<(String, Voice)>,
    /// Stolen/released voices finishing their ramps.
    draining: Vec<Voice>,
    active: bool,
}

impl PlanetVoiceLayer {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool, backend: &mut dyn AudioBackend) {
        self.active = active;
        if !active {
            let voices = std::mem::take(&mut self.voices);
            for (_, mut voice) in voices {
                voice.release_over(backend, CATEGORY_RAMP_SECS);
                self.draining.push(voice);
            }
        }
    }

    /// Number of currently held (non-draining) voices.
    pub fn held(&self) -> usize {
        self.voices.len()
    }

    /// Start (or keep) the monophonic voice for a planet.
    pub fn voice_planet(
        &mut self,
        planet_id: &str,
        freq_hz: f64,
        backend: &mut dyn AudioBackend,
        next_id: &mut VoiceId,
    ) {
        if !self.active {
            return;
        }
        // Monophonic per planet: an existing voice is retuned, not doubled
        if let Some((_, voice)) = self.voices.iter_mut().find(|(id, _)| id == planet_id) {
            backend.set_frequency(voice.id, scale::clamp_sustained(freq_hz));
            return;
        }

        // FIFO steal: the oldest-started voice is force-released first
        if self.voices.len() >= MAX_POLYPHONY {
            let (_, mut oldest) = self.voices.remove(0);
            oldest.release_over(backend, PLANET_VOICE_RELEASE_SECS);
            self.draining.push(oldest);
        }

        let id = alloc_id(next_id);
        let voice = Voice::start(
            backend,
            id,
            SourceSpec::Sine {
                freq_hz: scale::clamp_sustained(freq_hz),
            },
            PLANET_VOICE_GAIN,
            Envelope {
                attack_secs: PLANET_VOICE_ATTACK_SECS,
                release_secs: PLANET_VOICE_RELEASE_SECS,
            },
            false,
        );
        self.voices.push((planet_id.to_owned(), voice));
    }

    /// Release a planet's voice, if sounding.
    pub fn release_planet(&mut self, planet_id: &str, backend: &mut dyn AudioBackend) {
        if let Some(pos) = self.voices.iter().position(|(id, _)| id == planet_id) {
            let (_, mut voice) = self.voices.remove(pos);
            voice.release(backend);
            self.draining.push(voice);
        }
    }

    /// Release everything (reset, suspension).
    pub fn release_all(&mut self, backend: &mut dyn AudioBackend) {
        let voices = std::mem::take(&mut self.voices);
        for (_, mut voice) in voices {
            voice.release(backend);
            self.draining.push(voice);
        }
    }

    /// Oldest held planet id, if any. Exposed for FIFO verification.
    pub fn oldest_planet(&self) -> Option<&str> {
        self.voices.first().map(|(id, _)| id.as_str())
    }

    pub fn update(&mut self, now: f64, backend: &mut dyn AudioBackend) {
        advance_voices(&mut self.draining, now, backend);
        // Held voices only ever attack/sustain here; releases move them to
        // `draining` first
        for (_, voice) in &mut self.voices {
            voice.advance(now, backend);
        }
    }
}

/// Transient percussive/chime voices; each self-cleans after its release.
#[derive(Default)]
pub struct OneShotLayer {
    voices: Vec<Voice>,
}

impl OneShotLayer {
    /// Fire a transient tone. `gain` is the peak of a full
    /// attack-then-release envelope.
    pub fn trigger(
        &mut self,
        freq_hz: f64,
        gain: f64,
        env: Envelope,
        backend: &mut dyn AudioBackend,
        next_id: &mut VoiceId,
    ) {
        let id = alloc_id(next_id);
        self.voices.push(Voice::start(
            backend,
            id,
            SourceSpec::Sine {
                freq_hz: freq_hz.min(scale::MAX_TRANSIENT_HZ),
            },
            gain,
            env,
            true,
        ));
    }

    /// Number of transient voices still decaying.
    pub fn live_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn update(&mut self, now: f64, backend: &mut dyn AudioBackend) {
        advance_voices(&mut self.voices, now, backend);
    }
}

fn alloc_id(next_id: &mut VoiceId) -> VoiceId {
    let id = *next_id;
    *next_id += 1;
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{BackendCall, RecordingBackend};

    fn drive(
        layer: &mut PlanetVoiceLayer,
        backend: &mut RecordingBackend,
        next_id: &mut VoiceId,
        planet: &str,
        freq: f64,
        at: f64,
    ) {
        backend.set_now(at);
        layer.voice_planet(planet, freq, backend, next_id);
    }

    #[test]
    fn test_planet_voice_fifo_stealing() {
        let mut layer = PlanetVoiceLayer::default();
        let mut backend = RecordingBackend::new();
        let mut next_id = 1;
        layer.set_active(true, &mut backend);

        for (i, planet) in ["b", "c", "d", "e"].into_iter().enumerate() {
            drive(&mut layer, &mut backend, &mut next_id, planet, 220.0, i as f64);
        }
        assert_eq!(layer.held(), MAX_POLYPHONY);
        assert_eq!(layer.oldest_planet(), Some("b"));

        // Fifth hover: the oldest-started voice ("b") is released first
        drive(&mut layer, &mut backend, &mut next_id, "f", 220.0, 10.0);
        assert_eq!(layer.held(), MAX_POLYPHONY);
        assert_eq!(layer.oldest_planet(), Some("c"));

        // Voice 1 belonged to "b"; its release ramp must be on record
        assert!(backend.calls().iter().any(|c| matches!(
            c,
            BackendCall::RampGain { id: 1, target, .. } if *target == 0.0
        )));
    }

    #[test]
    fn test_planet_voice_monophonic_per_planet() {
        let mut layer = PlanetVoiceLayer::default();
        let mut backend = RecordingBackend::new();
        let mut next_id = 1;
        layer.set_active(true, &mut backend);

        drive(&mut layer, &mut backend, &mut next_id, "b", 220.0, 0.0);
        drive(&mut layer, &mut backend, &mut next_id, "b", 330.0, 1.0);

        assert_eq!(layer.held(), 1, "hovering the same planet twice must not stack voices");
        assert!(backend
            .calls()
            .contains(&BackendCall::SetFrequency { id: 1, freq_hz: 330.0 }));
    }

    #[test]
    fn test_planet_voice_sustained_ceiling() {
        let mut layer = PlanetVoiceLayer::default();
        let mut backend = RecordingBackend::new();
        let mut next_id = 1;
        layer.set_active(true, &mut backend);

        drive(&mut layer, &mut backend, &mut next_id, "b", 880.0, 0.0);
        let started = backend.started_specs();
        match started[0] {
            SourceSpec::Sine { freq_hz } => assert!(freq_hz <= scale::MAX_SUSTAINED_HZ),
            _ => panic!("planet voice should be a sine"),
        }
    }

    #[test]
    fn test_texture_bursts_return_to_silence() {
        let mut layer = TextureLayer::default();
        let mut backend = RecordingBackend::new();
        let mut next_id = 1;
        let mut rng = Rng::new(9);

        layer.activate(0.0, &mut rng);

        // Walk 120 simulated seconds in 100 ms steps
        let mut t = 0.0;
        while t < 120.0 {
            backend.set_now(t);
            layer.update(t, &mut backend, &mut next_id, &mut rng);
            t += 0.1;
        }

        let starts = backend
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Start { .. }))
            .count();
        assert!(starts >= 4, "expected several bursts over 2 minutes, got {starts}");

        // Every started burst was eventually stopped (nothing left sounding)
        let stops = backend
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Stop { .. }))
            .count();
        assert!(stops >= starts - 1, "bursts must clean up: {starts} starts, {stops} stops");
    }

    #[test]
    fn test_chord_pad_evolution_sequence() {
        let mut layer = ChordPadLayer::default();
        let mut backend = RecordingBackend::new();
        let mut next_id = 1;
        let mut rng = Rng::new(3);

        layer.set_system(&crate::test_utils::fixtures::two_planet_system());
        layer.activate(0.0, &mut backend, &mut next_id, &mut rng);
        let first_chord_starts = backend.started_specs().len();
        assert!((CHORD_MIN_NOTES..=CHORD_MAX_NOTES).contains(&first_chord_starts));

        // Walk far enough to pass one evolution cycle
        let mut t = 0.0;
        while t < 40.0 {
            backend.set_now(t);
            layer.update(t, &mut backend, &mut next_id, &mut rng);
            t += 0.05;
        }

        let starts = backend.started_specs().len();
        assert!(
            starts > first_chord_starts,
            "chord should have evolved to new notes"
        );

        // The settle gap: every second-generation start comes after the
        // last fade-out ramp had its full duration
        let calls = backend.calls();
        let last_fade_out = calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::RampGain {
                    target, at, duration, ..
                } if *target == 0.0 && *duration == CHORD_FADE_OUT_SECS => Some(*at),
                _ => None,
            })
            .next();
        let second_gen_start = calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::Start { at, .. } => Some(*at),
                _ => None,
            })
            .nth(first_chord_starts);

        if let (Some(fade), Some(start)) = (last_fade_out, second_gen_start) {
            assert!(
                start >= fade + CHORD_FADE_OUT_SECS + CHORD_SETTLE_SECS - 1e-9,
                "new notes started {start:.2}s after fade-out at {fade:.2}s; settle gap violated"
            );
        } else {
            panic!("expected both a fade-out and a second-generation start");
        }
    }

    #[test]
    fn test_ambient_gain_is_always_ramped() {
        let mut layer = AmbientLayer::default();
        let mut backend = RecordingBackend::new();
        let mut next_id = 1;

        layer.activate(0.0, &mut backend, &mut next_id);

        let mut t = 0.0;
        while t < 10.0 {
            backend.set_now(t);
            layer.update(t, &mut backend);
            t += 0.1;
        }

        // Every gain change is a ramp with a nonzero duration
        for call in backend.calls() {
            if let BackendCall::RampGain { duration, .. } = call {
                assert!(duration > 0.0, "ambient layer stepped a gain");
            }
        }
    }
}
