//! Reactive audio engine: owns the sound layers and subscribes to clock,
//! detector and UI events.
//!
//! The engine is an explicitly constructed resource injected at app build
//! time; there is no global audio singleton. Without a backend (platform
//! init failed or deferred) every playback path is a logged no-op, so audio
//! failures never reach the simulation.

pub mod backend;
pub mod layers;
pub mod rng;
pub mod voice;

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

use crate::chimes::{ChimeEvent, PeriapsisEvent, SimulationResetEvent};
use crate::clock::{LoadSystemEvent, SimulationSet};
use crate::scale::{self, ConsonantInterval, NoteOptions};
use crate::settings::{AudioSettings, SonificationComplexity};
use crate::types::{ActiveSystem, SimulatedSystem, SimulationClock};

use backend::{AudioBackend, VoiceId};
use layers::{
    AmbientLayer, CATEGORY_RAMP_SECS, ChordPadLayer, LayerCategory, LayerKind, OneShotLayer,
    PlanetVoiceLayer, TextureLayer,
};
use rng::Rng;
use voice::Envelope;

/// Fade used when the whole engine winds down on reset/suspension.
const RESET_FADE_SECS: f64 = 0.4;

const CHIME_GAIN: f64 = 0.35;
const CHIME_ENV: Envelope = Envelope {
    attack_secs: 0.01,
    release_secs: 1.2,
};

const PERIAPSIS_GAIN: f64 = 0.22;
const PERIAPSIS_ENV: Envelope = Envelope {
    attack_secs: 0.02,
    release_secs: 0.8,
};

const ORBIT_COMPLETE_GAIN: f64 = 0.3;
const ORBIT_COMPLETE_ENV: Envelope = Envelope {
    attack_secs: 0.01,
    release_secs: 2.0,
};

const UI_GAIN: f64 = 0.18;
const UI_ENV: Envelope = Envelope {
    attack_secs: 0.005,
    release_secs: 0.12,
};

/// A planet finished its first full orbit this session.
#[derive(Message, Clone, Debug)]
pub struct OrbitCompleteEvent {
    pub planet_id: String,
}

/// UI selection of a planet.
#[derive(Message, Clone, Debug)]
pub struct SelectPlanetEvent {
    pub planet_id: String,
}

/// Hover (`Some`) or unhover (`None`).
#[derive(Message, Clone, Debug)]
pub struct HoverPlanetEvent {
    pub planet_id: Option<String>,
}

/// Discrete UI interactions that get a confirmation blip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiSoundKind {
    Click,
    Toggle,
    Pan,
    Zoom,
    ModalOpen,
    ModalClose,
}

impl UiSoundKind {
    fn freq_hz(self) -> f64 {
        match self {
            UiSoundKind::Click => 659.26,
            UiSoundKind::Toggle => 523.25,
            UiSoundKind::Pan => 329.63,
            UiSoundKind::Zoom => 392.00,
            UiSoundKind::ModalOpen => 587.33,
            UiSoundKind::ModalClose => 293.66,
        }
    }
}

/// Fire-and-forget UI sound request.
#[derive(Message, Clone, Copy, Debug)]
pub struct UiSoundEvent {
    pub kind: UiSoundKind,
}

/// Host view visibility changed (tab hidden / restored).
#[derive(Message, Clone, Copy, Debug)]
pub struct ViewVisibilityEvent {
    pub visible: bool,
}

/// The audio layer engine resource.
#[derive(Resource)]
pub struct AudioEngine {
    backend: Option<Box<dyn AudioBackend>>,
    next_voice: VoiceId,
    ambient: AmbientLayer,
    chord: ChordPadLayer,
    texture: TextureLayer,
    planet_voices: PlanetVoiceLayer,
    one_shots: OneShotLayer,
    /// Planets that already produced their once-per-session orbit-complete.
    completed: HashSet<String>,
    /// Period lookup for event-driven tones, rebuilt on system load.
    periods: HashMap<String, f64>,
    hovered: Option<String>,
    suspended: bool,
    settings: AudioSettings,
    rng: Rng,
}

impl AudioEngine {
    /// Build an engine over a backend, or a silent engine when `None`
    /// (platform audio unavailable or deferred).
    pub fn with_backend(backend: Option<Box<dyn AudioBackend>>) -> Self {
        if backend.is_none() {
            info!("audio backend unavailable; engine will stay silent");
        }
        Self {
            backend,
            next_voice: 1,
            ambient: AmbientLayer::default(),
            chord: ChordPadLayer::default(),
            texture: TextureLayer::default(),
            planet_voices: PlanetVoiceLayer::default(),
            one_shots: OneShotLayer::default(),
            completed: HashSet::new(),
            periods: HashMap::new(),
            hovered: None,
            suspended: false,
            settings: AudioSettings::default(),
            rng: Rng::new(0x5EED),
        }
    }

    /// A silent engine; used by tests and as the fallback wiring.
    pub fn disabled() -> Self {
        Self::with_backend(None)
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// Currently sounding planet voices (excludes draining ones).
    pub fn held_planet_voices(&self) -> usize {
        self.planet_voices.held()
    }

    /// Transient voices still decaying.
    pub fn live_one_shots(&self) -> usize {
        self.one_shots.live_voices()
    }

    /// Re-apply settings to every layer: master gain, category gating,
    /// complexity-driven layer activation.
    pub fn apply_settings(&mut self, settings: &AudioSettings) {
        self.settings = settings.clone();
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };

        let master = if settings.enabled {
            settings.master_volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        backend.set_master_gain(master, CATEGORY_RAMP_SECS);

        Self::sync_layers(
            backend,
            &self.settings,
            self.suspended,
            &mut self.ambient,
            &mut self.chord,
            &mut self.texture,
            &mut self.planet_voices,
            &mut self.next_voice,
            &mut self.rng,
        );
    }

    /// Start/stop continuous layers to match the gating state. Stops are
    /// fade-then-stop; starts are start-then-fade-in.
    #[allow(clippy::too_many_arguments)]
    fn sync_layers(
        backend: &mut dyn AudioBackend,
        settings: &AudioSettings,
        suspended: bool,
        ambient: &mut AmbientLayer,
        chord: &mut ChordPadLayer,
        texture: &mut TextureLayer,
        planet_voices: &mut PlanetVoiceLayer,
        next_voice: &mut VoiceId,
        rng: &mut Rng,
    ) {
        let now = backend.now();
        let on = |kind: LayerKind| -> bool {
            if !settings.enabled || suspended {
                return false;
            }
            let category_on = match kind.category() {
                LayerCategory::Ambient => settings.categories.ambient,
                LayerCategory::Sonification => settings.categories.sonification,
                LayerCategory::Ui => settings.categories.ui,
            };
            let complexity_on = match kind {
                LayerKind::Ambient | LayerKind::Texture => {
                    settings.complexity == SonificationComplexity::Rich
                }
                LayerKind::ChordPad | LayerKind::PlanetVoice => {
                    settings.complexity != SonificationComplexity::Simple
                }
                LayerKind::OneShot => true,
            };
            category_on && complexity_on
        };

        if on(LayerKind::Ambient) {
            ambient.activate(now, backend, next_voice);
        } else {
            ambient.deactivate(backend, CATEGORY_RAMP_SECS);
        }

        if on(LayerKind::Texture) {
            texture.activate(now, rng);
        } else {
            texture.deactivate(backend, CATEGORY_RAMP_SECS);
        }

        if on(LayerKind::ChordPad) {
            chord.activate(now, backend, next_voice, rng);
        } else {
            chord.deactivate(backend, CATEGORY_RAMP_SECS);
        }

        planet_voices.set_active(on(LayerKind::PlanetVoice), backend);
    }

    /// A new system was loaded: rebuild derived note material, clear the
    /// per-session completion set, restart continuous layers.
    pub fn on_system_loaded(&mut self, system: &SimulatedSystem) {
        self.completed.clear();
        self.hovered = None;
        self.periods = system
            .planets
            .iter()
            .map(|p| (p.id.clone(), p.period_days))
            .collect();
        self.chord.set_system(system);

        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        // Restart the pad over the new material
        self.chord.deactivate(backend, CATEGORY_RAMP_SECS);
        Self::sync_layers(
            backend,
            &self.settings,
            self.suspended,
            &mut self.ambient,
            &mut self.chord,
            &mut self.texture,
            &mut self.planet_voices,
            &mut self.next_voice,
            &mut self.rng,
        );
    }

    /// Simulation reset: wind continuous layers down with their fade
    /// discipline, drop future scheduling, let fired one-shots decay.
    pub fn on_reset(&mut self) {
        self.completed.clear();
        self.hovered = None;

        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        self.ambient.deactivate(backend, RESET_FADE_SECS);
        self.chord.deactivate(backend, RESET_FADE_SECS);
        self.texture.deactivate(backend, RESET_FADE_SECS);
        self.planet_voices.release_all(backend);
    }

    /// Track first-orbit completions; returns planets that completed just now.
    pub fn note_orbit_completions(
        &mut self,
        simulated_days: f64,
        active: &ActiveSystem,
    ) -> Vec<String> {
        let mut newly = Vec::new();
        for elements in &active.elements {
            if simulated_days >= elements.period_days && self.completed.insert(elements.id.clone())
            {
                newly.push(elements.id.clone());
            }
        }
        newly
    }

    fn note_options(&self) -> NoteOptions {
        NoteOptions {
            allow_high_octave: self.settings.complexity == SonificationComplexity::Rich,
            ..Default::default()
        }
    }

    fn sonification_on(&self) -> bool {
        self.settings.enabled && self.settings.categories.sonification && !self.suspended
    }

    fn ui_on(&self) -> bool {
        self.settings.enabled && self.settings.categories.ui && !self.suspended
    }

    /// Reference-angle chime for a planet.
    pub fn chime(&mut self, _planet_id: &str, period_days: f64) {
        if !self.sonification_on() {
            return;
        }
        let opts = self.note_options();
        let freq = scale::period_to_note(period_days, opts);
        let with_fifth = self.settings.complexity != SonificationComplexity::Simple
            && self.rng.next_f64() < 0.35;

        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        self.one_shots
            .trigger(freq, CHIME_GAIN, CHIME_ENV, backend, &mut self.next_voice);
        if with_fifth {
            let fifth = scale::consonant_interval(freq, ConsonantInterval::Fifth);
            self.one_shots.trigger(
                fifth,
                CHIME_GAIN * 0.5,
                CHIME_ENV,
                backend,
                &mut self.next_voice,
            );
        }
    }

    /// Periapsis passage: the planet's note an octave down, softer.
    pub fn periapsis(&mut self, planet_id: &str) {
        if !self.sonification_on() {
            return;
        }
        let period = self.periods.get(planet_id).copied();
        let opts = self.note_options();
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        let base = period.map_or(110.0, |p| scale::period_to_note(p, opts));
        self.one_shots.trigger(
            base / 2.0,
            PERIAPSIS_GAIN,
            PERIAPSIS_ENV,
            backend,
            &mut self.next_voice,
        );
    }

    /// First-orbit completion: note + octave dyad with a long tail.
    pub fn orbit_complete(&mut self, planet_id: &str) {
        if !self.sonification_on() {
            return;
        }
        let period = self.periods.get(planet_id).copied();
        let opts = self.note_options();
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        let base = period.map_or(220.0, |p| scale::period_to_note(p, opts));
        self.one_shots.trigger(
            base,
            ORBIT_COMPLETE_GAIN,
            ORBIT_COMPLETE_ENV,
            backend,
            &mut self.next_voice,
        );
        let octave = scale::consonant_interval(base, ConsonantInterval::Octave);
        self.one_shots.trigger(
            octave,
            ORBIT_COMPLETE_GAIN * 0.4,
            ORBIT_COMPLETE_ENV,
            backend,
            &mut self.next_voice,
        );
    }

    /// Selection: sustain the planet's voice and confirm with a short dyad.
    pub fn select_planet(&mut self, planet_id: &str) {
        if !self.sonification_on() {
            return;
        }
        let period = self.periods.get(planet_id).copied();
        let opts = self.note_options();
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        let Some(period) = period else {
            warn!("selected unknown planet {planet_id}");
            return;
        };

        let freq = scale::period_to_note(period, opts);
        self.planet_voices
            .voice_planet(planet_id, freq, backend, &mut self.next_voice);
        self.one_shots.trigger(
            scale::consonant_interval(freq, ConsonantInterval::Fifth),
            CHIME_GAIN * 0.6,
            UI_ENV,
            backend,
            &mut self.next_voice,
        );
    }

    /// Hover: sustain while hovered; unhover releases the current hover.
    /// Rapid hovering across planets accumulates voices until the polyphony
    /// cap steals the oldest.
    pub fn hover_planet(&mut self, planet_id: Option<&str>) {
        if !self.sonification_on() {
            return;
        }
        let opts = self.note_options();

        match planet_id {
            Some(id) => {
                let Some(period) = self.periods.get(id).copied() else {
                    warn!("hovered unknown planet {id}");
                    return;
                };
                let Some(backend) = self.backend.as_deref_mut() else {
                    return;
                };
                let freq = scale::period_to_note(period, opts);
                self.planet_voices
                    .voice_planet(id, freq, backend, &mut self.next_voice);
                self.hovered = Some(id.to_owned());
            }
            None => {
                let Some(prev) = self.hovered.take() else {
                    return;
                };
                let Some(backend) = self.backend.as_deref_mut() else {
                    return;
                };
                self.planet_voices.release_planet(&prev, backend);
            }
        }
    }

    /// UI interaction blip.
    pub fn ui_sound(&mut self, kind: UiSoundKind) {
        if !self.ui_on() {
            return;
        }
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        self.one_shots
            .trigger(kind.freq_hz(), UI_GAIN, UI_ENV, backend, &mut self.next_voice);
    }

    /// Tab hidden/restored: continuous sources wind down or come back,
    /// clicklessly either way.
    pub fn set_visible(&mut self, visible: bool) {
        let was_suspended = self.suspended;
        self.suspended = !visible;
        if was_suspended == self.suspended {
            return;
        }

        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        Self::sync_layers(
            backend,
            &self.settings,
            self.suspended,
            &mut self.ambient,
            &mut self.chord,
            &mut self.texture,
            &mut self.planet_voices,
            &mut self.next_voice,
            &mut self.rng,
        );
    }

    /// Advance every layer's state machines by the backend clock. Runs every
    /// frame, independent of the simulation clock, so fades complete during
    /// pause.
    pub fn tick(&mut self) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        let now = backend.now();

        self.ambient.update(now, backend);
        self.chord
            .update(now, backend, &mut self.next_voice, &mut self.rng);
        self.texture
            .update(now, backend, &mut self.next_voice, &mut self.rng);
        self.planet_voices.update(now, backend);
        self.one_shots.update(now, backend);
    }
}

/// Ordering for audio reactions: always after event detection.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioSet;

/// Plugin wiring the engine into the schedule.
///
/// The `AudioEngine` resource itself is inserted by the app builder
/// (explicit construction, injectable for tests); this plugin only registers
/// events and systems.
pub struct AudioPlugin;

impl Plugin for AudioPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<OrbitCompleteEvent>()
            .add_message::<SelectPlanetEvent>()
            .add_message::<HoverPlanetEvent>()
            .add_message::<UiSoundEvent>()
            .add_message::<ViewVisibilityEvent>()
            .configure_sets(Update, AudioSet.after(SimulationSet::Detect))
            .add_systems(
                Update,
                (
                    apply_settings_on_change,
                    handle_system_lifecycle,
                    track_orbit_completions,
                    handle_orbital_events,
                    handle_ui_events,
                    handle_visibility,
                    advance_audio,
                )
                    .chain()
                    .in_set(AudioSet),
            );
    }
}

/// Settings mutations re-apply to all layers immediately.
fn apply_settings_on_change(settings: Res<AudioSettings>, mut engine: ResMut<AudioEngine>) {
    if settings.is_changed() {
        engine.apply_settings(&settings);
    }
}

fn handle_system_lifecycle(
    mut loads: MessageReader<LoadSystemEvent>,
    mut resets: MessageReader<SimulationResetEvent>,
    mut engine: ResMut<AudioEngine>,
) {
    for event in loads.read() {
        engine.on_system_loaded(&event.system);
    }
    if resets.read().next().is_some() {
        engine.on_reset();
    }
}

/// Once-per-session orbit completions, keyed off elapsed-vs-period.
fn track_orbit_completions(
    clock: Res<SimulationClock>,
    active: Res<ActiveSystem>,
    mut engine: ResMut<AudioEngine>,
    mut completions: MessageWriter<OrbitCompleteEvent>,
) {
    if !clock.is_running() {
        return;
    }
    for planet_id in engine.note_orbit_completions(clock.simulated_days, &active) {
        completions.write(OrbitCompleteEvent { planet_id });
    }
}

fn handle_orbital_events(
    mut chimes: MessageReader<ChimeEvent>,
    mut periapses: MessageReader<PeriapsisEvent>,
    mut completions: MessageReader<OrbitCompleteEvent>,
    mut engine: ResMut<AudioEngine>,
) {
    for event in chimes.read() {
        engine.chime(&event.planet_id, event.period_days);
    }
    for event in periapses.read() {
        engine.periapsis(&event.planet_id);
    }
    for event in completions.read() {
        engine.orbit_complete(&event.planet_id);
    }
}

fn handle_ui_events(
    mut selections: MessageReader<SelectPlanetEvent>,
    mut hovers: MessageReader<HoverPlanetEvent>,
    mut ui_sounds: MessageReader<UiSoundEvent>,
    mut engine: ResMut<AudioEngine>,
) {
    for event in selections.read() {
        engine.select_planet(&event.planet_id);
    }
    for event in hovers.read() {
        engine.hover_planet(event.planet_id.as_deref());
    }
    for event in ui_sounds.read() {
        engine.ui_sound(event.kind);
    }
}

fn handle_visibility(
    mut events: MessageReader<ViewVisibilityEvent>,
    mut engine: ResMut<AudioEngine>,
) {
    for event in events.read() {
        engine.set_visible(event.visible);
    }
}

fn advance_audio(mut engine: ResMut<AudioEngine>) {
    engine.tick();
}
