//! Structural audio tests against the recording backend: the no-click
//! discipline, FIFO voice stealing, category gating and settings handling.
//!
//! Run with: cargo test --test audio_discipline

mod common;

use common::{BackendCall, SharedRecordingBackend};
use sonorbit::audio::{AudioEngine, UiSoundKind};
use sonorbit::settings::{AudioSettings, SonificationComplexity};
use sonorbit::types::ActiveSystem;

fn engine_with_backend() -> (AudioEngine, SharedRecordingBackend) {
    let backend = SharedRecordingBackend::new();
    let mut engine = AudioEngine::with_backend(Some(Box::new(backend.clone())));
    engine.apply_settings(&AudioSettings::default());
    (engine, backend)
}

/// Step the engine's timers forward in small increments.
fn run_for(engine: &mut AudioEngine, backend: &SharedRecordingBackend, from: f64, secs: f64) {
    let mut t = from;
    while t < from + secs {
        t += 0.05;
        backend.set_now(t);
        engine.tick();
    }
}

#[test]
fn test_engine_without_backend_is_a_no_op() {
    let mut engine = AudioEngine::disabled();
    engine.apply_settings(&AudioSettings::default());
    engine.on_system_loaded(&common::five_planet_system());

    // Nothing panics, nothing happens
    engine.chime("cap-b", 2.0);
    engine.periapsis("cap-c");
    engine.select_planet("cap-d");
    engine.hover_planet(Some("cap-e"));
    engine.hover_planet(None);
    engine.ui_sound(UiSoundKind::Click);
    engine.tick();

    assert!(!engine.is_initialized());
    assert_eq!(engine.live_one_shots(), 0);
    assert_eq!(engine.held_planet_voices(), 0);
}

#[test]
fn test_every_voice_starts_silent() {
    let (mut engine, backend) = engine_with_backend();
    engine.on_system_loaded(&common::five_planet_system());

    engine.chime("cap-b", 2.0);
    engine.select_planet("cap-c");
    engine.ui_sound(UiSoundKind::Toggle);
    run_for(&mut engine, &backend, 0.0, 5.0);

    backend.assert_all_starts_near_silent();
}

#[test]
fn test_one_shot_fades_before_stopping() {
    let (mut engine, backend) = engine_with_backend();
    engine.on_system_loaded(&common::five_planet_system());

    let pre = backend.started_ids().len();
    engine.chime("cap-b", 2.0);
    assert!(engine.live_one_shots() >= 1);
    let chime_id = backend.started_ids()[pre];

    // Long enough for attack + release + cleanup margin
    run_for(&mut engine, &backend, 0.0, 5.0);

    assert_eq!(engine.live_one_shots(), 0, "one-shots self-clean after release");
    backend.assert_fade_then_stop(chime_id);
}

#[test]
fn test_category_toggle_fades_then_stops_sustained_voices() {
    let (mut engine, backend) = engine_with_backend();
    engine.on_system_loaded(&common::five_planet_system());

    let pre = backend.started_ids().len();
    engine.select_planet("cap-b");
    assert_eq!(engine.held_planet_voices(), 1);
    // The sustained planet voice starts before the confirmation blip
    let voice_id = backend.started_ids()[pre];

    // Turn the sonification category off: the voice must ramp down first
    let mut muted = AudioSettings::default();
    muted.categories.sonification = false;
    backend.set_now(1.0);
    engine.apply_settings(&muted);

    run_for(&mut engine, &backend, 1.0, 2.0);

    assert_eq!(engine.held_planet_voices(), 0);
    backend.assert_fade_then_stop(voice_id);
}

#[test]
fn test_master_gain_is_always_ramped() {
    let (mut engine, backend) = engine_with_backend();

    let mut settings = AudioSettings::default();
    settings.master_volume = 0.4;
    engine.apply_settings(&settings);
    settings.enabled = false;
    engine.apply_settings(&settings);

    for call in backend.calls() {
        if let BackendCall::SetMaster { duration, .. } = call {
            assert!(duration > 0.0, "master gain must never be stepped");
        }
    }
}

#[test]
fn test_disabled_engine_mutes_and_blocks_playback() {
    let (mut engine, backend) = engine_with_backend();
    engine.on_system_loaded(&common::five_planet_system());

    let mut settings = AudioSettings::default();
    settings.enabled = false;
    engine.apply_settings(&settings);

    let calls_before = backend.calls().len();
    engine.chime("cap-b", 2.0);
    engine.ui_sound(UiSoundKind::Click);
    assert_eq!(
        backend.calls().len(),
        calls_before,
        "disabled engine must not touch the backend on playback calls"
    );
    assert!(
        backend
            .calls()
            .iter()
            .any(|c| matches!(c, BackendCall::SetMaster { target, .. } if *target == 0.0)),
        "disabling ramps the master gain to zero"
    );
}

#[test]
fn test_fifo_voice_stealing_on_fifth_hover() {
    let (mut engine, backend) = engine_with_backend();
    engine.on_system_loaded(&common::five_planet_system());

    // Hover four planets; each voice starts at a distinct backend time
    let pre = backend.started_ids().len();
    for (i, id) in ["cap-b", "cap-c", "cap-d", "cap-e"].into_iter().enumerate() {
        backend.set_now(i as f64);
        engine.hover_planet(Some(id));
    }
    assert_eq!(engine.held_planet_voices(), 4);
    let first_voice = backend.started_ids()[pre];

    // Fifth hover: the oldest-started voice is force-released first
    backend.set_now(10.0);
    engine.hover_planet(Some("cap-f"));
    assert_eq!(engine.held_planet_voices(), 4, "cap holds at four voices");

    assert!(
        backend.calls().iter().any(|c| matches!(
            c,
            BackendCall::RampGain { id, target, .. } if *id == first_voice && *target == 0.0
        )),
        "oldest voice must be released on overflow"
    );

    // And it is eventually stopped, clicklessly
    run_for(&mut engine, &backend, 10.0, 2.0);
    backend.assert_fade_then_stop(first_voice);
}

#[test]
fn test_unhover_releases_only_current_hover() {
    let (mut engine, backend) = engine_with_backend();
    engine.on_system_loaded(&common::five_planet_system());

    backend.set_now(0.0);
    engine.hover_planet(Some("cap-b"));
    backend.set_now(1.0);
    engine.hover_planet(Some("cap-c"));
    assert_eq!(engine.held_planet_voices(), 2);

    engine.hover_planet(None);
    assert_eq!(engine.held_planet_voices(), 1, "unhover releases the hovered voice");

    // A second unhover with nothing hovered is a no-op
    let calls = backend.calls().len();
    engine.hover_planet(None);
    assert_eq!(backend.calls().len(), calls);
}

#[test]
fn test_hovering_unknown_planet_is_harmless() {
    let (mut engine, backend) = engine_with_backend();
    engine.on_system_loaded(&common::five_planet_system());

    let calls = backend.calls().len();
    engine.hover_planet(Some("not-a-planet"));
    assert_eq!(backend.calls().len(), calls);
    assert_eq!(engine.held_planet_voices(), 0);
}

#[test]
fn test_orbit_completion_fires_once_per_session() {
    let (mut engine, _backend) = engine_with_backend();
    let mut active = ActiveSystem::default();
    active.load(common::single_eccentric_system()); // period 10 d
    engine.on_system_loaded(active.system.as_ref().unwrap());

    assert!(engine.note_orbit_completions(9.9, &active).is_empty());
    assert_eq!(engine.note_orbit_completions(10.1, &active), vec!["solo-b".to_string()]);
    assert!(
        engine.note_orbit_completions(25.0, &active).is_empty(),
        "completion is once per planet per session"
    );

    // A reset starts a new session
    engine.on_reset();
    assert_eq!(engine.note_orbit_completions(10.1, &active), vec!["solo-b".to_string()]);
}

#[test]
fn test_visibility_suspension_winds_layers_down_and_back() {
    let backend = SharedRecordingBackend::new();
    let mut engine = AudioEngine::with_backend(Some(Box::new(backend.clone())));

    // Rich complexity keeps the ambient bed running
    let mut settings = AudioSettings::default();
    settings.complexity = SonificationComplexity::Rich;
    engine.apply_settings(&settings);
    engine.on_system_loaded(&common::five_planet_system());

    let started_before_hide = backend.started_ids().len();
    assert!(started_before_hide > 0, "rich mode starts continuous sources");

    // Hide: continuous sources fade out and stop
    backend.set_now(5.0);
    engine.set_visible(false);
    run_for(&mut engine, &backend, 5.0, 2.0);
    for id in backend.started_ids() {
        assert!(backend.stopped(id), "voice {id} still sounding while hidden");
    }

    // Restore: sources come back
    engine.set_visible(true);
    assert!(
        backend.started_ids().len() > started_before_hide,
        "restoring visibility restarts continuous layers"
    );
}

#[test]
fn test_simple_complexity_runs_one_shots_only() {
    let backend = SharedRecordingBackend::new();
    let mut engine = AudioEngine::with_backend(Some(Box::new(backend.clone())));

    let mut settings = AudioSettings::default();
    settings.complexity = SonificationComplexity::Simple;
    engine.apply_settings(&settings);
    engine.on_system_loaded(&common::five_planet_system());

    assert_eq!(
        backend.started_ids().len(),
        0,
        "simple mode starts no continuous sources"
    );

    engine.hover_planet(Some("cap-b"));
    assert_eq!(engine.held_planet_voices(), 0, "planet voices are off in simple mode");

    engine.chime("cap-b", 2.0);
    assert!(engine.live_one_shots() >= 1, "chimes still fire in simple mode");
}

#[test]
fn test_reset_lets_one_shots_decay_but_stops_sustained_layers() {
    let (mut engine, backend) = engine_with_backend();
    engine.on_system_loaded(&common::five_planet_system());

    engine.select_planet("cap-b");
    engine.chime("cap-c", 5.0);
    let shots_before = engine.live_one_shots();
    assert!(shots_before > 0);

    backend.set_now(0.5);
    engine.on_reset();

    // One-shots keep decaying naturally after a reset
    assert_eq!(engine.live_one_shots(), shots_before);
    assert_eq!(engine.held_planet_voices(), 0);

    // Eventually everything started has been stopped, each after its fade
    run_for(&mut engine, &backend, 0.5, 6.0);
    for id in backend.started_ids() {
        backend.assert_fade_then_stop(id);
    }
    assert_eq!(engine.live_one_shots(), 0);
}
