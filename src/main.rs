//! Sonorbit - Orbital Sonification Engine
//!
//! Desktop shell: builds the app, wires the host window to the audio
//! engine's visibility suspension, and loads a demo system.

use bevy::prelude::*;
use bevy::window::WindowFocused;

use sonorbit::audio::backend::{AudioBackend, CpalBackend};
use sonorbit::audio::{AudioEngine, AudioPlugin, ViewVisibilityEvent};
use sonorbit::catalog;
use sonorbit::clock::{ClockPlugin, LoadSystemEvent};
use sonorbit::settings::{SettingsPlugin, SettingsStore};

fn main() {
    // Explicit construction: the engine and settings are built here and
    // injected, so nothing below relies on hidden global state.
    let store = SettingsStore::default();
    let settings = store.load();

    let backend = match CpalBackend::start() {
        Ok(b) => Some(Box::new(b) as Box<dyn AudioBackend>),
        Err(e) => {
            warn!("audio unavailable, running silent: {e}");
            None
        }
    };

    App::new()
        .add_plugins(DefaultPlugins)
        // Insert resources before plugins that depend on them
        .insert_resource(store)
        .insert_resource(settings)
        .insert_resource(AudioEngine::with_backend(backend))
        // Add simulation plugins
        .add_plugins((ClockPlugin, SettingsPlugin, AudioPlugin))
        .add_systems(Startup, load_demo_system)
        .add_systems(Update, forward_window_focus)
        .run();
}

/// Load the default demo system on startup.
fn load_demo_system(mut loads: MessageWriter<LoadSystemEvent>) {
    loads.write(LoadSystemEvent {
        system: catalog::trappist_1(),
    });
}

/// Window focus is the desktop analog of tab visibility: fade the continuous
/// audio down while the window is in the background.
fn forward_window_focus(
    mut focus_events: MessageReader<WindowFocused>,
    mut visibility: MessageWriter<ViewVisibilityEvent>,
) {
    for event in focus_events.read() {
        visibility.write(ViewVisibilityEvent {
            visible: event.focused,
        });
    }
}
