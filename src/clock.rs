//! Time advancement and per-tick position computation.
//!
//! One tick: advance the clock by the host frame delta, recompute every
//! planet's position, then run crossing detection against those same-tick
//! positions. All three stages are chained so detection never sees stale
//! positions.

use bevy::prelude::*;

use crate::chimes::{ChimeEvent, OrbitalEventDetector, PeriapsisEvent, SimulationResetEvent};
use crate::types::{ActiveSystem, PositionStream, SimulatedSystem, SimulationClock};

/// Request to load a system into the simulation and start the clock.
#[derive(Message, Clone, Debug)]
pub struct LoadSystemEvent {
    pub system: SimulatedSystem,
}

/// Ordering for the per-tick simulation stages.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// Clock advancement and position recomputation.
    Tick,
    /// Crossing detection over this tick's positions.
    Detect,
}

/// Plugin providing clock advancement, position streaming and reset wiring.
pub struct ClockPlugin;

impl Plugin for ClockPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimulationClock>()
            .init_resource::<ActiveSystem>()
            .init_resource::<PositionStream>()
            .init_resource::<OrbitalEventDetector>()
            .add_message::<LoadSystemEvent>()
            .add_message::<SimulationResetEvent>()
            .add_message::<ChimeEvent>()
            .add_message::<PeriapsisEvent>()
            .configure_sets(Update, SimulationSet::Detect.after(SimulationSet::Tick))
            .add_systems(
                Update,
                (
                    handle_load_system,
                    handle_reset,
                    (advance_clock, update_positions).chain().in_set(SimulationSet::Tick),
                ),
            )
            .add_systems(Update, detect_orbital_events.in_set(SimulationSet::Detect));
    }
}

/// Swap in a newly selected system.
///
/// Clearing the detector here is a hard contract: a stale `last_angle` from
/// the previous system would register a spurious crossing on the first frame
/// of the new one.
fn handle_load_system(
    mut events: MessageReader<LoadSystemEvent>,
    mut active: ResMut<ActiveSystem>,
    mut clock: ResMut<SimulationClock>,
    mut positions: ResMut<PositionStream>,
    mut detector: ResMut<OrbitalEventDetector>,
) {
    for event in events.read() {
        info!(
            "Loading system: {} ({} planets)",
            event.system.host_star,
            event.system.planets.len()
        );

        detector.reset();
        positions.clear();
        active.load(event.system.clone());
        clock.start();
    }
}

/// Stop the clock and clear everything derived from it.
fn handle_reset(
    mut events: MessageReader<SimulationResetEvent>,
    mut clock: ResMut<SimulationClock>,
    mut positions: ResMut<PositionStream>,
    mut detector: ResMut<OrbitalEventDetector>,
) {
    if events.read().next().is_none() {
        return;
    }

    clock.reset();
    positions.clear();
    detector.reset();
    info!("Simulation reset");
}

/// Advance simulated time from the host frame delta. Paused and stopped
/// clocks are a hard suspension point: nothing downstream runs off stale time.
fn advance_clock(mut clock: ResMut<SimulationClock>, time: Res<Time>) {
    if clock.is_running() {
        let delta = time.delta_secs_f64();
        clock.advance(delta);
    }
}

/// Recompute the position of every planet for this tick.
fn update_positions(
    clock: Res<SimulationClock>,
    active: Res<ActiveSystem>,
    mut positions: ResMut<PositionStream>,
) {
    if !clock.is_running() {
        return;
    }

    for elements in &active.elements {
        positions.insert(elements.id.clone(), elements.position_at(clock.simulated_days));
    }
}

/// Run crossing detection against the positions computed this same tick.
fn detect_orbital_events(
    clock: Res<SimulationClock>,
    active: Res<ActiveSystem>,
    positions: Res<PositionStream>,
    time: Res<Time>,
    mut detector: ResMut<OrbitalEventDetector>,
    mut chimes: MessageWriter<ChimeEvent>,
    mut periapses: MessageWriter<PeriapsisEvent>,
) {
    if !clock.is_running() {
        return;
    }

    let now_ms = time.elapsed_secs_f64() * 1000.0;

    for elements in &active.elements {
        let Some(position) = positions.get(&elements.id) else {
            continue;
        };

        let crossings = detector.observe(
            &elements.id,
            position.true_anomaly,
            elements.eccentricity,
            now_ms,
        );

        if crossings.chime {
            chimes.write(ChimeEvent {
                planet_id: elements.id.clone(),
                period_days: elements.period_days,
            });
        }
        if crossings.periapsis {
            periapses.write(PeriapsisEvent {
                planet_id: elements.id.clone(),
                eccentricity: elements.eccentricity,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    #[test]
    fn test_active_system_load_derives_elements() {
        let mut active = ActiveSystem::default();
        active.load(fixtures::two_planet_system());

        assert_eq!(active.elements.len(), 2);
        assert_eq!(active.elements[0].id, active.system.as_ref().unwrap().planets[0].id);
    }

    #[test]
    fn test_positions_track_clock() {
        let mut active = ActiveSystem::default();
        active.load(fixtures::two_planet_system());

        let mut clock = SimulationClock::default();
        clock.start();
        clock.advance(2.5);

        let mut positions = PositionStream::default();
        for elements in &active.elements {
            positions.insert(elements.id.clone(), elements.position_at(clock.simulated_days));
        }

        assert_eq!(positions.len(), 2);
        for elements in &active.elements {
            let expected = elements.position_at(clock.simulated_days);
            assert_eq!(positions.get(&elements.id), Some(&expected));
        }
    }
}
