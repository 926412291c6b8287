//! Mapping of physical quantities to musically pleasant frequencies.
//!
//! Everything here is pure and deterministic: inputs are clamped internally,
//! outputs are snapped to a fixed pentatonic set so simultaneous tones from
//! unrelated planets never clash.

/// C-major pentatonic frequencies (Hz), C2 through A4.
/// Kept as an explicit table so the snap target set is auditable.
pub const PENTATONIC_HZ: [f64; 15] = [
    65.41,  // C2
    73.42,  // D2
    82.41,  // E2
    98.00,  // G2
    110.00, // A2
    130.81, // C3
    146.83, // D3
    164.81, // E3
    196.00, // G3
    220.00, // A3
    261.63, // C4
    293.66, // D4
    329.63, // E4
    392.00, // G4
    440.00, // A4
];

/// High-octave extension (C5..A5), used only when a caller opts in.
pub const PENTATONIC_HIGH_HZ: [f64; 5] = [
    523.25, // C5
    587.33, // D5
    659.26, // E5
    783.99, // G5
    880.00, // A5
];

/// Ceiling for transient tones (chimes, interval embellishments).
/// Comfort/hearing-safety constraint; do not raise.
pub const MAX_TRANSIENT_HZ: f64 = 800.0;

/// Ceiling for sustained tones (pads, planet voices).
/// Comfort/hearing-safety constraint; do not raise.
pub const MAX_SUSTAINED_HZ: f64 = 440.0;

/// Default period range (days) for the log-linear pitch mapping.
/// Covers ultra-short-period planets through cold outer giants.
pub const DEFAULT_MIN_PERIOD_DAYS: f64 = 0.5;
pub const DEFAULT_MAX_PERIOD_DAYS: f64 = 1000.0;

/// Options for [`period_to_note`].
#[derive(Clone, Copy, Debug)]
pub struct NoteOptions {
    /// Allow snapping into the C5..A5 extension.
    pub allow_high_octave: bool,
    /// Shortest period mapped (days); shorter periods clamp here.
    pub min_period_days: f64,
    /// Longest period mapped (days); longer periods clamp here.
    pub max_period_days: f64,
}

impl Default for NoteOptions {
    fn default() -> Self {
        Self {
            allow_high_octave: false,
            min_period_days: DEFAULT_MIN_PERIOD_DAYS,
            max_period_days: DEFAULT_MAX_PERIOD_DAYS,
        }
    }
}

/// Consonant interval relative to a base frequency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsonantInterval {
    /// Perfect fifth (x1.5).
    Fifth,
    /// Octave (x2).
    Octave,
}

/// Map an orbital period onto the pentatonic scale, inverted:
/// short period -> high note, long period -> low note.
///
/// The period is clamped into the configured range, mapped log-linearly onto
/// the scale's frequency span, then snapped to the nearest scale member.
pub fn period_to_note(period_days: f64, opts: NoteOptions) -> f64 {
    let min_p = opts.min_period_days.max(f64::MIN_POSITIVE);
    let max_p = opts.max_period_days.max(min_p * (1.0 + 1e-9));
    let p = period_days.clamp(min_p, max_p);

    // Normalized log position: 0 at min period, 1 at max period
    let t = (p.ln() - min_p.ln()) / (max_p.ln() - min_p.ln());

    let low = PENTATONIC_HZ[0];
    let high = if opts.allow_high_octave {
        PENTATONIC_HIGH_HZ[PENTATONIC_HIGH_HZ.len() - 1]
    } else {
        PENTATONIC_HZ[PENTATONIC_HZ.len() - 1]
    };

    // Inverted: t = 0 (shortest period) lands at the top of the range
    let continuous = (high.ln() + (low.ln() - high.ln()) * t).exp();

    snap_to_pentatonic(continuous, opts.allow_high_octave)
}

/// Snap a continuous frequency to the nearest pentatonic member.
/// Idempotent: snapping a snapped frequency returns it unchanged.
pub fn snap_to_pentatonic(freq_hz: f64, allow_high_octave: bool) -> f64 {
    let base = PENTATONIC_HZ.iter();
    let candidates: Vec<f64> = if allow_high_octave {
        base.chain(PENTATONIC_HIGH_HZ.iter()).copied().collect()
    } else {
        base.copied().collect()
    };

    let mut nearest = candidates[0];
    let mut best = (freq_hz - nearest).abs();
    for &c in &candidates[1..] {
        let d = (freq_hz - c).abs();
        if d < best {
            best = d;
            nearest = c;
        }
    }
    nearest
}

/// A consonant companion frequency, clamped to the transient ceiling.
pub fn consonant_interval(freq_hz: f64, interval: ConsonantInterval) -> f64 {
    let factor = match interval {
        ConsonantInterval::Fifth => 1.5,
        ConsonantInterval::Octave => 2.0,
    };
    (freq_hz * factor).min(MAX_TRANSIENT_HZ)
}

/// Clamp a frequency to the sustained-tone ceiling. Applied at every
/// sustained-voice creation site (pads, planet voices).
pub fn clamp_sustained(freq_hz: f64) -> f64 {
    freq_hz.min(MAX_SUSTAINED_HZ)
}

/// Map a stellar effective temperature to a scale note, by spectral band.
/// Cool M dwarfs sit low; hot A/B stars sit high.
pub fn star_temperature_to_note(temp_kelvin: f64) -> f64 {
    let t = temp_kelvin.clamp(2000.0, 40000.0);
    match t {
        t if t < 3700.0 => 110.00,  // M
        t if t < 5200.0 => 146.83,  // K
        t if t < 6000.0 => 196.00,  // G
        t if t < 7500.0 => 261.63,  // F
        t if t < 10000.0 => 329.63, // A
        _ => 440.00,                // B and O
    }
}
