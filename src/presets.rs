//! Built-in frequency presets, grouped by entrainment mode
//!
//! Read-only catalog data consumed by `TonePlayer::play`. The engine itself
//! never looks at a `Preset`; callers pick one and hand its request to the
//! player.

use serde::Serialize;

use crate::audio::engine::ToneRequest;

/// Preset category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Binaural,
    Isochronic,
    Solfeggio,
    Schumann,
    Noise,
}

/// A playable frequency preset
#[derive(Debug, Clone, Serialize)]
pub struct Preset {
    /// Unique identifier
    pub id: &'static str,
    /// Display name
    pub label: &'static str,
    /// One-line description for selection UIs
    pub description: &'static str,
    /// Beat rate for entrainment presets, pitch for plain tones
    pub hz: f32,
    /// Explicit binaural carriers (both or neither)
    pub carrier_left: Option<f32>,
    pub carrier_right: Option<f32>,
    pub include_pink_noise: bool,
    pub is_isochronic: bool,
    pub category: Category,
}

impl Preset {
    /// Build the engine request for this preset.
    pub fn to_request(&self) -> ToneRequest {
        ToneRequest {
            frequency: self.hz,
            carrier_left: self.carrier_left,
            carrier_right: self.carrier_right,
            include_pink_noise: self.include_pink_noise,
            is_isochronic: self.is_isochronic,
            ..ToneRequest::default()
        }
    }
}

const fn preset(
    id: &'static str,
    label: &'static str,
    description: &'static str,
    hz: f32,
    category: Category,
) -> Preset {
    Preset {
        id,
        label,
        description,
        hz,
        carrier_left: None,
        carrier_right: None,
        include_pink_noise: false,
        is_isochronic: false,
        category,
    }
}

const fn iso_preset(
    id: &'static str,
    label: &'static str,
    description: &'static str,
    hz: f32,
) -> Preset {
    Preset {
        id,
        label,
        description,
        hz,
        carrier_left: None,
        carrier_right: None,
        include_pink_noise: false,
        is_isochronic: true,
        category: Category::Isochronic,
    }
}

const fn noise_preset(
    id: &'static str,
    label: &'static str,
    description: &'static str,
    hz: f32,
) -> Preset {
    Preset {
        id,
        label,
        description,
        hz,
        carrier_left: None,
        carrier_right: None,
        include_pink_noise: true,
        is_isochronic: false,
        category: Category::Noise,
    }
}

const ALL_PRESETS: &[Preset] = &[
    // Binaural beats: all below 40 Hz, carried on a 400 Hz stereo pair.
    preset(
        "delta_sleep",
        "Delta Sleep",
        "2.5 Hz delta-band beat for deep, dreamless sleep",
        2.5,
        Category::Binaural,
    ),
    preset(
        "theta_meditation",
        "Theta Meditation",
        "6 Hz theta-band beat for deep meditation and visualization",
        6.0,
        Category::Binaural,
    ),
    preset(
        "alpha_relaxation",
        "Alpha Relaxation",
        "10 Hz alpha-band beat for calm, relaxed focus",
        10.0,
        Category::Binaural,
    ),
    preset(
        "beta_focus",
        "Beta Focus",
        "18 Hz beta-band beat for alert concentration",
        18.0,
        Category::Binaural,
    ),
    preset(
        "gamma_awareness",
        "Gamma Awareness",
        "35 Hz gamma-band beat for peak awareness",
        35.0,
        Category::Binaural,
    ),
    // Isochronic pulses: audible carrier gated on and off at the beat rate.
    iso_preset(
        "iso_theta",
        "Isochronic Theta",
        "6 Hz pulsed tone, effective without headphones",
        6.0,
    ),
    iso_preset(
        "iso_alpha",
        "Isochronic Alpha",
        "10 Hz pulsed tone for relaxation with speakers",
        10.0,
    ),
    // Schumann resonance.
    preset(
        "schumann",
        "Schumann Resonance",
        "7.83 Hz, the Earth's primary electromagnetic resonance",
        7.83,
        Category::Schumann,
    ),
    // Solfeggio tones: plain carriers, the natural home of the fifth overlay.
    preset(
        "solfeggio_396",
        "396 Hz Liberation",
        "Releasing fear and guilt",
        396.0,
        Category::Solfeggio,
    ),
    preset(
        "solfeggio_417",
        "417 Hz Change",
        "Facilitating change and undoing situations",
        417.0,
        Category::Solfeggio,
    ),
    preset(
        "solfeggio_432",
        "432 Hz Harmony",
        "Alternative tuning associated with calm and balance",
        432.0,
        Category::Solfeggio,
    ),
    preset(
        "solfeggio_528",
        "528 Hz Transformation",
        "The \"love frequency\" of the Solfeggio scale",
        528.0,
        Category::Solfeggio,
    ),
    preset(
        "solfeggio_639",
        "639 Hz Connection",
        "Harmonizing relationships and communication",
        639.0,
        Category::Solfeggio,
    ),
    preset(
        "solfeggio_852",
        "852 Hz Intuition",
        "Awakening intuition and inner strength",
        852.0,
        Category::Solfeggio,
    ),
    // Noise beds: soft carrier under a looping pink-noise layer.
    noise_preset(
        "pink_calm",
        "Pink Calm",
        "432 Hz carrier under a bed of pink noise",
        432.0,
    ),
    noise_preset(
        "theta_rain",
        "Theta Rain",
        "6 Hz binaural beat layered with pink noise",
        6.0,
    ),
];

/// The full preset catalog.
pub fn catalog() -> &'static [Preset] {
    ALL_PRESETS
}

/// Look up a preset by id.
pub fn find(id: &str) -> Option<&'static Preset> {
    ALL_PRESETS.iter().find(|p| p.id == id)
}

/// All presets in a category, in catalog order.
pub fn by_category(category: Category) -> Vec<&'static Preset> {
    ALL_PRESETS.iter().filter(|p| p.category == category).collect()
}
