//! Cached per-sound playback attributes.
//!
//! A sound's [`SoundAttributes`] are the source of truth for everything a
//! channel needs to know about it. Setters write here first; whenever a
//! channel becomes bound, [`SoundAttributes::iter`] yields every field so the
//! whole set can be pushed to the device in one pass.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Lowest pitch a channel accepts.
pub const MIN_PITCH: f32 = 0.000_001;

/// Highest pitch a channel accepts.
pub const MAX_PITCH: f32 = 128.0;

/// A single channel attribute value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attribute {
    /// Source gain (0.0-1.0).
    Gain(f32),
    /// Playback rate multiplier.
    Pitch(f32),
    /// Restart at end of buffer.
    Looping(bool),
    /// Position is relative to the listener rather than the world.
    Relative(bool),
    /// Source position.
    Position(Vec3),
    /// Source facing direction.
    Direction(Vec3),
    /// Source velocity (Doppler).
    Velocity(Vec3),
    /// Distance at which attenuation starts.
    ReferenceDistance(f32),
    /// Distance beyond which attenuation stops.
    MaxDistance(f32),
    /// Attenuation rolloff factor.
    Rolloff(f32),
    /// Floor applied after attenuation (0.0-1.0).
    MinGain(f32),
    /// Ceiling applied after attenuation (0.0-1.0).
    MaxGain(f32),
}

impl Attribute {
    /// Clamp the carried value into its legal range.
    ///
    /// NaN and infinite values fall back to the attribute's default.
    #[must_use]
    pub fn normalized(self) -> Self {
        let defaults = SoundAttributes::default();
        match self {
            Self::Gain(v) => Self::Gain(finite_or(v, defaults.gain).clamp(0.0, 1.0)),
            Self::Pitch(v) => {
                Self::Pitch(finite_or(v, defaults.pitch).clamp(MIN_PITCH, MAX_PITCH))
            },
            Self::Position(v) => Self::Position(finite_vec_or(v, defaults.position)),
            Self::Direction(v) => Self::Direction(finite_vec_or(v, defaults.direction)),
            Self::Velocity(v) => Self::Velocity(finite_vec_or(v, defaults.velocity)),
            Self::ReferenceDistance(v) => {
                Self::ReferenceDistance(finite_or(v, defaults.reference_distance).max(0.0))
            },
            Self::MaxDistance(v) => {
                Self::MaxDistance(finite_or(v, defaults.max_distance).max(0.0))
            },
            Self::Rolloff(v) => Self::Rolloff(finite_or(v, defaults.rolloff).max(0.0)),
            Self::MinGain(v) => Self::MinGain(finite_or(v, defaults.min_gain).clamp(0.0, 1.0)),
            Self::MaxGain(v) => Self::MaxGain(finite_or(v, defaults.max_gain).clamp(0.0, 1.0)),
            other @ (Self::Looping(_) | Self::Relative(_)) => other,
        }
    }

    /// Whether every number carried is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match *self {
            Self::Gain(v)
            | Self::Pitch(v)
            | Self::ReferenceDistance(v)
            | Self::MaxDistance(v)
            | Self::Rolloff(v)
            | Self::MinGain(v)
            | Self::MaxGain(v) => v.is_finite(),
            Self::Position(v) | Self::Direction(v) | Self::Velocity(v) => v.is_finite(),
            Self::Looping(_) | Self::Relative(_) => true,
        }
    }

    /// Whether this attribute only matters for positioned (mono) sources.
    #[must_use]
    pub const fn is_spatial(&self) -> bool {
        matches!(
            self,
            Self::Relative(_)
                | Self::Position(_)
                | Self::Direction(_)
                | Self::Velocity(_)
                | Self::ReferenceDistance(_)
                | Self::MaxDistance(_)
                | Self::Rolloff(_)
        )
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn finite_vec_or(value: Vec3, fallback: Vec3) -> Vec3 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Full attribute set of a sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundAttributes {
    /// Source gain (0.0-1.0).
    pub gain: f32,
    /// Playback rate multiplier.
    pub pitch: f32,
    /// Restart at end of buffer.
    pub looping: bool,
    /// Position is listener-relative.
    pub relative: bool,
    /// Source position.
    pub position: Vec3,
    /// Source facing direction.
    pub direction: Vec3,
    /// Source velocity.
    pub velocity: Vec3,
    /// Distance at which attenuation starts.
    pub reference_distance: f32,
    /// Distance beyond which attenuation stops.
    pub max_distance: f32,
    /// Attenuation rolloff factor.
    pub rolloff: f32,
    /// Floor applied after attenuation.
    pub min_gain: f32,
    /// Ceiling applied after attenuation.
    pub max_gain: f32,
}

impl Default for SoundAttributes {
    fn default() -> Self {
        Self {
            gain: 1.0,
            pitch: 1.0,
            looping: false,
            relative: false,
            position: Vec3::ZERO,
            direction: Vec3::ZERO,
            velocity: Vec3::ZERO,
            reference_distance: 1.0,
            max_distance: f32::MAX,
            rolloff: 1.0,
            min_gain: 0.0,
            max_gain: 1.0,
        }
    }
}

impl SoundAttributes {
    /// Store an attribute, returning the clamped value that was stored.
    pub fn set(&mut self, attribute: Attribute) -> Attribute {
        let attribute = attribute.normalized();
        match attribute {
            Attribute::Gain(v) => self.gain = v,
            Attribute::Pitch(v) => self.pitch = v,
            Attribute::Looping(v) => self.looping = v,
            Attribute::Relative(v) => self.relative = v,
            Attribute::Position(v) => self.position = v,
            Attribute::Direction(v) => self.direction = v,
            Attribute::Velocity(v) => self.velocity = v,
            Attribute::ReferenceDistance(v) => self.reference_distance = v,
            Attribute::MaxDistance(v) => self.max_distance = v,
            Attribute::Rolloff(v) => self.rolloff = v,
            Attribute::MinGain(v) => self.min_gain = v,
            Attribute::MaxGain(v) => self.max_gain = v,
        }
        attribute
    }

    /// Every attribute, in the order they are pushed to a freshly bound channel.
    pub fn iter(&self) -> impl Iterator<Item = Attribute> {
        [
            Attribute::Looping(self.looping),
            Attribute::Relative(self.relative),
            Attribute::Position(self.position),
            Attribute::Direction(self.direction),
            Attribute::Velocity(self.velocity),
            Attribute::Gain(self.gain),
            Attribute::Pitch(self.pitch),
            Attribute::ReferenceDistance(self.reference_distance),
            Attribute::MaxDistance(self.max_distance),
            Attribute::Rolloff(self.rolloff),
            Attribute::MinGain(self.min_gain),
            Attribute::MaxGain(self.max_gain),
        ]
        .into_iter()
    }
}
