//! Distance attenuation and Doppler shift.
//!
//! Devices that mix on the CPU (the rodio device) use these to turn a
//! sound's cached attributes and the listener state into a final gain and
//! playback speed. The formulas follow the usual OpenAL distance models.
//!
//! # Example
//!
//! ```
//! use cadence_audio::spatial::{attenuation, DistanceModel};
//!
//! // Inverse model: twice the reference distance with rolloff 1 halves the gain.
//! let gain = attenuation(DistanceModel::Inverse, 2.0, 1.0, f32::MAX, 1.0);
//! assert!((gain - 0.5).abs() < 1e-6);
//! ```

use serde::{Deserialize, Serialize};

use crate::attributes::SoundAttributes;
use crate::listener::ListenerObject;

/// Speed of sound in world units per second (for Doppler calculations).
pub const SPEED_OF_SOUND: f32 = 343.3;

/// Distance attenuation models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceModel {
    /// No distance attenuation.
    None,
    /// `ref / (ref + rolloff * (d - ref))`.
    #[default]
    Inverse,
    /// Inverse, with the distance clamped to `[ref, max]` first.
    InverseClamped,
    /// Linear falloff between reference and maximum distance.
    Linear,
    /// `(d / ref) ^ -rolloff`.
    Exponent,
}

impl DistanceModel {
    /// Get a human-readable name for this model.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Inverse => "Inverse",
            Self::InverseClamped => "Inverse (Clamped)",
            Self::Linear => "Linear",
            Self::Exponent => "Exponent",
        }
    }
}

/// Attenuation factor for a source at `distance`.
#[must_use]
pub fn attenuation(
    model: DistanceModel,
    distance: f32,
    reference: f32,
    max_distance: f32,
    rolloff: f32,
) -> f32 {
    match model {
        DistanceModel::None => 1.0,
        DistanceModel::Inverse => inverse(distance, reference, rolloff),
        DistanceModel::InverseClamped => {
            let d = distance.max(reference).min(max_distance);
            inverse(d, reference, rolloff)
        },
        DistanceModel::Linear => {
            let range = max_distance - reference;
            if range <= 0.0 {
                return 1.0;
            }
            let d = distance.max(reference).min(max_distance);
            (1.0 - rolloff * (d - reference) / range).clamp(0.0, 1.0)
        },
        DistanceModel::Exponent => {
            if reference <= 0.0 || distance <= 0.0 {
                return 1.0;
            }
            (distance / reference).powf(-rolloff).min(1.0)
        },
    }
}

fn inverse(distance: f32, reference: f32, rolloff: f32) -> f32 {
    let denominator = reference + rolloff * (distance - reference);
    if denominator <= f32::EPSILON {
        1.0
    } else {
        (reference / denominator).min(1.0)
    }
}

/// Vector from the listener to a source, honoring listener-relative mode.
#[must_use]
pub fn relative_offset(source: &SoundAttributes, listener: &ListenerObject) -> glam::Vec3 {
    if source.relative {
        source.position
    } else {
        source.position - listener.position
    }
}

/// Final gain for a source as heard by `listener`.
///
/// `spatial` is false for multi-channel buffers, which are never positioned.
#[must_use]
pub fn effective_gain(
    model: DistanceModel,
    source: &SoundAttributes,
    listener: &ListenerObject,
    spatial: bool,
) -> f32 {
    let mut gain = source.gain;
    if spatial {
        let distance = relative_offset(source, listener).length();
        gain *= attenuation(
            model,
            distance,
            source.reference_distance,
            source.max_distance,
            source.rolloff,
        );
    }
    let floor = source.min_gain.min(source.max_gain);
    gain.max(floor).min(source.max_gain) * listener.gain
}

/// Playback speed including Doppler shift.
#[must_use]
pub fn doppler_pitch(source: &SoundAttributes, listener: &ListenerObject, spatial: bool) -> f32 {
    if !spatial {
        return source.pitch;
    }

    let offset = relative_offset(source, listener);
    let distance = offset.length();
    if distance <= f32::EPSILON {
        return source.pitch;
    }

    // Unit vector from source toward listener; positive projections move that way
    let toward_listener = -offset / distance;
    let listener_velocity = if source.relative {
        0.0
    } else {
        listener.velocity.dot(toward_listener)
    };
    let source_velocity = source.velocity.dot(toward_listener);

    let numerator = SPEED_OF_SOUND - listener_velocity.min(SPEED_OF_SOUND);
    let denominator = SPEED_OF_SOUND - source_velocity.min(SPEED_OF_SOUND);

    if denominator.abs() > 0.01 {
        source.pitch * (numerator / denominator)
    } else {
        source.pitch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_attenuation_none() {
        let gain = attenuation(DistanceModel::None, 500.0, 1.0, 1000.0, 1.0);
        assert!((gain - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_attenuation_inverse() {
        // At reference = full volume
        let at_ref = attenuation(DistanceModel::Inverse, 10.0, 10.0, 1000.0, 1.0);
        assert!((at_ref - 1.0).abs() < f32::EPSILON);

        // At 4x reference = quarter volume
        let far = attenuation(DistanceModel::Inverse, 40.0, 10.0, 1000.0, 1.0);
        assert!((far - 0.25).abs() < 1e-6);

        // Inside reference never amplifies
        let near = attenuation(DistanceModel::Inverse, 1.0, 10.0, 1000.0, 1.0);
        assert!((near - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_attenuation_inverse_clamped() {
        let at_max = attenuation(DistanceModel::InverseClamped, 20.0, 10.0, 20.0, 1.0);
        let beyond = attenuation(DistanceModel::InverseClamped, 200.0, 10.0, 20.0, 1.0);
        assert!((at_max - beyond).abs() < f32::EPSILON);
        assert!((beyond - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_attenuation_linear() {
        let mid = attenuation(DistanceModel::Linear, 550.0, 100.0, 1000.0, 1.0);
        assert!((mid - 0.5).abs() < 0.01);

        let end = attenuation(DistanceModel::Linear, 5000.0, 100.0, 1000.0, 1.0);
        assert!(end.abs() < f32::EPSILON);
    }

    #[test]
    fn test_attenuation_exponent() {
        let exp = attenuation(DistanceModel::Exponent, 20.0, 10.0, 1000.0, 2.0);
        let inv = attenuation(DistanceModel::Inverse, 20.0, 10.0, 1000.0, 1.0);
        assert!(exp < inv);
    }

    #[test]
    fn test_effective_gain_clamps_to_min_gain() {
        let source = SoundAttributes {
            position: Vec3::new(1000.0, 0.0, 0.0),
            min_gain: 0.2,
            ..SoundAttributes::default()
        };
        let listener = ListenerObject::default();

        let gain = effective_gain(DistanceModel::Inverse, &source, &listener, true);
        assert!((gain - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_effective_gain_skips_stereo() {
        let source = SoundAttributes {
            gain: 0.8,
            position: Vec3::new(1000.0, 0.0, 0.0),
            ..SoundAttributes::default()
        };
        let listener = ListenerObject {
            gain: 0.5,
            ..ListenerObject::default()
        };

        let gain = effective_gain(DistanceModel::Inverse, &source, &listener, false);
        assert!((gain - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_relative_ignores_listener_position() {
        let source = SoundAttributes {
            relative: true,
            position: Vec3::new(2.0, 0.0, 0.0),
            ..SoundAttributes::default()
        };
        let listener = ListenerObject {
            position: Vec3::new(100.0, 0.0, 0.0),
            ..ListenerObject::default()
        };
        assert_eq!(relative_offset(&source, &listener), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_doppler_approaching() {
        let source = SoundAttributes {
            position: Vec3::new(10.0, 0.0, 0.0),
            velocity: Vec3::new(-30.0, 0.0, 0.0),
            ..SoundAttributes::default()
        };
        let listener = ListenerObject::default();

        // Source moving toward the listener raises the pitch
        assert!(doppler_pitch(&source, &listener, true) > 1.0);
        assert!((doppler_pitch(&source, &listener, false) - 1.0).abs() < f32::EPSILON);
    }
}
