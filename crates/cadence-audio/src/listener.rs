//! The single global listener.
//!
//! Unlike sounds, the listener has no command queue: there is exactly one,
//! it is never pooled, and every setter reaches the device immediately.

use glam::Vec3;
use tracing::trace;

use crate::device::AudioDevice;

/// A single listener attribute value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListenerAttribute {
    /// World position.
    Position(Vec3),
    /// Facing (`at`) and `up` vectors.
    Orientation {
        /// Forward vector.
        at: Vec3,
        /// Up vector.
        up: Vec3,
    },
    /// Velocity (Doppler).
    Velocity(Vec3),
    /// Master gain (0.0-1.0).
    Gain(f32),
}

/// Cached listener state.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerObject {
    /// World position.
    pub position: Vec3,
    /// Forward vector.
    pub at: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Velocity.
    pub velocity: Vec3,
    /// Master gain (0.0-1.0).
    pub gain: f32,
}

impl Default for ListenerObject {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            at: Vec3::Y,
            up: Vec3::Z,
            velocity: Vec3::ZERO,
            gain: 1.0,
        }
    }
}

impl ListenerObject {
    /// Store an attribute, returning the clamped value that was stored.
    pub fn set(&mut self, attribute: ListenerAttribute) -> ListenerAttribute {
        match attribute {
            ListenerAttribute::Position(p) if p.is_finite() => self.position = p,
            ListenerAttribute::Orientation { at, up } if at.is_finite() && up.is_finite() => {
                self.at = at;
                self.up = up;
            },
            ListenerAttribute::Velocity(v) if v.is_finite() => self.velocity = v,
            ListenerAttribute::Gain(g) if g.is_finite() => {
                let g = g.clamp(0.0, 1.0);
                self.gain = g;
                return ListenerAttribute::Gain(g);
            },
            // Non-finite input leaves the cached value alone.
            ListenerAttribute::Position(_) => return ListenerAttribute::Position(self.position),
            ListenerAttribute::Orientation { .. } => {
                return ListenerAttribute::Orientation {
                    at: self.at,
                    up: self.up,
                };
            },
            ListenerAttribute::Velocity(_) => return ListenerAttribute::Velocity(self.velocity),
            ListenerAttribute::Gain(_) => return ListenerAttribute::Gain(self.gain),
        }
        attribute
    }

    /// Every attribute, for re-syncing a device.
    pub fn iter(&self) -> impl Iterator<Item = ListenerAttribute> {
        [
            ListenerAttribute::Position(self.position),
            ListenerAttribute::Orientation {
                at: self.at,
                up: self.up,
            },
            ListenerAttribute::Velocity(self.velocity),
            ListenerAttribute::Gain(self.gain),
        ]
        .into_iter()
    }
}

/// Borrowed access to the listener that writes through to the device.
pub struct Listener<'a, D: AudioDevice> {
    state: &'a mut ListenerObject,
    device: &'a mut D,
}

impl<'a, D: AudioDevice> Listener<'a, D> {
    pub(crate) fn new(state: &'a mut ListenerObject, device: &'a mut D) -> Self {
        Self { state, device }
    }

    fn apply(&mut self, attribute: ListenerAttribute) {
        let stored = self.state.set(attribute);
        trace!("Listener {:?}", stored);
        self.device.apply_listener(stored);
    }

    /// Set the listener gain (clamped to 0.0-1.0).
    pub fn set_gain(&mut self, gain: f32) {
        self.apply(ListenerAttribute::Gain(gain));
    }

    /// Get the listener gain.
    #[must_use]
    pub fn gain(&self) -> f32 {
        self.state.gain
    }

    /// Set the listener velocity.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.apply(ListenerAttribute::Velocity(velocity));
    }

    /// Get the listener velocity.
    #[must_use]
    pub fn velocity(&self) -> Vec3 {
        self.state.velocity
    }

    /// Set the listener position.
    pub fn set_position(&mut self, position: Vec3) {
        self.apply(ListenerAttribute::Position(position));
    }

    /// Get the listener position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    /// Set the listener orientation.
    pub fn set_orientation(&mut self, at: Vec3, up: Vec3) {
        self.apply(ListenerAttribute::Orientation { at, up });
    }

    /// Get the cached listener state.
    #[must_use]
    pub fn state(&self) -> &ListenerObject {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_clamped() {
        let mut listener = ListenerObject::default();
        assert_eq!(
            listener.set(ListenerAttribute::Gain(3.0)),
            ListenerAttribute::Gain(1.0)
        );
        listener.set(ListenerAttribute::Gain(-1.0));
        assert!(listener.gain.abs() < f32::EPSILON);
    }

    #[test]
    fn test_non_finite_input_keeps_cached_value() {
        let mut listener = ListenerObject::default();
        listener.set(ListenerAttribute::Gain(0.5));
        listener.set(ListenerAttribute::Position(Vec3::X));

        assert_eq!(
            listener.set(ListenerAttribute::Gain(f32::NAN)),
            ListenerAttribute::Gain(0.5)
        );
        assert_eq!(
            listener.set(ListenerAttribute::Position(Vec3::splat(f32::INFINITY))),
            ListenerAttribute::Position(Vec3::X)
        );
        assert!((listener.gain - 0.5).abs() < f32::EPSILON);
        assert_eq!(listener.position, Vec3::X);
    }

    #[test]
    fn test_orientation() {
        let mut listener = ListenerObject::default();
        listener.set(ListenerAttribute::Orientation {
            at: Vec3::X,
            up: Vec3::Y,
        });
        assert_eq!(listener.at, Vec3::X);
        assert_eq!(listener.up, Vec3::Y);
        assert_eq!(listener.iter().count(), 4);
    }
}
