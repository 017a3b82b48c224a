//! The hardware boundary.
//!
//! The scheduler never talks to an output backend directly. Everything it
//! needs from "the hardware" is expressed by [`AudioDevice`]: a fixed set of
//! numbered channels that can be bound to a buffer, configured through
//! [`Attribute`] values, and driven through the usual transport controls.
//!
//! Two implementations ship with the crate:
//!
//! - [`RodioDevice`](crate::rodio_device::RodioDevice) plays through the
//!   default output using one rodio sink per channel.
//! - [`VirtualDevice`](crate::virtual_device::VirtualDevice) keeps a clock per
//!   channel and produces no sound; it exists for tests and headless hosts.

use std::sync::Arc;
use std::time::Duration;

use cadence_common::{AudioResult, ChannelId};

use crate::attributes::Attribute;
use crate::buffer::AudioBuffer;
use crate::listener::ListenerAttribute;
use crate::spatial::DistanceModel;

/// Transport state reported by a device channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelStatus {
    /// Bound (or reset) but never started.
    #[default]
    Initial,
    /// Producing output.
    Playing,
    /// Suspended; resumes where it left off.
    Paused,
    /// Stopped explicitly or reached the end of a non-looping buffer.
    Stopped,
}

impl ChannelStatus {
    /// Whether the channel is playing or paused.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// A set of hardware channels.
///
/// Calls naming a channel the device never opened are ignored. A channel
/// bound to nothing accepts attributes but cannot start.
pub trait AudioDevice {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Allocate up to `count` channels, returning how many were opened.
    ///
    /// Fails only when not even one channel could be created.
    fn open_channels(&mut self, count: usize) -> AudioResult<usize>;

    /// Select the distance attenuation model for every channel.
    fn set_distance_model(&mut self, model: DistanceModel);

    /// Try to turn on backend-specific effects. Returns `false` if unsupported.
    fn enable_extended_features(&mut self) -> bool;

    /// Attach a buffer to a channel, leaving it in [`ChannelStatus::Initial`].
    fn bind(&mut self, channel: ChannelId, buffer: &Arc<AudioBuffer>);

    /// Set one attribute on a channel.
    fn apply(&mut self, channel: ChannelId, attribute: Attribute);

    /// Start (or resume) a channel.
    fn play(&mut self, channel: ChannelId);

    /// Pause a playing channel.
    fn pause(&mut self, channel: ChannelId);

    /// Stop a channel.
    fn stop(&mut self, channel: ChannelId);

    /// Seek a channel back to the start of its buffer.
    fn rewind(&mut self, channel: ChannelId);

    /// Move the play cursor of a channel.
    fn seek(&mut self, channel: ChannelId, offset: Duration);

    /// Current transport state of a channel.
    fn status(&self, channel: ChannelId) -> ChannelStatus;

    /// Stop a channel and clear its buffer and attributes.
    fn reset(&mut self, channel: ChannelId);

    /// Update the listener.
    fn apply_listener(&mut self, attribute: ListenerAttribute);

    /// Let `dt` seconds of playback elapse. Real-time backends ignore this.
    fn advance(&mut self, _dt: f64) {}
}
