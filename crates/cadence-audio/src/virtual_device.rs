//! A silent, deterministic device.
//!
//! Each channel keeps a play cursor in seconds that only moves when
//! [`AudioDevice::advance`] is called, so a test controls exactly when a
//! buffer runs out. Everything the scheduler pushes is kept and can be read
//! back through [`VirtualDevice::channel`].

use std::sync::Arc;
use std::time::Duration;

use cadence_common::{AudioError, AudioResult, ChannelId};
use tracing::{debug, info};

use crate::attributes::{Attribute, SoundAttributes};
use crate::buffer::AudioBuffer;
use crate::device::{AudioDevice, ChannelStatus};
use crate::listener::{ListenerAttribute, ListenerObject};
use crate::spatial::{self, DistanceModel};

/// One software channel.
#[derive(Debug, Clone, Default)]
pub struct VirtualChannel {
    buffer: Option<Arc<AudioBuffer>>,
    attributes: SoundAttributes,
    status: ChannelStatus,
    cursor: f64,
    starts: u32,
}

impl VirtualChannel {
    /// Attributes as last applied.
    #[must_use]
    pub const fn attributes(&self) -> &SoundAttributes {
        &self.attributes
    }

    /// Transport state.
    #[must_use]
    pub const fn status(&self) -> ChannelStatus {
        self.status
    }

    /// Play cursor in seconds.
    #[must_use]
    pub const fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Name of the bound buffer.
    #[must_use]
    pub fn buffer_name(&self) -> Option<&str> {
        self.buffer.as_ref().map(|b| b.name.as_str())
    }

    /// How many times the channel was started from `Initial` or `Stopped`.
    #[must_use]
    pub const fn starts(&self) -> u32 {
        self.starts
    }

    fn duration(&self) -> f64 {
        self.buffer
            .as_ref()
            .map_or(0.0, |b| b.duration.as_secs_f64())
    }
}

/// Deterministic device for tests and headless hosts.
#[derive(Debug)]
pub struct VirtualDevice {
    channels: Vec<VirtualChannel>,
    listener: ListenerObject,
    distance_model: DistanceModel,
    channel_limit: Option<usize>,
    supports_extended: bool,
    extended_enabled: bool,
}

impl Default for VirtualDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDevice {
    /// Create a device with no channels open.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            listener: ListenerObject::default(),
            distance_model: DistanceModel::default(),
            channel_limit: None,
            supports_extended: true,
            extended_enabled: false,
        }
    }

    /// Pretend the hardware can only provide `limit` channels.
    #[must_use]
    pub const fn with_channel_limit(mut self, limit: usize) -> Self {
        self.channel_limit = Some(limit);
        self
    }

    /// Whether `enable_extended_features` succeeds.
    #[must_use]
    pub const fn with_extended_support(mut self, supported: bool) -> Self {
        self.supports_extended = supported;
        self
    }

    /// Inspect a channel.
    #[must_use]
    pub fn channel(&self, id: ChannelId) -> Option<&VirtualChannel> {
        self.channels.get(id.index())
    }

    /// Number of open channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Listener as last applied.
    #[must_use]
    pub const fn listener(&self) -> &ListenerObject {
        &self.listener
    }

    /// Active distance model.
    #[must_use]
    pub const fn distance_model(&self) -> DistanceModel {
        self.distance_model
    }

    /// Whether extended features were switched on.
    #[must_use]
    pub const fn extended_features_enabled(&self) -> bool {
        self.extended_enabled
    }

    /// Gain a channel would be heard at.
    #[must_use]
    pub fn effective_gain(&self, id: ChannelId) -> Option<f32> {
        let channel = self.channel(id)?;
        let spatial = channel.buffer.as_ref().map_or(true, |b| b.is_spatial());
        Some(spatial::effective_gain(
            self.distance_model,
            &channel.attributes,
            &self.listener,
            spatial,
        ))
    }

    fn channel_mut(&mut self, id: ChannelId) -> Option<&mut VirtualChannel> {
        self.channels.get_mut(id.index())
    }
}

impl AudioDevice for VirtualDevice {
    fn name(&self) -> &'static str {
        "virtual"
    }

    fn open_channels(&mut self, count: usize) -> AudioResult<usize> {
        let count = self.channel_limit.map_or(count, |limit| count.min(limit));
        if count == 0 {
            return Err(AudioError::InvalidChannelCount(0));
        }
        self.channels = vec![VirtualChannel::default(); count];
        info!("Virtual device opened {} channels", count);
        Ok(count)
    }

    fn set_distance_model(&mut self, model: DistanceModel) {
        self.distance_model = model;
    }

    fn enable_extended_features(&mut self) -> bool {
        self.extended_enabled = self.supports_extended;
        self.extended_enabled
    }

    fn bind(&mut self, channel: ChannelId, buffer: &Arc<AudioBuffer>) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.buffer = Some(Arc::clone(buffer));
            ch.status = ChannelStatus::Initial;
            ch.cursor = 0.0;
        }
    }

    fn apply(&mut self, channel: ChannelId, attribute: Attribute) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.attributes.set(attribute);
        }
    }

    fn play(&mut self, channel: ChannelId) {
        let Some(ch) = self.channel_mut(channel) else {
            return;
        };
        if ch.buffer.is_none() {
            debug!("Virtual {} has no buffer, ignoring play", channel);
            return;
        }
        match ch.status {
            ChannelStatus::Initial => ch.starts += 1,
            ChannelStatus::Stopped => {
                ch.starts += 1;
                ch.cursor = 0.0;
            },
            ChannelStatus::Playing | ChannelStatus::Paused => {},
        }
        ch.status = ChannelStatus::Playing;
    }

    fn pause(&mut self, channel: ChannelId) {
        if let Some(ch) = self.channel_mut(channel) {
            if ch.status == ChannelStatus::Playing {
                ch.status = ChannelStatus::Paused;
            }
        }
    }

    fn stop(&mut self, channel: ChannelId) {
        if let Some(ch) = self.channel_mut(channel) {
            if ch.status != ChannelStatus::Initial {
                ch.status = ChannelStatus::Stopped;
            }
        }
    }

    fn rewind(&mut self, channel: ChannelId) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.cursor = 0.0;
        }
    }

    fn seek(&mut self, channel: ChannelId, offset: Duration) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.cursor = offset.as_secs_f64().min(ch.duration());
        }
    }

    fn status(&self, channel: ChannelId) -> ChannelStatus {
        self.channel(channel)
            .map_or(ChannelStatus::Initial, VirtualChannel::status)
    }

    fn reset(&mut self, channel: ChannelId) {
        if let Some(ch) = self.channel_mut(channel) {
            let starts = ch.starts;
            *ch = VirtualChannel {
                starts,
                ..VirtualChannel::default()
            };
        }
    }

    fn apply_listener(&mut self, attribute: ListenerAttribute) {
        self.listener.set(attribute);
    }

    fn advance(&mut self, dt: f64) {
        for ch in &mut self.channels {
            if ch.status != ChannelStatus::Playing {
                continue;
            }
            let duration = ch.duration();
            ch.cursor += dt * f64::from(ch.attributes.pitch);
            if ch.cursor < duration {
                continue;
            }
            if ch.attributes.looping && duration > 0.0 {
                ch.cursor %= duration;
            } else {
                ch.cursor = duration;
                ch.status = ChannelStatus::Stopped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenth_second() -> Arc<AudioBuffer> {
        Arc::new(AudioBuffer::new("tick", vec![0.0; 100], 1000, 1))
    }

    #[test]
    fn test_channel_limit() {
        let mut device = VirtualDevice::new().with_channel_limit(3);
        assert_eq!(device.open_channels(8).expect("open"), 3);
        assert_eq!(device.channel_count(), 3);

        let mut empty = VirtualDevice::new().with_channel_limit(0);
        assert!(empty.open_channels(4).is_err());
    }

    #[test]
    fn test_runs_out() {
        let mut device = VirtualDevice::new();
        device.open_channels(1).expect("open");
        let ch = ChannelId::new(0);

        device.bind(ch, &tenth_second());
        assert_eq!(device.status(ch), ChannelStatus::Initial);
        device.play(ch);
        device.advance(0.06);
        assert_eq!(device.status(ch), ChannelStatus::Playing);
        device.advance(0.06);
        assert_eq!(device.status(ch), ChannelStatus::Stopped);
    }

    #[test]
    fn test_pitch_and_looping() {
        let mut device = VirtualDevice::new();
        device.open_channels(1).expect("open");
        let ch = ChannelId::new(0);

        device.bind(ch, &tenth_second());
        device.apply(ch, Attribute::Looping(true));
        device.apply(ch, Attribute::Pitch(2.0));
        device.play(ch);
        device.advance(0.06);

        // 0.12s of material at double speed wraps to 0.02
        assert_eq!(device.status(ch), ChannelStatus::Playing);
        assert!((device.channel(ch).expect("channel").cursor() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_pause_holds_cursor() {
        let mut device = VirtualDevice::new();
        device.open_channels(1).expect("open");
        let ch = ChannelId::new(0);

        device.bind(ch, &tenth_second());
        device.play(ch);
        device.advance(0.03);
        device.pause(ch);
        device.advance(1.0);
        assert_eq!(device.status(ch), ChannelStatus::Paused);
        assert!((device.channel(ch).expect("channel").cursor() - 0.03).abs() < 1e-9);

        device.rewind(ch);
        assert!(device.channel(ch).expect("channel").cursor().abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_binding() {
        let mut device = VirtualDevice::new();
        device.open_channels(1).expect("open");
        let ch = ChannelId::new(0);

        device.bind(ch, &tenth_second());
        device.apply(ch, Attribute::Gain(0.3));
        device.play(ch);
        device.reset(ch);

        let channel = device.channel(ch).expect("channel");
        assert_eq!(channel.status(), ChannelStatus::Initial);
        assert!(channel.buffer_name().is_none());
        assert!((channel.attributes().gain - 1.0).abs() < f32::EPSILON);
        assert_eq!(channel.starts(), 1);
    }

    #[test]
    fn test_unknown_channel_ignored() {
        let mut device = VirtualDevice::new();
        device.open_channels(1).expect("open");
        let ghost = ChannelId::new(5);
        device.play(ghost);
        device.apply(ghost, Attribute::Gain(0.5));
        assert_eq!(device.status(ghost), ChannelStatus::Initial);
    }
}
