//! Playback through the default output using rodio.
//!
//! Every channel is a [`Sink`] created up front on one shared output stream.
//! rodio has no notion of 3D sources, so spatial attributes are folded on the
//! CPU: whenever a channel's attributes or the listener change, the sink's
//! volume is recomputed from the distance model and its speed from the
//! Doppler shift.
//!
//! A sink can only stream what has been appended to it. Binding stores the
//! buffer; the samples are appended when the channel is started from
//! [`ChannelStatus::Initial`] or [`ChannelStatus::Stopped`]. Looping is read
//! at that moment, so toggling it on a playing channel takes effect on the
//! next start.

use std::sync::Arc;
use std::time::Duration;

use cadence_common::{AudioError, AudioResult, ChannelId};
use rodio::source::SeekError;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use crate::attributes::{Attribute, SoundAttributes};
use crate::buffer::AudioBuffer;
use crate::device::{AudioDevice, ChannelStatus};
use crate::listener::{ListenerAttribute, ListenerObject};
use crate::spatial::{self, DistanceModel};

/// Streams a decoded buffer without copying its samples.
struct SharedSamples {
    samples: Arc<Vec<f32>>,
    position: usize,
    channels: u16,
    sample_rate: u32,
    duration: Duration,
}

impl SharedSamples {
    fn new(buffer: &AudioBuffer) -> Self {
        Self {
            samples: Arc::clone(&buffer.samples),
            position: 0,
            channels: buffer.channels,
            sample_rate: buffer.sample_rate,
            duration: buffer.duration,
        }
    }
}

impl Iterator for SharedSamples {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.samples.get(self.position).copied()?;
        self.position += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl Source for SharedSamples {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.samples.len().saturating_sub(self.position))
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration)
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        let frame = (pos.as_secs_f64() * f64::from(self.sample_rate)) as usize;
        // Land on a frame boundary so channels stay interleaved
        self.position = frame
            .saturating_mul(usize::from(self.channels))
            .min(self.samples.len());
        Ok(())
    }
}

struct SinkChannel {
    sink: Sink,
    buffer: Option<Arc<AudioBuffer>>,
    attributes: SoundAttributes,
    state: ChannelStatus,
    offset: Duration,
}

impl std::fmt::Debug for SinkChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkChannel")
            .field("buffer", &self.buffer.as_ref().map(|b| b.name.as_str()))
            .field("state", &self.state)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl SinkChannel {
    fn new(sink: Sink) -> Self {
        Self {
            sink,
            buffer: None,
            attributes: SoundAttributes::default(),
            state: ChannelStatus::Initial,
            offset: Duration::ZERO,
        }
    }

    fn status(&self) -> ChannelStatus {
        if self.state == ChannelStatus::Playing && self.sink.empty() {
            ChannelStatus::Stopped
        } else {
            self.state
        }
    }

    fn refresh(&self, model: DistanceModel, listener: &ListenerObject) {
        let spatial = self.buffer.as_ref().map_or(true, |b| b.is_spatial());
        self.sink.set_volume(spatial::effective_gain(
            model,
            &self.attributes,
            listener,
            spatial,
        ));
        self.sink
            .set_speed(spatial::doppler_pitch(&self.attributes, listener, spatial));
    }

    fn start(&mut self) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        let source = SharedSamples::new(buffer);

        self.sink.stop();
        if self.attributes.looping {
            self.sink.append(source.repeat_infinite());
        } else {
            self.sink.append(source);
        }
        if !self.offset.is_zero() {
            if let Err(e) = self.sink.try_seek(self.offset) {
                warn!("Seek to {:?} failed: {e}", self.offset);
            }
        }
        self.sink.play();
    }
}

/// rodio-backed device.
pub struct RodioDevice {
    /// The output stream (must be kept alive).
    _stream: OutputStream,
    handle: OutputStreamHandle,
    channels: Vec<SinkChannel>,
    listener: ListenerObject,
    distance_model: DistanceModel,
}

impl std::fmt::Debug for RodioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioDevice")
            .field("channels", &self.channels.len())
            .field("distance_model", &self.distance_model)
            .finish_non_exhaustive()
    }
}

impl RodioDevice {
    /// Open the default output device.
    pub fn new() -> AudioResult<Self> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;

        info!("Audio device initialized");

        Ok(Self {
            _stream: stream,
            handle,
            channels: Vec::new(),
            listener: ListenerObject::default(),
            distance_model: DistanceModel::default(),
        })
    }

    fn channel_mut(&mut self, id: ChannelId) -> Option<&mut SinkChannel> {
        self.channels.get_mut(id.index())
    }

    fn refresh(&self, id: ChannelId) {
        if let Some(ch) = self.channels.get(id.index()) {
            ch.refresh(self.distance_model, &self.listener);
        }
    }

    fn refresh_all(&self) {
        for ch in self.channels.iter().filter(|ch| ch.buffer.is_some()) {
            ch.refresh(self.distance_model, &self.listener);
        }
    }
}

impl AudioDevice for RodioDevice {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn open_channels(&mut self, count: usize) -> AudioResult<usize> {
        let mut channels = Vec::with_capacity(count);

        for i in 0..count {
            match Sink::try_new(&self.handle) {
                Ok(sink) => channels.push(SinkChannel::new(sink)),
                Err(e) => {
                    if i == 0 {
                        return Err(AudioError::DeviceInitFailed(e.to_string()));
                    }
                    warn!("Could only create {} audio sinks", i);
                    break;
                },
            }
        }

        info!("Created {} audio sinks", channels.len());
        self.channels = channels;
        Ok(self.channels.len())
    }

    fn set_distance_model(&mut self, model: DistanceModel) {
        debug!("Distance model: {}", model.name());
        self.distance_model = model;
        self.refresh_all();
    }

    fn enable_extended_features(&mut self) -> bool {
        warn!("Extended effects are not available on the rodio backend");
        false
    }

    fn bind(&mut self, channel: ChannelId, buffer: &Arc<AudioBuffer>) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.sink.stop();
            ch.buffer = Some(Arc::clone(buffer));
            ch.state = ChannelStatus::Initial;
            ch.offset = Duration::ZERO;
        }
        self.refresh(channel);
    }

    fn apply(&mut self, channel: ChannelId, attribute: Attribute) {
        let Some(ch) = self.channel_mut(channel) else {
            return;
        };
        ch.attributes.set(attribute);
        if !matches!(attribute, Attribute::Looping(_)) {
            self.refresh(channel);
        }
    }

    fn play(&mut self, channel: ChannelId) {
        let Some(ch) = self.channel_mut(channel) else {
            return;
        };
        if ch.buffer.is_none() {
            return;
        }
        match ch.status() {
            ChannelStatus::Initial | ChannelStatus::Stopped => ch.start(),
            ChannelStatus::Paused => ch.sink.play(),
            ChannelStatus::Playing => {},
        }
        ch.state = ChannelStatus::Playing;
    }

    fn pause(&mut self, channel: ChannelId) {
        if let Some(ch) = self.channel_mut(channel) {
            if ch.status() == ChannelStatus::Playing {
                ch.sink.pause();
                ch.state = ChannelStatus::Paused;
            }
        }
    }

    fn stop(&mut self, channel: ChannelId) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.sink.stop();
            if ch.state != ChannelStatus::Initial {
                ch.state = ChannelStatus::Stopped;
            }
        }
    }

    fn rewind(&mut self, channel: ChannelId) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.offset = Duration::ZERO;
            if ch.status().is_started() {
                if let Err(e) = ch.sink.try_seek(Duration::ZERO) {
                    warn!("Rewind of {} failed: {e}", channel);
                }
            }
        }
    }

    fn seek(&mut self, channel: ChannelId, offset: Duration) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.offset = offset;
            if ch.status().is_started() {
                if let Err(e) = ch.sink.try_seek(offset) {
                    warn!("Seek of {} to {:?} failed: {e}", channel, offset);
                }
            }
        }
    }

    fn status(&self, channel: ChannelId) -> ChannelStatus {
        self.channels
            .get(channel.index())
            .map_or(ChannelStatus::Initial, SinkChannel::status)
    }

    fn reset(&mut self, channel: ChannelId) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.sink.stop();
            ch.sink.set_volume(1.0);
            ch.sink.set_speed(1.0);
            ch.buffer = None;
            ch.attributes = SoundAttributes::default();
            ch.state = ChannelStatus::Initial;
            ch.offset = Duration::ZERO;
        }
    }

    fn apply_listener(&mut self, attribute: ListenerAttribute) {
        self.listener.set(attribute);
        self.refresh_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo() -> AudioBuffer {
        AudioBuffer::new("pair", vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5], 2, 2)
    }

    #[test]
    fn test_shared_samples_share_storage() {
        let buffer = stereo();
        let source = SharedSamples::new(&buffer);
        assert!(Arc::ptr_eq(&source.samples, &buffer.samples));
        assert_eq!(source.channels(), 2);
        assert_eq!(source.total_duration(), Some(buffer.duration));
        assert_eq!(source.collect::<Vec<_>>(), *buffer.samples);
    }

    #[test]
    fn test_shared_samples_seek_by_frame() {
        let buffer = stereo();
        let mut source = SharedSamples::new(&buffer);

        source.try_seek(Duration::from_millis(500)).expect("seek");
        assert_eq!(source.current_frame_len(), Some(4));
        assert_eq!(source.next(), Some(1.0));

        source.try_seek(Duration::from_secs(10)).expect("seek");
        assert_eq!(source.next(), None);
    }
}
