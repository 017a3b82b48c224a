//! Logical playback requests.
//!
//! A [`SoundObject`] is what game code holds on to. It may or may not own a
//! channel at any moment; its [`SoundAttributes`] survive either way and are
//! replayed onto whichever channel it binds next.

use std::collections::VecDeque;
use std::sync::Arc;

use cadence_common::ChannelId;
use serde::{Deserialize, Serialize};

use crate::attributes::SoundAttributes;
use crate::buffer::AudioBuffer;

/// Transport commands, queued by game code and drained in `pre_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Start, or resume if paused.
    Play,
    /// Pause if playing.
    Pause,
    /// Stop and give the channel back.
    Stop,
    /// Seek to the start.
    Rewind,
}

/// Where a sound sits in the frame pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoundPhase {
    /// No channel, nothing requested.
    #[default]
    Inactive,
    /// Play requested, waiting for a free channel.
    Queued,
    /// Owns a started channel (playing or paused).
    Active,
    /// Stopped; the channel is returned in `post_frame`.
    PendingCleanup,
}

/// Transport flag reported by `is_playing`/`is_paused`/`is_stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Producing output.
    Playing,
    /// Suspended on its channel.
    Paused,
    /// Not producing output.
    #[default]
    Stopped,
}

/// Transitions collected in `pre_frame` and applied in `frame`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PendingTransitions {
    pub stop: bool,
    pub pause: bool,
    pub rewind: bool,
    pub play: bool,
}

impl PendingTransitions {
    pub(crate) const fn any_before_play(&self) -> bool {
        self.stop || self.pause || self.rewind
    }
}

/// Gain, pitch and transport flag of a sound, for save games.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoundSnapshot {
    /// Source gain.
    pub gain: f32,
    /// Pitch multiplier.
    pub pitch: f32,
    /// Whether the sound was playing.
    pub playing: bool,
}

/// A logical sound.
#[derive(Debug, Default)]
pub struct SoundObject {
    buffer_name: Option<String>,
    pub(crate) buffer: Option<Arc<AudioBuffer>>,
    pub(crate) channel: Option<ChannelId>,
    pub(crate) commands: VecDeque<Command>,
    pub(crate) attributes: SoundAttributes,
    pub(crate) phase: SoundPhase,
    pub(crate) playback: PlaybackState,
    pub(crate) pending: PendingTransitions,
    pub(crate) play_offset: f32,
}

impl SoundObject {
    /// Reset everything except the command queue's allocation.
    pub(crate) fn clear(&mut self) {
        self.buffer_name = None;
        self.buffer = None;
        self.channel = None;
        self.commands.clear();
        self.attributes = SoundAttributes::default();
        self.phase = SoundPhase::Inactive;
        self.playback = PlaybackState::Stopped;
        self.pending = PendingTransitions::default();
        self.play_offset = 0.0;
    }

    /// Swap the bound buffer, returning the name of the previous one.
    pub(crate) fn replace_buffer(&mut self, name: &str, buffer: Arc<AudioBuffer>) -> Option<String> {
        self.buffer = Some(buffer);
        self.buffer_name.replace(name.to_string())
    }

    /// Forget the bound buffer, returning its name.
    pub(crate) fn take_buffer(&mut self) -> Option<String> {
        self.buffer = None;
        self.buffer_name.take()
    }

    /// Name of the bound buffer.
    #[must_use]
    pub fn buffer_name(&self) -> Option<&str> {
        self.buffer_name.as_deref()
    }

    /// The bound buffer.
    #[must_use]
    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    /// Channel currently owned, if any.
    #[must_use]
    pub const fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    /// Cached attributes.
    #[must_use]
    pub const fn attributes(&self) -> &SoundAttributes {
        &self.attributes
    }

    /// Pipeline phase.
    #[must_use]
    pub const fn phase(&self) -> SoundPhase {
        self.phase
    }

    /// Transport state.
    #[must_use]
    pub const fn playback(&self) -> PlaybackState {
        self.playback
    }

    /// Start offset in seconds.
    #[must_use]
    pub const fn play_offset(&self) -> f32 {
        self.play_offset
    }

    /// Commands queued since the last `pre_frame`.
    #[must_use]
    pub fn queued_commands(&self) -> usize {
        self.commands.len()
    }

    /// Only mono buffers are positioned; no buffer counts as mono.
    #[must_use]
    pub fn is_spatial(&self) -> bool {
        self.buffer.as_ref().map_or(true, |b| b.is_spatial())
    }

    /// Seconds the bound buffer takes to play at the current pitch.
    #[must_use]
    pub fn duration_of_play(&self) -> f32 {
        self.buffer
            .as_ref()
            .map_or(0.0, |b| b.duration.as_secs_f32() / self.attributes.pitch)
    }

    /// Gain, pitch and playing flag.
    #[must_use]
    pub fn snapshot(&self) -> SoundSnapshot {
        SoundSnapshot {
            gain: self.attributes.gain,
            pitch: self.attributes.pitch,
            playing: self.playback == PlaybackState::Playing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;

    #[test]
    fn test_clear_resets_state() {
        let mut sound = SoundObject::default();
        sound.commands.push_back(Command::Play);
        sound.attributes.set(Attribute::Gain(0.2));
        sound.phase = SoundPhase::Queued;
        sound.pending.play = true;
        sound.replace_buffer("a.wav", Arc::new(AudioBuffer::new("a.wav", vec![0.0; 4], 4, 1)));

        sound.clear();
        assert_eq!(sound.queued_commands(), 0);
        assert_eq!(sound.phase(), SoundPhase::Inactive);
        assert_eq!(sound.attributes(), &SoundAttributes::default());
        assert!(sound.buffer_name().is_none());
        assert!(!sound.pending.play);
    }

    #[test]
    fn test_duration_of_play_scales_with_pitch() {
        let mut sound = SoundObject::default();
        assert!(sound.duration_of_play().abs() < f32::EPSILON);

        sound.replace_buffer("two", Arc::new(AudioBuffer::new("two", vec![0.0; 200], 100, 1)));
        sound.attributes.set(Attribute::Pitch(2.0));
        assert!((sound.duration_of_play() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_replace_buffer_returns_previous() {
        let mut sound = SoundObject::default();
        let buf = Arc::new(AudioBuffer::new("x", vec![0.0; 2], 2, 2));
        assert_eq!(sound.replace_buffer("x", Arc::clone(&buf)), None);
        assert_eq!(sound.replace_buffer("y", buf), Some("x".to_string()));
        assert!(!sound.is_spatial());
        assert_eq!(sound.take_buffer(), Some("y".to_string()));
        assert!(sound.is_spatial());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut sound = SoundObject::default();
        sound.attributes.set(Attribute::Gain(0.5));
        sound.playback = PlaybackState::Playing;

        let json = serde_json::to_string(&sound.snapshot()).expect("serialize");
        let back: SoundSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert!(back.playing);
        assert!((back.gain - 0.5).abs() < f32::EPSILON);
    }
}
