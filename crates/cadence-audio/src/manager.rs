//! The audio scheduler.
//!
//! [`AudioManager`] multiplexes any number of logical sounds onto the fixed
//! channel pool of an [`AudioDevice`]. Game code only ever touches sounds
//! through handles: transport commands are queued on the sound, and nothing
//! reaches the hardware until the host runs the three frame phases.
//!
//! # Frame pipeline
//!
//! ```text
//!  pre_frame   drain every sound's command queue into pending transitions
//!  frame       advance the device, apply stop/pause/rewind, then start
//!              queued plays in request order while channels are free,
//!              then collect channels that ran out
//!  post_frame  return the channels of stopped sounds to the pool
//! ```
//!
//! Value setters are not queued. They update the sound's cached attributes
//! and, when the sound owns a channel, are pushed to it at once. A sound
//! that binds a channel later gets its whole attribute set replayed before
//! it starts.
//!
//! # Example
//!
//! ```
//! use cadence_audio::prelude::*;
//!
//! let mut audio = AudioManager::with_config(
//!     VirtualDevice::new(),
//!     AudioConfig::default().with_channels(4),
//! )?;
//! audio.insert_buffer("beep", vec![0.0; 4410], 44_100, 1)?;
//!
//! let beep = audio.new_sound();
//! audio.set_buffer(beep, "beep")?;
//! audio.set_gain(beep, 0.5);
//! audio.play(beep);
//!
//! audio.pre_frame(0.016);
//! audio.frame(0.016);
//! audio.post_frame(0.016);
//! assert!(audio.is_playing(beep));
//! # Ok::<(), AudioError>(())
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use cadence_common::{AudioError, AudioResult, ChannelId, SoundHandle};
use glam::Vec3;
use tracing::{debug, error, info, trace, warn};

use crate::attributes::Attribute;
use crate::buffer::BufferStore;
use crate::channel::ChannelPool;
use crate::config::AudioConfig;
use crate::device::{AudioDevice, ChannelStatus};
use crate::events::SoundEvent;
use crate::listener::{Listener, ListenerObject};
use crate::sound::{
    Command, PendingTransitions, PlaybackState, SoundObject, SoundPhase, SoundSnapshot,
};

#[derive(Debug, Default)]
struct SoundSlot {
    generation: u32,
    live: bool,
    sound: SoundObject,
}

/// Schedules sounds onto device channels.
#[derive(Debug)]
pub struct AudioManager<D: AudioDevice> {
    device: D,
    config: Option<AudioConfig>,
    buffers: BufferStore,
    channels: ChannelPool,
    slots: Vec<SoundSlot>,
    recycled: VecDeque<u32>,
    play_queue: VecDeque<SoundHandle>,
    pause_snapshot: Vec<(SoundHandle, PlaybackState)>,
    session_paused: bool,
    listener: ListenerObject,
    events: Vec<SoundEvent>,
}

impl<D: AudioDevice> AudioManager<D> {
    /// Wrap a device. No channels exist until [`configure`](Self::configure).
    pub fn new(device: D) -> Self {
        Self {
            device,
            config: None,
            buffers: BufferStore::new(),
            channels: ChannelPool::default(),
            slots: Vec::new(),
            recycled: VecDeque::new(),
            play_queue: VecDeque::new(),
            pause_snapshot: Vec::new(),
            session_paused: false,
            listener: ListenerObject::default(),
            events: Vec::new(),
        }
    }

    /// Wrap a device and configure it in one step.
    pub fn with_config(device: D, config: AudioConfig) -> AudioResult<Self> {
        let mut manager = Self::new(device);
        manager.configure(config)?;
        Ok(manager)
    }

    /// Open the channel pool. Must be called exactly once.
    pub fn configure(&mut self, mut config: AudioConfig) -> AudioResult<()> {
        if self.config.is_some() {
            warn!("Audio manager already configured, ignoring");
            return Err(AudioError::AlreadyConfigured);
        }
        if config.num_channels == 0 {
            return Err(AudioError::InvalidChannelCount(0));
        }
        config.validate();

        self.device.set_distance_model(config.distance_model);
        let opened = self.device.open_channels(config.num_channels)?;
        if opened < config.num_channels {
            warn!(
                "Requested {} channels, {} device provided {}",
                config.num_channels,
                self.device.name(),
                opened
            );
        }

        if config.extended_features && !self.device.enable_extended_features() {
            warn!(
                "Extended features unavailable on {} device",
                self.device.name()
            );
        }

        for attribute in self.listener.iter() {
            self.device.apply_listener(attribute);
        }
        self.buffers.set_search_paths(config.search_paths.clone());
        self.channels = ChannelPool::new(opened);

        info!(
            "Audio configured: {} channels on {} device ({} distance model)",
            opened,
            self.device.name(),
            config.distance_model.name()
        );
        self.config = Some(config);
        Ok(())
    }

    /// Whether [`configure`](Self::configure) has succeeded.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> Option<&AudioConfig> {
        self.config.as_ref()
    }

    /// The device.
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// The device, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    // ============================================
    // Buffers
    // ============================================

    /// The buffer store.
    #[must_use]
    pub const fn buffers(&self) -> &BufferStore {
        &self.buffers
    }

    /// Load a sound file, or take another reference to it.
    pub fn load_buffer(&mut self, name: &str) -> AudioResult<()> {
        self.buffers.load(name).map(drop).map_err(|e| {
            warn!("Failed to load '{}': {e}", name);
            e
        })
    }

    /// Register decoded samples under `name`.
    pub fn insert_buffer(
        &mut self,
        name: &str,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> AudioResult<()> {
        self.buffers
            .insert(name, samples, sample_rate, channels)
            .map(drop)
    }

    /// Drop one reference to a buffer, returning how many remain.
    ///
    /// Only references taken with [`load_buffer`](Self::load_buffer) or
    /// [`insert_buffer`](Self::insert_buffer) can be dropped here. References
    /// held by sounds are released by [`set_buffer`](Self::set_buffer) and
    /// [`free_sound`](Self::free_sound).
    pub fn unload_buffer(&mut self, name: &str) -> AudioResult<u32> {
        let held = self
            .slots
            .iter()
            .filter(|slot| slot.live && slot.sound.buffer_name() == Some(name))
            .count() as u32;
        if held > 0 && self.buffers.use_count(name) <= held {
            warn!("'{}' is only held by {} sounds, not unloading", name, held);
            return Err(AudioError::BufferNotLoaded(name.to_string()));
        }

        self.buffers.unload(name).map_err(|e| {
            warn!("Failed to unload '{}': {e}", name);
            e
        })
    }

    /// Mark a resident buffer as looping for sounds that bind it later.
    pub fn set_buffer_loop_default(&mut self, name: &str, looping: bool) -> AudioResult<()> {
        self.buffers.set_loop_default(name, looping)
    }

    // ============================================
    // Sound lifecycle
    // ============================================

    /// Create a sound, reusing a freed slot when one is available.
    pub fn new_sound(&mut self) -> SoundHandle {
        let index = match self.recycled.pop_front() {
            Some(index) => index as usize,
            None => {
                self.slots.push(SoundSlot::default());
                self.slots.len() - 1
            },
        };

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.live = true;
        slot.sound.clear();

        let handle = SoundHandle::new(index as u32, slot.generation);
        trace!("Created {}", handle);
        handle
    }

    /// Stop a sound, release its buffer reference and recycle it.
    ///
    /// Freeing a handle twice is a bug: debug builds panic, release builds
    /// log and return [`AudioError::DoubleFree`].
    pub fn free_sound(&mut self, handle: SoundHandle) -> AudioResult<()> {
        if handle.is_null() {
            return Err(AudioError::InvalidHandle(handle));
        }
        let index = handle.index() as usize;
        let Some(slot) = self.slots.get_mut(index) else {
            warn!("Ignoring free of unknown {}", handle);
            return Err(AudioError::InvalidHandle(handle));
        };
        if slot.generation != handle.generation() {
            warn!("Ignoring free of stale {}", handle);
            return Err(AudioError::InvalidHandle(handle));
        }
        if !slot.live {
            error!("{} freed twice", handle);
            if cfg!(debug_assertions) {
                panic!("{handle} freed twice");
            }
            return Err(AudioError::DoubleFree(handle));
        }

        if let Some(channel) = slot.sound.channel.take() {
            self.device.stop(channel);
            self.device.reset(channel);
            self.channels.release(channel);
        }
        let buffer = slot.sound.take_buffer();
        slot.sound.clear();
        slot.live = false;

        self.play_queue.retain(|h| *h != handle);
        self.pause_snapshot.retain(|(h, _)| *h != handle);
        self.recycled.push_back(index as u32);

        if let Some(name) = buffer {
            if let Err(e) = self.buffers.unload(&name) {
                debug!("{} held '{}' which was already released: {e}", handle, name);
            }
        }
        debug!("Freed {}", handle);
        Ok(())
    }

    /// Bind a buffer to a sound, loading it if necessary.
    ///
    /// The previously bound buffer loses a reference. On failure the sound
    /// keeps its current buffer.
    pub fn set_buffer(&mut self, handle: SoundHandle, name: &str) -> AudioResult<()> {
        if self.config.is_none() {
            warn!("Cannot bind '{}' to {} before configure", name, handle);
            return Err(AudioError::NotConfigured);
        }
        let index = self
            .live_index(handle)
            .ok_or(AudioError::InvalidHandle(handle))?;

        let buffer = self.buffers.load(name).map_err(|e| {
            warn!("Failed to load '{}' for {}: {e}", name, handle);
            e
        })?;
        let loop_default = self.buffers.loop_default(name);

        let sound = &mut self.slots[index].sound;
        let previous = sound.replace_buffer(name, buffer);
        if loop_default {
            let stored = sound.attributes.set(Attribute::Looping(true));
            if let Some(channel) = sound.channel {
                self.device.apply(channel, stored);
            }
        }

        if let Some(previous) = previous {
            if let Err(e) = self.buffers.unload(&previous) {
                debug!("Previous buffer '{}' already released: {e}", previous);
            }
        }
        debug!("{} bound to '{}'", handle, name);
        Ok(())
    }

    /// Look up a live sound.
    #[must_use]
    pub fn sound(&self, handle: SoundHandle) -> Option<&SoundObject> {
        self.index_of(handle).map(|index| &self.slots[index].sound)
    }

    // ============================================
    // Transport commands
    // ============================================

    /// Queue a play (or resume) request.
    pub fn play(&mut self, handle: SoundHandle) {
        self.command(handle, Command::Play);
    }

    /// Queue a pause request.
    pub fn pause(&mut self, handle: SoundHandle) {
        self.command(handle, Command::Pause);
    }

    /// Queue a stop request.
    pub fn stop(&mut self, handle: SoundHandle) {
        self.command(handle, Command::Stop);
    }

    /// Queue a rewind request.
    pub fn rewind(&mut self, handle: SoundHandle) {
        self.command(handle, Command::Rewind);
    }

    /// Queue a transport command for the next `pre_frame`.
    pub fn command(&mut self, handle: SoundHandle, command: Command) {
        if self.config.is_none() {
            warn!("Dropping {:?} for {}: audio not configured", command, handle);
            return;
        }
        if let Some(index) = self.live_index(handle) {
            self.slots[index].sound.commands.push_back(command);
        }
    }

    // ============================================
    // Attributes
    // ============================================

    /// Set any attribute. Applied to the channel at once if one is bound.
    pub fn set_attribute(&mut self, handle: SoundHandle, attribute: Attribute) {
        let Some(index) = self.live_index(handle) else {
            return;
        };
        let sound = &mut self.slots[index].sound;

        if !sound.is_spatial()
            && matches!(attribute, Attribute::Position(_) | Attribute::Relative(true))
        {
            warn!("{} plays a multi-channel buffer and will not be positioned", handle);
        }
        if !attribute.is_finite() {
            warn!("{} got non-finite {:?}, using the default", handle, attribute);
        }

        let stored = sound.attributes.set(attribute);
        if let Some(channel) = sound.channel {
            self.device.apply(channel, stored);
        }
    }

    /// Set the gain (clamped to 0.0-1.0).
    pub fn set_gain(&mut self, handle: SoundHandle, gain: f32) {
        self.set_attribute(handle, Attribute::Gain(gain));
    }

    /// Set the pitch multiplier.
    pub fn set_pitch(&mut self, handle: SoundHandle, pitch: f32) {
        self.set_attribute(handle, Attribute::Pitch(pitch));
    }

    /// Enable or disable looping.
    pub fn set_looping(&mut self, handle: SoundHandle, looping: bool) {
        self.set_attribute(handle, Attribute::Looping(looping));
    }

    /// Make the position relative to the listener.
    pub fn set_relative(&mut self, handle: SoundHandle, relative: bool) {
        self.set_attribute(handle, Attribute::Relative(relative));
    }

    /// Set the position.
    pub fn set_position(&mut self, handle: SoundHandle, position: Vec3) {
        self.set_attribute(handle, Attribute::Position(position));
    }

    /// Set the facing direction.
    pub fn set_direction(&mut self, handle: SoundHandle, direction: Vec3) {
        self.set_attribute(handle, Attribute::Direction(direction));
    }

    /// Set the velocity.
    pub fn set_velocity(&mut self, handle: SoundHandle, velocity: Vec3) {
        self.set_attribute(handle, Attribute::Velocity(velocity));
    }

    /// Set the distance at which attenuation begins.
    pub fn set_reference_distance(&mut self, handle: SoundHandle, distance: f32) {
        self.set_attribute(handle, Attribute::ReferenceDistance(distance));
    }

    /// Set the distance beyond which attenuation stops.
    pub fn set_max_distance(&mut self, handle: SoundHandle, distance: f32) {
        self.set_attribute(handle, Attribute::MaxDistance(distance));
    }

    /// Set the rolloff factor.
    pub fn set_rolloff(&mut self, handle: SoundHandle, rolloff: f32) {
        self.set_attribute(handle, Attribute::Rolloff(rolloff));
    }

    /// Set the gain floor.
    pub fn set_min_gain(&mut self, handle: SoundHandle, gain: f32) {
        self.set_attribute(handle, Attribute::MinGain(gain));
    }

    /// Set the gain ceiling.
    pub fn set_max_gain(&mut self, handle: SoundHandle, gain: f32) {
        self.set_attribute(handle, Attribute::MaxGain(gain));
    }

    /// Set where playback starts, in seconds, clamped to the play duration.
    pub fn set_play_offset(&mut self, handle: SoundHandle, seconds: f32) {
        let Some(index) = self.live_index(handle) else {
            return;
        };
        let sound = &mut self.slots[index].sound;

        let limit = sound.duration_of_play();
        let offset = if seconds.is_finite() {
            seconds.max(0.0).min(limit)
        } else {
            0.0
        };
        sound.play_offset = offset;
        if let Some(channel) = sound.channel {
            self.device.seek(channel, Duration::from_secs_f32(offset));
        }
    }

    /// Seconds the bound buffer takes to play at the current pitch.
    #[must_use]
    pub fn duration_of_play(&self, handle: SoundHandle) -> Option<f32> {
        self.sound(handle).map(SoundObject::duration_of_play)
    }

    /// Whether the sound is playing.
    #[must_use]
    pub fn is_playing(&self, handle: SoundHandle) -> bool {
        self.playback(handle) == Some(PlaybackState::Playing)
    }

    /// Whether the sound is paused.
    #[must_use]
    pub fn is_paused(&self, handle: SoundHandle) -> bool {
        self.playback(handle) == Some(PlaybackState::Paused)
    }

    /// Whether the sound is stopped.
    #[must_use]
    pub fn is_stopped(&self, handle: SoundHandle) -> bool {
        self.playback(handle) == Some(PlaybackState::Stopped)
    }

    /// Whether the sound loops.
    #[must_use]
    pub fn is_looping(&self, handle: SoundHandle) -> bool {
        self.sound(handle).is_some_and(|s| s.attributes.looping)
    }

    /// Whether the sound's position is listener-relative.
    #[must_use]
    pub fn is_listener_relative(&self, handle: SoundHandle) -> bool {
        self.sound(handle).is_some_and(|s| s.attributes.relative)
    }

    /// Pipeline phase of a sound.
    #[must_use]
    pub fn phase(&self, handle: SoundHandle) -> Option<SoundPhase> {
        self.sound(handle).map(SoundObject::phase)
    }

    fn playback(&self, handle: SoundHandle) -> Option<PlaybackState> {
        self.sound(handle).map(SoundObject::playback)
    }

    /// Capture gain, pitch and playing flag.
    #[must_use]
    pub fn snapshot(&self, handle: SoundHandle) -> Option<SoundSnapshot> {
        self.sound(handle).map(SoundObject::snapshot)
    }

    /// Reapply a snapshot. Play or Stop is queued only if the flag differs.
    pub fn restore(&mut self, handle: SoundHandle, snapshot: &SoundSnapshot) {
        if self.live_index(handle).is_none() {
            return;
        }
        self.set_gain(handle, snapshot.gain);
        self.set_pitch(handle, snapshot.pitch);

        match (self.is_playing(handle), snapshot.playing) {
            (false, true) => self.play(handle),
            (true, false) => self.stop(handle),
            _ => {},
        }
    }

    // ============================================
    // Listener
    // ============================================

    /// Write access to the listener; changes reach the device immediately.
    pub fn listener(&mut self) -> Listener<'_, D> {
        Listener::new(&mut self.listener, &mut self.device)
    }

    /// Cached listener state.
    #[must_use]
    pub const fn listener_state(&self) -> &ListenerObject {
        &self.listener
    }

    // ============================================
    // Frame phases
    // ============================================

    /// Drain every sound's command queue into pending transitions.
    pub fn pre_frame(&mut self, _dt: f64) {
        for index in 0..self.slots.len() {
            if !self.slots[index].live {
                continue;
            }
            let handle = self.handle_at(index);
            while let Some(command) = self.slots[index].sound.commands.pop_front() {
                self.route(index, handle, command);
            }
        }
    }

    /// Advance the device, apply transitions and hand out channels.
    pub fn frame(&mut self, dt: f64) {
        self.device.advance(dt);
        self.apply_transitions();
        self.start_queued();
        self.collect_finished();
    }

    /// Return channels of stopped sounds to the pool.
    pub fn post_frame(&mut self, _dt: f64) {
        for slot in self.slots.iter_mut().filter(|slot| slot.live) {
            let sound = &mut slot.sound;
            if sound.phase != SoundPhase::PendingCleanup {
                continue;
            }
            if let Some(channel) = sound.channel.take() {
                self.device.reset(channel);
                self.channels.release(channel);
            }
            sound.phase = if sound.pending.play {
                SoundPhase::Queued
            } else {
                SoundPhase::Inactive
            };
        }
    }

    /// Run all three phases while a session pause is in effect.
    ///
    /// Sounds started during the pause play normally; sounds held by
    /// [`pause_begin`](Self::pause_begin) stay paused.
    pub fn paused_tick(&mut self, dt: f64) {
        self.pre_frame(dt);
        self.frame(dt);
        self.post_frame(dt);
    }

    /// Pause every playing sound, remembering what each one was doing.
    pub fn pause_begin(&mut self) {
        if self.session_paused {
            debug!("Audio already paused");
            return;
        }
        self.session_paused = true;
        self.pause_snapshot.clear();

        let mut held = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.live {
                continue;
            }
            let handle = SoundHandle::new(index as u32, slot.generation);
            let sound = &mut slot.sound;
            self.pause_snapshot.push((handle, sound.playback));

            if sound.playback == PlaybackState::Playing {
                if let Some(channel) = sound.channel {
                    self.device.pause(channel);
                    sound.playback = PlaybackState::Paused;
                    held += 1;
                }
            }
        }
        info!("Audio paused ({} sounds held)", held);
    }

    /// Resume exactly the sounds that were playing at `pause_begin`.
    pub fn pause_end(&mut self) {
        if !self.session_paused {
            debug!("Audio not paused");
            return;
        }
        self.session_paused = false;

        let mut resumed = 0;
        for (handle, state) in std::mem::take(&mut self.pause_snapshot) {
            if state != PlaybackState::Playing {
                continue;
            }
            let Some(index) = self.index_of(handle) else {
                continue;
            };
            let sound = &mut self.slots[index].sound;
            if sound.phase != SoundPhase::Active || sound.playback != PlaybackState::Paused {
                continue;
            }
            if let Some(channel) = sound.channel {
                self.device.play(channel);
                sound.playback = PlaybackState::Playing;
                resumed += 1;
            }
        }
        info!("Audio resumed ({} sounds)", resumed);
    }

    /// Whether a session pause is in effect.
    #[must_use]
    pub const fn is_session_paused(&self) -> bool {
        self.session_paused
    }

    /// Stop every sound and return every channel. Handles stay valid.
    pub fn shutdown(&mut self) {
        let mut stopped = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.live {
                continue;
            }
            let handle = SoundHandle::new(index as u32, slot.generation);
            let sound = &mut slot.sound;

            if let Some(channel) = sound.channel.take() {
                self.device.stop(channel);
                self.device.reset(channel);
                self.channels.release(channel);
                if sound.phase == SoundPhase::Active {
                    self.events.push(SoundEvent::Stopped { sound: handle });
                    stopped += 1;
                }
            }
            sound.commands.clear();
            sound.pending = PendingTransitions::default();
            sound.phase = SoundPhase::Inactive;
            sound.playback = PlaybackState::Stopped;
        }

        self.play_queue.clear();
        self.pause_snapshot.clear();
        self.session_paused = false;
        if self.config.is_some() {
            info!("Audio shut down ({} sounds stopped)", stopped);
        }
    }

    /// Take every event recorded since the last call.
    pub fn poll_events(&mut self) -> Vec<SoundEvent> {
        std::mem::take(&mut self.events)
    }

    // ============================================
    // Statistics
    // ============================================

    /// Sounds currently handed out.
    #[must_use]
    pub fn live_sounds(&self) -> usize {
        self.slots.iter().filter(|slot| slot.live).count()
    }

    /// Freed sounds waiting to be reused.
    #[must_use]
    pub fn recycled_sounds(&self) -> usize {
        self.recycled.len()
    }

    /// Channels not owned by any sound.
    #[must_use]
    pub fn free_channels(&self) -> usize {
        self.channels.available_count()
    }

    /// Channels currently started.
    #[must_use]
    pub fn active_channels(&self) -> usize {
        self.channels.active_count()
    }

    /// Play requests waiting for a channel.
    #[must_use]
    pub fn queued_plays(&self) -> usize {
        self.play_queue.len()
    }

    // ============================================
    // Internals
    // ============================================

    fn index_of(&self, handle: SoundHandle) -> Option<usize> {
        if handle.is_null() {
            return None;
        }
        let index = handle.index() as usize;
        let slot = self.slots.get(index)?;
        (slot.live && slot.generation == handle.generation()).then_some(index)
    }

    /// Like `index_of`, but logs rejected handles.
    fn live_index(&self, handle: SoundHandle) -> Option<usize> {
        let index = self.index_of(handle);
        if index.is_none() {
            if handle.is_null() {
                trace!("Ignoring null sound handle");
            } else {
                warn!("Ignoring invalid {}", handle);
            }
        }
        index
    }

    fn handle_at(&self, index: usize) -> SoundHandle {
        SoundHandle::new(index as u32, self.slots[index].generation)
    }

    fn route(&mut self, index: usize, handle: SoundHandle, command: Command) {
        let sound = &mut self.slots[index].sound;
        match command {
            Command::Play => {
                if sound.buffer.is_none() {
                    warn!("{} has no buffer, ignoring play", handle);
                    return;
                }
                let wanted = match sound.phase {
                    SoundPhase::Inactive => {
                        sound.phase = SoundPhase::Queued;
                        true
                    },
                    SoundPhase::Queued | SoundPhase::PendingCleanup => true,
                    SoundPhase::Active => {
                        sound.playback == PlaybackState::Paused
                            || sound.pending.pause
                            || sound.pending.stop
                    },
                };
                if wanted && !sound.pending.play {
                    sound.pending.play = true;
                    self.play_queue.push_back(handle);
                }
            },
            Command::Stop => {
                sound.pending.stop = true;
                sound.pending.pause = false;
                sound.pending.rewind = false;
                if sound.pending.play {
                    sound.pending.play = false;
                    self.play_queue.retain(|h| *h != handle);
                }
                if sound.phase == SoundPhase::Queued {
                    sound.phase = SoundPhase::Inactive;
                }
            },
            Command::Pause => {
                if sound.phase == SoundPhase::Active {
                    sound.pending.pause = true;
                } else {
                    trace!("{} has no channel, ignoring pause", handle);
                }
            },
            Command::Rewind => {
                if sound.phase == SoundPhase::Active {
                    sound.pending.rewind = true;
                }
            },
        }
    }

    fn apply_transitions(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.live || !slot.sound.pending.any_before_play() {
                continue;
            }
            let handle = SoundHandle::new(index as u32, slot.generation);
            let sound = &mut slot.sound;
            let play = sound.pending.play;
            let pending = std::mem::replace(
                &mut sound.pending,
                PendingTransitions {
                    play,
                    ..PendingTransitions::default()
                },
            );

            let Some(channel) = sound.channel else {
                continue;
            };
            if sound.phase != SoundPhase::Active {
                continue;
            }

            if pending.stop {
                self.device.stop(channel);
                self.channels.finish(channel);
                sound.phase = SoundPhase::PendingCleanup;
                sound.playback = PlaybackState::Stopped;
                debug!("{} stopped on {}", handle, channel);
                self.events.push(SoundEvent::Stopped { sound: handle });
                continue;
            }

            if pending.pause && sound.playback == PlaybackState::Playing {
                self.device.pause(channel);
                sound.playback = PlaybackState::Paused;
                self.events.push(SoundEvent::Paused { sound: handle });
            }

            if pending.rewind {
                self.device.rewind(channel);
                self.events.push(SoundEvent::Rewound { sound: handle });
            }
        }
    }

    fn start_queued(&mut self) {
        let mut deferred = VecDeque::new();

        while let Some(handle) = self.play_queue.pop_front() {
            let Some(index) = self.index_of(handle) else {
                continue;
            };
            let sound = &mut self.slots[index].sound;
            if !sound.pending.play {
                continue;
            }

            match sound.phase {
                SoundPhase::Active => {
                    sound.pending.play = false;
                    if sound.playback == PlaybackState::Paused {
                        if let Some(channel) = sound.channel {
                            self.device.play(channel);
                            sound.playback = PlaybackState::Playing;
                            self.events.push(SoundEvent::Resumed { sound: handle });
                        }
                    }
                },
                // Old channel goes back in post_frame; start on the next frame
                SoundPhase::PendingCleanup => deferred.push_back(handle),
                SoundPhase::Inactive | SoundPhase::Queued => {
                    let Some(buffer) = sound.buffer.clone() else {
                        sound.pending.play = false;
                        sound.phase = SoundPhase::Inactive;
                        continue;
                    };
                    let Some(channel) = self.channels.acquire(handle) else {
                        trace!("No free channel for {}", handle);
                        sound.phase = SoundPhase::Queued;
                        deferred.push_back(handle);
                        continue;
                    };

                    self.device.bind(channel, &buffer);
                    for attribute in sound.attributes.iter() {
                        self.device.apply(channel, attribute);
                    }
                    if sound.play_offset > 0.0 {
                        self.device
                            .seek(channel, Duration::from_secs_f32(sound.play_offset));
                    }
                    self.device.play(channel);
                    self.channels.start(channel);

                    sound.channel = Some(channel);
                    sound.phase = SoundPhase::Active;
                    sound.playback = PlaybackState::Playing;
                    sound.pending.play = false;
                    debug!("{} started on {}", handle, channel);
                    self.events.push(SoundEvent::Started { sound: handle });
                },
            }
        }

        self.play_queue = deferred;
    }

    fn collect_finished(&mut self) {
        let finished: Vec<ChannelId> = self
            .channels
            .active()
            .filter(|&channel| self.device.status(channel) == ChannelStatus::Stopped)
            .collect();

        for channel in finished {
            let Some(handle) = self.channels.owner(channel) else {
                continue;
            };
            let Some(index) = self.index_of(handle) else {
                continue;
            };
            let sound = &mut self.slots[index].sound;

            self.channels.finish(channel);
            sound.phase = SoundPhase::PendingCleanup;
            sound.playback = PlaybackState::Stopped;
            debug!("{} finished on {}", handle, channel);
            self.events.push(SoundEvent::Finished { sound: handle });
        }
    }
}

impl<D: AudioDevice> Drop for AudioManager<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
