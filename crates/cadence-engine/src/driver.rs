//! Delivers frame notifications to the audio scheduler.

use cadence_audio::{AudioDevice, AudioManager, SoundEvent, SoundHandle};
use tracing::{debug, info, warn};

/// Owns the scheduler and calls its phases in order every tick.
#[derive(Debug)]
pub struct FrameDriver<D: AudioDevice> {
    audio: AudioManager<D>,
    paused: bool,
    frames: u64,
}

impl<D: AudioDevice> FrameDriver<D> {
    /// Drive a configured scheduler.
    pub fn new(audio: AudioManager<D>) -> Self {
        Self {
            audio,
            paused: false,
            frames: 0,
        }
    }

    /// Run one tick and return the events it produced.
    pub fn tick(&mut self, dt: f64) -> Vec<SoundEvent> {
        if self.paused {
            self.audio.paused_tick(dt);
        } else {
            self.audio.pre_frame(dt);
            self.audio.frame(dt);
            self.audio.post_frame(dt);
        }
        self.frames += 1;

        let events = self.audio.poll_events();
        for event in &events {
            debug!("{:?}", event);
        }
        events
    }

    /// Enter or leave the session pause.
    pub fn set_paused(&mut self, paused: bool) {
        if paused == self.paused {
            return;
        }
        self.paused = paused;
        if paused {
            self.audio.pause_begin();
        } else {
            self.audio.pause_end();
        }
    }

    /// Whether the session is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Ticks delivered so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Create one sound per file and request playback.
    ///
    /// Files that fail to load are logged and skipped.
    pub fn play_files<S: AsRef<str>>(&mut self, files: &[S]) -> Vec<SoundHandle> {
        let mut sounds = Vec::with_capacity(files.len());
        for file in files {
            let file = file.as_ref();
            let sound = self.audio.new_sound();
            match self.audio.set_buffer(sound, file) {
                Ok(()) => {
                    self.audio.play(sound);
                    info!("Queued '{}' as {}", file, sound);
                    sounds.push(sound);
                },
                Err(e) => {
                    warn!("Skipping '{}': {e}", file);
                    if let Err(e) = self.audio.free_sound(sound) {
                        warn!("Failed to free {}: {e}", sound);
                    }
                },
            }
        }
        sounds
    }

    /// The scheduler.
    #[must_use]
    pub const fn audio(&self) -> &AudioManager<D> {
        &self.audio
    }

    /// The scheduler, mutably.
    pub fn audio_mut(&mut self) -> &mut AudioManager<D> {
        &mut self.audio
    }

    /// Stop everything and hand back the scheduler.
    pub fn shutdown(mut self) -> AudioManager<D> {
        self.audio.shutdown();
        info!("Frame driver stopped after {} frames", self.frames);
        self.audio
    }
}
