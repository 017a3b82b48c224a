//! Playback notifications.
//!
//! The manager records an event whenever a sound changes transport state on
//! a channel. Hosts drain them with
//! [`AudioManager::poll_events`](crate::manager::AudioManager::poll_events),
//! typically once per frame after `post_frame`.

use cadence_common::SoundHandle;

/// A transport change on a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundEvent {
    /// Bound to a channel and started.
    Started {
        /// The sound.
        sound: SoundHandle,
    },
    /// Paused by a command.
    Paused {
        /// The sound.
        sound: SoundHandle,
    },
    /// Resumed after a pause.
    Resumed {
        /// The sound.
        sound: SoundHandle,
    },
    /// Seeked back to the start.
    Rewound {
        /// The sound.
        sound: SoundHandle,
    },
    /// Stopped by a command or shutdown.
    Stopped {
        /// The sound.
        sound: SoundHandle,
    },
    /// Reached the end of a non-looping buffer.
    Finished {
        /// The sound.
        sound: SoundHandle,
    },
}

impl SoundEvent {
    /// The sound this event concerns.
    #[must_use]
    pub const fn sound(&self) -> SoundHandle {
        match self {
            Self::Started { sound }
            | Self::Paused { sound }
            | Self::Resumed { sound }
            | Self::Rewound { sound }
            | Self::Stopped { sound }
            | Self::Finished { sound } => *sound,
        }
    }

    /// Whether the sound gave up its channel.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped { .. } | Self::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_accessor() {
        let h = SoundHandle::new(3, 1);
        assert_eq!(SoundEvent::Rewound { sound: h }.sound(), h);
        assert!(SoundEvent::Finished { sound: h }.is_terminal());
        assert!(!SoundEvent::Started { sound: h }.is_terminal());
    }
}
