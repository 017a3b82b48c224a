//! ID types for sounds and hardware channels.

use serde::{Deserialize, Serialize};

/// Handle to a logical sound owned by the audio manager.
///
/// Handles are generational: a slot that is recycled and handed out again
/// receives a new generation, so a handle kept past `free_sound` no longer
/// resolves to the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundHandle {
    index: u32,
    generation: u32,
}

impl SoundHandle {
    /// Null/invalid sound handle.
    pub const NULL: Self = Self {
        index: u32::MAX,
        generation: 0,
    };

    /// Creates a handle from a slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation of the slot when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Checks if this is the null handle.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == u32::MAX
    }
}

impl Default for SoundHandle {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for SoundHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "sound(null)")
        } else {
            write!(f, "sound({}v{})", self.index, self.generation)
        }
    }
}

/// Identifier for a hardware playback channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(u16);

impl ChannelId {
    /// Creates a channel ID from a raw value.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns the ID as a pool index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(SoundHandle::NULL.is_null());
        assert!(SoundHandle::default().is_null());
        assert!(!SoundHandle::new(0, 0).is_null());
    }

    #[test]
    fn test_handle_generations_differ() {
        let a = SoundHandle::new(3, 1);
        let b = SoundHandle::new(3, 2);
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
    }

    #[test]
    fn test_display() {
        assert_eq!(SoundHandle::new(4, 2).to_string(), "sound(4v2)");
        assert_eq!(SoundHandle::NULL.to_string(), "sound(null)");
        assert_eq!(ChannelId::new(7).to_string(), "channel#7");
    }
}
