//! Error types for Cadence.

use std::path::PathBuf;

use thiserror::Error;

use crate::ids::SoundHandle;

/// Audio scheduler errors.
///
/// None of these are fatal to the frame pipeline; callers log them and carry on.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to initialize the audio device.
    #[error("Failed to initialize audio device: {0}")]
    DeviceInitFailed(String),

    /// The manager was used before `configure`.
    #[error("Audio manager not configured")]
    NotConfigured,

    /// `configure` was called a second time.
    #[error("Audio manager already configured")]
    AlreadyConfigured,

    /// Requested channel count cannot be provided.
    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(usize),

    /// Failed to read or find an audio file.
    #[error("Failed to load audio file '{path}': {message}")]
    LoadFailed {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Failed to decode audio data.
    #[error("Failed to decode audio: {0}")]
    DecodeFailed(String),

    /// The named buffer is not resident (never loaded, or already released).
    #[error("Audio buffer not loaded: {0}")]
    BufferNotLoaded(String),

    /// A buffer was registered with no samples.
    #[error("Audio buffer '{0}' has no samples")]
    BufferEmpty(String),

    /// Handle is null, stale or out of range.
    #[error("Invalid sound handle: {0}")]
    InvalidHandle(SoundHandle),

    /// Handle was already returned to the recycle pool.
    #[error("Sound freed twice: {0}")]
    DoubleFree(SoundHandle),
}

/// Result type alias for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::BufferNotLoaded("boom.wav".to_string());
        assert!(err.to_string().contains("boom.wav"));

        let err = AudioError::DoubleFree(SoundHandle::new(2, 5));
        assert!(err.to_string().contains("sound(2v5)"));
    }

    #[test]
    fn test_load_failed_names_path() {
        let err = AudioError::LoadFailed {
            path: PathBuf::from("sfx/door.ogg"),
            message: "not found".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("sfx/door.ogg"));
        assert!(text.contains("not found"));
    }
}
