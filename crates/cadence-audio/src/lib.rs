//! # Cadence Audio
//!
//! Frame-synchronized audio resource scheduler.
//!
//! Game code creates any number of logical sounds; the scheduler shares a
//! small, fixed pool of hardware channels between them:
//! - Reference-counted decoded buffers, keyed by file name
//! - A channel pool in which each channel runs a small state machine
//! - Sounds with queued transport commands and cached attributes
//! - One listener, applied to the device immediately
//! - A device boundary with a rodio backend and a deterministic virtual one
//!
//! ## Frame phases
//!
//! The host calls [`AudioManager::pre_frame`], [`AudioManager::frame`] and
//! [`AudioManager::post_frame`] once per tick, in that order. Commands issued
//! between two `pre_frame` calls form one window and are applied together.
//! During a session pause the host brackets the pause with
//! [`AudioManager::pause_begin`] / [`AudioManager::pause_end`] and calls
//! [`AudioManager::paused_tick`] instead.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod attributes;
pub mod buffer;
pub mod channel;
pub mod config;
pub mod device;
pub mod events;
pub mod listener;
pub mod manager;
pub mod rodio_device;
pub mod sound;
pub mod spatial;
pub mod virtual_device;

/// Prelude for convenient imports
pub mod prelude {
    pub use cadence_common::{AudioError, AudioResult, ChannelId, SoundHandle};

    pub use crate::attributes::{Attribute, SoundAttributes};
    pub use crate::buffer::{AudioBuffer, BufferStore};
    pub use crate::channel::{ChannelPool, ChannelState};
    pub use crate::config::AudioConfig;
    pub use crate::device::{AudioDevice, ChannelStatus};
    pub use crate::events::SoundEvent;
    pub use crate::listener::{Listener, ListenerAttribute, ListenerObject};
    pub use crate::manager::AudioManager;
    pub use crate::rodio_device::RodioDevice;
    pub use crate::sound::{Command, PlaybackState, SoundObject, SoundPhase, SoundSnapshot};
    pub use crate::spatial::DistanceModel;
    pub use crate::virtual_device::VirtualDevice;
}

pub use prelude::*;
