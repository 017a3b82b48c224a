//! # Cadence Common
//!
//! Shared types for the Cadence audio scheduler.
//!
//! This crate provides the foundational types used across Cadence crates:
//! - Handle types (`SoundHandle`, `ChannelId`)
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;
