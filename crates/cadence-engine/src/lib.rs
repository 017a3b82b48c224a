//! Cadence host - drives the audio scheduler from a frame loop.
//!
//! This crate provides the host side of the scheduler: configuration loading,
//! frame timing, and the driver that calls the frame phases in order.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod driver;
pub mod timing;
