//! Transmission Core — shared abstractions.
//!
//! This crate defines the traits and value types the match engine depends
//! on: time, randomness, delays, identity, and the two outward-facing
//! collaborators (broadcast delivery and image search). It contains no game
//! rules and no transport code.

pub mod broadcast;
pub mod clock;
pub mod command;
pub mod error;
pub mod ids;
pub mod images;
pub mod rng;
pub mod timer;
