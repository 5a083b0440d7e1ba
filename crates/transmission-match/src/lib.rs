//! Transmission — match bounded context.
//!
//! Responsible for session lifecycle: team formation, the automatically
//! triggered phase pipeline (announce, image selection, role briefing,
//! timeout), relay of draw commands along a team, and first-vote-wins
//! resolution.

pub mod application;
pub mod domain;
