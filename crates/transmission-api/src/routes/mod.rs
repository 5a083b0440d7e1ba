//! Route modules.

pub mod health;
pub mod sessions;
pub mod ws;
