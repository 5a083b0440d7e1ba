//! Application layer: live sessions, the phase pipeline, and handlers.

pub mod command_handlers;
pub mod config;
pub mod pipeline;
pub mod query_handlers;
pub mod registry;
pub mod services;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
