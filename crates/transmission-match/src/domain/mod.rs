//! Pure match state: no locks, no clocks, no I/O.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod images;
pub mod roles;
pub mod team;
