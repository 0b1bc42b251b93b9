//! Domain layer for the payment context.

pub mod aggregates;
pub mod commands;
pub mod events;
