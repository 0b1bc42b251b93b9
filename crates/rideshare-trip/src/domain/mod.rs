//! Domain layer for the trip context.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod pricing;
