//! Application layer for the trip context.

pub mod command_handlers;
pub mod consumer;
pub mod query_handlers;
