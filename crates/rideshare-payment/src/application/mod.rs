//! Application layer for the payment context.

pub mod command_handlers;
pub mod orchestrator;
pub mod query_handlers;
