//! Rideshare Gateway — the externally reachable entry point.
//!
//! Adapts REST requests into calls on the internal services and turns
//! verified payment-provider webhooks into broker events.

pub mod config;
pub mod error;
pub mod routes;
pub mod signature;
pub mod state;
pub mod webhook;
