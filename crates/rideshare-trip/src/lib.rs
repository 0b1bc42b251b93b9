//! Rideshare Trip — the trip lifecycle bounded context.
//!
//! Owns the trip state machine. Trips are created over RPC, then advanced by
//! broker events from driver matching and payment. Previews are stateless.

pub mod application;
pub mod config;
pub mod domain;
pub mod routes;
pub mod rpc;
pub mod state;
