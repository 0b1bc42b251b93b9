//! Rideshare Payment — checkout sessions for assigned trips.
//!
//! Opens a hosted-checkout session once a driver accepts a trip, persists it
//! as an event-sourced `PaymentSession` and reconciles settlement events
//! published by the gateway's webhook.

pub mod application;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod rpc;
pub mod state;
