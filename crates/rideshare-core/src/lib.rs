//! Rideshare Core — shared domain abstractions.
//!
//! This crate defines the traits and types every service depends on: the
//! aggregate/event/repository ports used for persistence, the error taxonomy
//! shared across the saga, and small concurrency helpers. It contains no
//! network or database code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod deadline;
pub mod error;
pub mod event;
pub mod geo;
pub mod lock;
pub mod payment;
pub mod repository;
pub mod rng;
