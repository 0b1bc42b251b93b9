//! Rideshare Driver — who drives which trip.
//!
//! Keeps the in-memory registry of online drivers, matches each new trip to a
//! driver of the requested ride package and announces the result on the
//! broker.

pub mod application;
pub mod config;
pub mod domain;
pub mod rpc;
