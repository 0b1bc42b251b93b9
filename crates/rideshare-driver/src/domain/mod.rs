//! Domain layer for driver matching.

pub mod registry;
