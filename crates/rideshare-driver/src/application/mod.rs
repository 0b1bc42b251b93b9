//! Application layer for driver matching.

pub mod consumer;
