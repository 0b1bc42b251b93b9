//! Rideshare Messaging — how services talk over the broker.
//!
//! Producers and consumers share only what lives here: topic names, the
//! [`envelope::Envelope`] wire shape, per-topic payload contracts and the
//! acknowledgement rules. Delivery is at-least-once; every consumer must be
//! idempotent.

pub mod amqp;
pub mod bus;
pub mod contracts;
pub mod envelope;
pub mod error;
pub mod reconnect;
pub mod redelivery;
pub mod supervisor;
pub mod topics;
