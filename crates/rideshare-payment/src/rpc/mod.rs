//! RPC surface of the payment service.

pub mod client;
pub mod proto;
pub mod server;
