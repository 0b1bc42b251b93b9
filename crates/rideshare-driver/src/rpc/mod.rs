//! RPC surface of the driver service.

pub mod client;
pub mod proto;
pub mod server;
