//! RPC surface of the trip service.

pub mod client;
pub mod proto;
pub mod server;
