//! Rideshare Transport — one listener per service.
//!
//! Every service serves its RPC interface and its small HTTP surface on the
//! same port. [`multiplexer::Multiplexer`] decides per request which side
//! handles it; [`runtime::ServiceRuntime`] adds the health endpoint, request
//! tracing, panic isolation and graceful shutdown around it.

pub mod config;
pub mod error;
pub mod http;
pub mod multiplexer;
pub mod rpc;
pub mod runtime;
pub mod shutdown;
pub mod telemetry;
