//! Routes each request to the RPC router or the HTTP router.

use std::convert::Infallible;
use std::task::{Context, Poll};

use axum::Router;
use axum::extract::Request;
use axum::http::{Version, header};
use axum::response::Response;
use futures_util::future::BoxFuture;
use tower::{Service, ServiceExt};
use tracing::debug;

/// Content-type prefix that marks RPC framing.
pub const RPC_CONTENT_TYPE_PREFIX: &str = "application/grpc";

/// Which side of the multiplexer handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The RPC server.
    Rpc,
    /// The plain HTTP router.
    Http,
}

/// Decides the route from the protocol version and content type only.
///
/// The body is never read: RPC frames are streamed to the RPC side as-is.
#[must_use]
pub fn classify(request: &Request) -> Route {
    let is_rpc_content = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(RPC_CONTENT_TYPE_PREFIX));

    if request.version() == Version::HTTP_2 && is_rpc_content {
        Route::Rpc
    } else {
        Route::Http
    }
}

/// A tower service holding both routers.
#[derive(Clone)]
pub struct Multiplexer {
    rpc: Router,
    http: Router,
}

impl Multiplexer {
    /// Builds a multiplexer from the two routers.
    ///
    /// Requests no router matches get whatever the chosen router's fallback
    /// returns (404 for plain axum routers).
    #[must_use]
    pub fn new(rpc: Router, http: Router) -> Self {
        Self { rpc, http }
    }
}

impl Service<Request> for Multiplexer {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let route = classify(&request);
        debug!(
            ?route,
            method = %request.method(),
            path = request.uri().path(),
            version = ?request.version(),
            "multiplexer routing decision"
        );

        let router = match route {
            Route::Rpc => self.rpc.clone(),
            Route::Http => self.http.clone(),
        };
        Box::pin(router.oneshot(request))
    }
}
