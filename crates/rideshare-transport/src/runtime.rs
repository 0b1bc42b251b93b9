//! Reusable service runtime.

use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::TransportError;
use crate::multiplexer::Multiplexer;
use crate::rpc;

/// One listener serving a service's HTTP and RPC routers.
///
/// `GET /` is reserved for the health endpoint; the HTTP router passed in
/// must not route `/` itself.
pub struct ServiceRuntime {
    name: &'static str,
    http: Router,
    rpc: Router,
}

impl ServiceRuntime {
    /// Creates a runtime for the service `name` (for example `"Trip Service"`)
    /// with its HTTP routes.
    #[must_use]
    pub fn new(name: &'static str, http: Router) -> Self {
        Self {
            name,
            http,
            rpc: Router::new(),
        }
    }

    /// Adds the RPC method routes.
    #[must_use]
    pub fn with_rpc(mut self, rpc: Router) -> Self {
        self.rpc = rpc;
        self
    }

    /// Builds the complete router: multiplexer, health route, request tracing
    /// and panic isolation.
    #[must_use]
    pub fn into_router(self) -> Router {
        let health = format!("{} is Healthy", self.name);
        let http = Router::new()
            .route(
                "/",
                get(move || {
                    let health = health.clone();
                    async move { health }
                }),
            )
            .merge(self.http);
        let rpc = self.rpc.fallback(rpc::unimplemented);

        Router::new()
            .fallback_service(Multiplexer::new(rpc, http))
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::new())
    }

    /// Serves on `listener` until `shutdown` is cancelled, then drains
    /// in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Serve` if the server loop fails.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), TransportError> {
        let name = self.name;
        let addr = listener.local_addr()?;
        let app = self.into_router();

        info!(service = name, %addr, "listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;
        info!(service = name, "listener stopped");
        Ok(())
    }
}

/// Binds a TCP listener.
///
/// # Errors
///
/// Returns `TransportError::Bind` if the address is unavailable.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, TransportError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })
}
