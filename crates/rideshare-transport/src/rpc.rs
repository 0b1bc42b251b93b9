//! Unary RPC over the multiplexed listener.
//!
//! Server methods are ordinary axum handlers mounted at
//! `/<package>.<Service>/<Method>`; [`unary`] decodes the framed request,
//! runs the handler and encodes the framed response with trailers.

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use rideshare_core::error::DomainError;
use tonic::Status;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

use crate::error::RpcError;

struct Unary<F>(Option<F>);

impl<Req, Res, F, Fut> tonic::server::UnaryService<Req> for Unary<F>
where
    F: FnOnce(Req) -> Fut,
    Fut: Future<Output = Result<Res, Status>> + Send + 'static,
{
    type Response = Res;
    type Future = BoxFuture<'static, Result<tonic::Response<Res>, Status>>;

    fn call(&mut self, request: tonic::Request<Req>) -> Self::Future {
        match self.0.take() {
            Some(handler) => {
                let fut = handler(request.into_inner());
                Box::pin(async move { fut.await.map(tonic::Response::new) })
            }
            None => Box::pin(async { Err(Status::internal("unary handler already consumed")) }),
        }
    }
}

/// Serves one unary call: decode `Req`, run `handler`, encode `Res`.
pub fn unary<Req, Res, F, Fut>(request: Request, handler: F) -> impl Future<Output = Response> + Send
where
    Req: prost::Message + Default + Send + 'static,
    Res: prost::Message + Send + 'static,
    F: FnOnce(Req) -> Fut + Send,
    Fut: Future<Output = Result<Res, Status>> + Send + 'static,
{
    async move {
        let mut grpc = tonic::server::Grpc::new(ProstCodec::<Res, Req>::default());
        grpc.unary(Unary(Some(handler)), request)
            .await
            .map(Body::new)
    }
}

/// Fallback for RPC paths no method is mounted at.
pub async fn unimplemented(request: Request) -> Response {
    Status::unimplemented(format!("unknown method {}", request.uri().path()))
        .into_http::<Body>()
        .into_response()
}

/// Maps a domain error to an RPC status.
#[must_use]
pub fn status_from_domain(err: &DomainError) -> Status {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => Status::invalid_argument(message),
        DomainError::AggregateNotFound(_) => Status::not_found(message),
        DomainError::ConcurrencyConflict { .. }
        | DomainError::OutOfOrder { .. }
        | DomainError::InvalidTransition { .. } => Status::aborted(message),
        DomainError::DuplicateEvent { .. } => Status::already_exists(message),
        DomainError::Dependency(_) => Status::unavailable(message),
    }
}

/// Timeouts applied to outbound channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcTimeouts {
    /// Per-request deadline.
    pub request: Duration,
    /// TCP/TLS connect deadline.
    pub connect: Duration,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(5),
            connect: Duration::from_secs(2),
        }
    }
}

/// Normalizes a service URL: a bare `host:port` means plaintext.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    if url.contains("://") {
        url.to_owned()
    } else {
        format!("http://{url}")
    }
}

/// Opens a fresh channel to `url`. `https://` URLs use TLS with the
/// bundled web PKI roots; everything else is plaintext HTTP/2.
///
/// # Errors
///
/// Returns `RpcError::InvalidUrl` for a malformed URL and
/// `RpcError::Connect` if the connection cannot be established.
pub async fn connect(url: &str, timeouts: RpcTimeouts) -> Result<Channel, RpcError> {
    let uri = normalize_url(url);
    let mut endpoint = Endpoint::from_shared(uri.clone())
        .map_err(|e| RpcError::InvalidUrl {
            url: uri.clone(),
            reason: e.to_string(),
        })?
        .timeout(timeouts.request)
        .connect_timeout(timeouts.connect);

    if uri.starts_with("https://") {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new().with_webpki_roots())
            .map_err(|e| RpcError::InvalidUrl {
                url: uri.clone(),
                reason: e.to_string(),
            })?;
    }

    debug!(url = %uri, "connecting rpc channel");
    endpoint.connect().await.map_err(|e| RpcError::Connect {
        url: uri,
        reason: e.to_string(),
    })
}

/// Calls a unary method at `path` over `channel`.
///
/// # Errors
///
/// Returns `RpcError::Status` with the server's status on failure.
pub async fn call<Req, Res>(channel: Channel, path: &'static str, message: Req) -> Result<Res, RpcError>
where
    Req: prost::Message + Send + Sync + 'static,
    Res: prost::Message + Default + Send + Sync + 'static,
{
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|e| Status::unavailable(format!("service not ready: {e}")))?;
    let response = grpc
        .unary(
            tonic::Request::new(message),
            PathAndQuery::from_static(path),
            ProstCodec::<Req, Res>::default(),
        )
        .await?;
    Ok(response.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_bare_host_is_plaintext() {
        assert_eq!(normalize_url("trip-service:8080"), "http://trip-service:8080");
        assert_eq!(
            normalize_url("https://trips.example.com"),
            "https://trips.example.com"
        );
    }

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let id = Uuid::new_v4();
        assert_eq!(
            status_from_domain(&DomainError::Validation("bad".into())).code(),
            tonic::Code::InvalidArgument
        );
        assert_eq!(
            status_from_domain(&DomainError::AggregateNotFound(id)).code(),
            tonic::Code::NotFound
        );
        assert_eq!(
            status_from_domain(&DomainError::Dependency("db".into())).code(),
            tonic::Code::Unavailable
        );
        assert_eq!(
            status_from_domain(&DomainError::InvalidTransition {
                aggregate_id: id,
                from: "PaymentSucceeded".into(),
                to: "Cancelled".into(),
            })
            .code(),
            tonic::Code::Aborted
        );
    }
}
