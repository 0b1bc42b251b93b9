//! API gateway entry point.

use std::sync::Arc;

use rideshare_core::clock::SystemClock;
use rideshare_gateway::config::Config;
use rideshare_gateway::routes;
use rideshare_gateway::signature::{SignatureError, WebhookVerifier};
use rideshare_gateway::state::AppState;
use rideshare_messaging::amqp::AmqpBroker;
use rideshare_messaging::error::MessagingError;
use rideshare_messaging::topics;
use rideshare_transport::error::{ConfigError, TransportError};
use rideshare_transport::runtime::{self, ServiceRuntime};
use rideshare_transport::{shutdown, telemetry};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    telemetry::init_tracing();
    info!("starting api gateway");

    let config = Config::from_env()?;

    let broker = Arc::new(AmqpBroker::connect(&config.rabbitmq_uri, topics::EXCHANGE).await?);
    let http = reqwest::Client::builder()
        .connect_timeout(config.rpc.connect)
        .timeout(config.rpc.request)
        .build()?;

    let mut state = AppState::new(config.endpoints.clone(), config.rpc, http, broker.clone());
    match config.webhook_secret.as_deref() {
        Some(secret) => {
            state = state.with_webhook_verifier(WebhookVerifier::new(
                secret,
                config.webhook_tolerance,
                Arc::new(SystemClock),
            )?);
        }
        None => warn!("PAYMENT_WEBHOOK_SECRET unset, payment webhooks will be refused"),
    }

    let token = CancellationToken::new();
    let signals = shutdown::cancel_on_signal(token.clone());

    let app = routes::router(state).layer(CorsLayer::permissive());
    let listener = runtime::bind(config.listen.socket_addr()?).await?;
    let served = ServiceRuntime::new("API Gateway", app)
        .serve(listener, token.clone())
        .await;

    token.cancel();
    signals.abort();
    if let Err(e) = broker.close().await {
        error!(error = %e, "error closing broker connection");
    }
    info!("api gateway stopped");

    served.map_err(AppError::from)
}
