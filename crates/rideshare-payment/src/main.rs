//! Payment service entry point.

use std::sync::Arc;

use axum::Router;
use rideshare_core::clock::SystemClock;
use rideshare_core::error::DomainError;
use rideshare_event_store::pg_event_repository::PgEventRepository;
use rideshare_messaging::amqp::{AmqpBroker, spawn_consumer};
use rideshare_messaging::error::MessagingError;
use rideshare_messaging::topics;
use rideshare_payment::application::orchestrator::PaymentOrchestrator;
use rideshare_payment::config::Config;
use rideshare_payment::gateway::GatewayAdapter;
use rideshare_payment::gateway::stripe::StripeCheckout;
use rideshare_payment::rpc;
use rideshare_payment::state::AppState;
use rideshare_transport::error::{ConfigError, TransportError};
use rideshare_transport::runtime::{self, ServiceRuntime};
use rideshare_transport::{shutdown, telemetry};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("payment gateway: {0}")]
    Gateway(#[from] DomainError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    telemetry::init_tracing();
    info!("starting payment service");

    let config = Config::from_env()?;
    let gateway = match config.gateway.live.clone() {
        Some(settings) => {
            info!(base_url = %settings.base_url, "payment gateway enabled");
            GatewayAdapter::live(
                Arc::new(StripeCheckout::new(settings, config.gateway.timeout)?),
                config.gateway.timeout,
            )
        }
        None => {
            warn!("payment gateway disabled, sessions will be mocked");
            GatewayAdapter::disabled()
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    rideshare_event_store::run_migrations(&pool).await?;

    let broker = Arc::new(AmqpBroker::connect(&config.rabbitmq_uri, topics::EXCHANGE).await?);

    let state = AppState::new(
        Arc::new(SystemClock),
        Arc::new(PgEventRepository::new(pool.clone())),
        broker.clone(),
        gateway,
    );

    let token = CancellationToken::new();
    let signals = shutdown::cancel_on_signal(token.clone());
    let consumer = spawn_consumer(
        &broker,
        topics::PAYMENT_SERVICE_QUEUE,
        Arc::new(PaymentOrchestrator::new(&state)),
        token.clone(),
    );

    let listener = runtime::bind(config.listen.socket_addr()?).await?;
    let served = ServiceRuntime::new("Payment Service", Router::new())
        .with_rpc(rpc::server::router(state))
        .serve(listener, token.clone())
        .await;

    token.cancel();
    if let Err(e) = consumer.await {
        error!(error = %e, "payment consumer task panicked");
    }
    signals.abort();
    if let Err(e) = broker.close().await {
        error!(error = %e, "error closing broker connection");
    }
    pool.close().await;
    info!("payment service stopped");

    served.map_err(AppError::from)
}
