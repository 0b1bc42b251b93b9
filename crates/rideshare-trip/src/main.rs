//! Trip service entry point.

use std::sync::Arc;

use rideshare_core::clock::SystemClock;
use rideshare_event_store::pg_event_repository::PgEventRepository;
use rideshare_messaging::amqp::{AmqpBroker, spawn_consumer};
use rideshare_messaging::error::MessagingError;
use rideshare_messaging::topics;
use rideshare_transport::error::{ConfigError, TransportError};
use rideshare_transport::runtime::{self, ServiceRuntime};
use rideshare_transport::{shutdown, telemetry};
use rideshare_trip::application::consumer::TripEventConsumer;
use rideshare_trip::config::Config;
use rideshare_trip::state::AppState;
use rideshare_trip::{routes, rpc};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    telemetry::init_tracing();
    info!("starting trip service");

    let config = Config::from_env()?;

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
    );

    let token = CancellationToken::new();
    let signals = shutdown::cancel_on_signal(token.clone());
    let consumer = spawn_consumer(
        &broker,
        topics::TRIP_SERVICE_QUEUE,
        Arc::new(TripEventConsumer::new(&state)),
        token.clone(),
    );

    let listener = runtime::bind(config.listen.socket_addr()?).await?;
    let served = ServiceRuntime::new("Trip Service", routes::router(state.clone()))
        .with_rpc(rpc::server::router(state))
        .serve(listener, token.clone())
        .await;

    token.cancel();
    if let Err(e) = consumer.await {
        error!(error = %e, "trip consumer task panicked");
    }
    signals.abort();
    if let Err(e) = broker.close().await {
        error!(error = %e, "error closing broker connection");
    }
    pool.close().await;
    info!("trip service stopped");

    served.map_err(AppError::from)
}
