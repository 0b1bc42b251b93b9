//! Driver service entry point.

use std::sync::{Arc, Mutex};

use axum::Router;
use rideshare_core::rng::SystemRng;
use rideshare_driver::application::consumer::DriverMatchingConsumer;
use rideshare_driver::config::Config;
use rideshare_driver::domain::registry::DriverRegistry;
use rideshare_driver::rpc;
use rideshare_messaging::amqp::{AmqpBroker, spawn_consumer};
use rideshare_messaging::error::MessagingError;
use rideshare_messaging::topics;
use rideshare_transport::error::{ConfigError, TransportError};
use rideshare_transport::runtime::{self, ServiceRuntime};
use rideshare_transport::{shutdown, telemetry};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    telemetry::init_tracing();
    info!("starting driver service");

    let config = Config::from_env()?;
    let broker = Arc::new(AmqpBroker::connect(&config.rabbitmq_uri, topics::EXCHANGE).await?);
    let registry = Arc::new(DriverRegistry::with_assignment_capacity(
        Arc::new(Mutex::new(SystemRng::new())),
        config.assignment_capacity,
    ));

    let token = CancellationToken::new();
    let signals = shutdown::cancel_on_signal(token.clone());
    let consumer = spawn_consumer(
        &broker,
        topics::DRIVER_SERVICE_QUEUE,
        Arc::new(DriverMatchingConsumer::new(registry.clone(), broker.clone())),
        token.clone(),
    );

    let listener = runtime::bind(config.listen.socket_addr()?).await?;
    let served = ServiceRuntime::new("Driver Service", Router::new())
        .with_rpc(rpc::server::router(registry))
        .serve(listener, token.clone())
        .await;

    token.cancel();
    if let Err(e) = consumer.await {
        error!(error = %e, "driver consumer task panicked");
    }
    signals.abort();
    if let Err(e) = broker.close().await {
        error!(error = %e, "error closing broker connection");
    }
    info!("driver service stopped");

    served.map_err(AppError::from)
}
