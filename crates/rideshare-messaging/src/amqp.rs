//! RabbitMQ broker.
//!
//! Envelopes travel as the AMQP body (payload bytes) plus message properties:
//! message ID, correlation ID, timestamp and an `owner_id` header. The
//! routing key is the topic, except on redelivered copies, which carry it in
//! a header (see [`crate::redelivery`]).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bus::{EventHandler, Publisher, dispatch};
use crate::envelope::Envelope;
use crate::error::{ContractError, MessagingError};
use crate::reconnect::Reconnecting;
use crate::redelivery::{self, ATTEMPT_HEADER, RedeliveryPolicy, Settlement, TOPIC_HEADER};
use crate::supervisor::{Backoff, spawn_supervised};
use crate::topics::QueueSpec;

const OWNER_HEADER: &str = "owner_id";
const PREFETCH: u16 = 16;

/// One connection plus its confirm-mode publish channel.
struct Link {
    connection: Connection,
    publish_channel: Channel,
}

impl Link {
    async fn open(uri: &str, exchange: &str) -> Result<Self, MessagingError> {
        info!(exchange, "connecting to broker");

        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let publish_channel = connection.create_channel().await?;
        publish_channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        publish_channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(exchange, "connected to broker");
        Ok(Self {
            connection,
            publish_channel,
        })
    }

    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.publish_channel.status().connected()
    }
}

/// A RabbitMQ client that reopens its connection after the broker drops it.
///
/// The connection is opened eagerly by [`connect`](Self::connect). Publishing,
/// declaring and consuming all go through the current link; whichever caller
/// first finds it closed opens a new one.
pub struct AmqpBroker {
    uri: String,
    exchange: String,
    link: Reconnecting<Link>,
    redelivery: RedeliveryPolicy,
}

impl AmqpBroker {
    /// Connects and declares the durable topic exchange.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Connection` if the broker is unreachable.
    pub async fn connect(uri: &str, exchange: &str) -> Result<Self, MessagingError> {
        let link = Link::open(uri, exchange).await?;
        Ok(Self {
            uri: uri.to_owned(),
            exchange: exchange.to_owned(),
            link: Reconnecting::new(link),
            redelivery: RedeliveryPolicy::default(),
        })
    }

    /// Replaces the redelivery policy applied by consumers.
    #[must_use]
    pub fn with_redelivery(mut self, policy: RedeliveryPolicy) -> Self {
        self.redelivery = policy;
        self
    }

    async fn link(&self) -> Result<Arc<Link>, MessagingError> {
        self.link
            .get(Link::is_open, move || async move {
                warn!(exchange = %self.exchange, "broker link closed, reconnecting");
                Link::open(&self.uri, &self.exchange).await
            })
            .await
    }

    /// Forgets `link` if the broker closed it.
    async fn drop_if_closed(&self, link: &Arc<Link>) {
        if !link.is_open() {
            self.link.invalidate(link).await;
        }
    }

    /// Declares `queue` as durable, binds each of its patterns and declares
    /// its retry and parking queues.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Connection` if a declaration fails.
    pub async fn declare_queue(&self, queue: &QueueSpec) -> Result<(), MessagingError> {
        let link = self.link().await?;
        let result =
            declare_on(&link.publish_channel, &self.exchange, queue, &self.redelivery).await;
        if result.is_err() {
            self.drop_if_closed(&link).await;
        }
        result
    }

    /// Consumes `queue` until `shutdown` fires, dispatching each delivery to
    /// `handler` and settling it per the redelivery policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be set up or the delivery stream
    /// fails or ends while not shutting down. Callers restart via
    /// [`crate::supervisor::spawn_supervised`]; a restart after a dropped
    /// connection reconnects first.
    pub async fn consume(
        &self,
        queue: &QueueSpec,
        handler: Arc<dyn EventHandler>,
        shutdown: CancellationToken,
    ) -> Result<(), MessagingError> {
        let link = self.link().await?;
        let result = self.consume_on(&link, queue, handler, shutdown).await;
        if result.is_err() {
            self.drop_if_closed(&link).await;
        }
        result
    }

    async fn consume_on(
        &self,
        link: &Link,
        queue: &QueueSpec,
        handler: Arc<dyn EventHandler>,
        shutdown: CancellationToken,
    ) -> Result<(), MessagingError> {
        let channel = link.connection.create_channel().await?;
        channel
            .basic_qos(PREFETCH, BasicQosOptions::default())
            .await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        declare_on(&channel, &self.exchange, queue, &self.redelivery).await?;

        let consumer_tag = format!("{}-{}", handler.name(), Uuid::new_v4());
        let mut consumer = channel
            .basic_consume(
                queue.name,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(queue = queue.name, consumer_tag = %consumer_tag, "consuming");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!(queue = queue.name, "consumer stopping");
                    if let Err(e) = channel.close(200, "shutdown").await {
                        warn!(error = %e, "error closing consumer channel");
                    }
                    return Ok(());
                }
                next = consumer.next() => match next {
                    Some(Ok(delivery)) => {
                        settle(&channel, queue, &self.redelivery, handler.as_ref(), delivery).await;
                    }
                    Some(Err(e)) => {
                        error!(queue = queue.name, error = %e, "consumer stream failed");
                        return Err(MessagingError::Consume(e.to_string()));
                    }
                    None => {
                        return Err(MessagingError::Consume(format!(
                            "delivery stream for {} ended",
                            queue.name
                        )));
                    }
                },
            }
        }
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Connection` if the close handshake fails.
    pub async fn close(&self) -> Result<(), MessagingError> {
        info!("closing broker connection");
        let Some(link) = self.link.take().await else {
            return Ok(());
        };
        if let Err(e) = link.publish_channel.close(200, "shutdown").await {
            warn!(error = %e, "error closing publish channel");
        }
        link.connection
            .close(200, "shutdown")
            .await
            .map_err(|e| MessagingError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Publisher for AmqpBroker {
    async fn publish(&self, envelope: &Envelope) -> Result<(), MessagingError> {
        debug!(
            exchange = %self.exchange,
            topic = envelope.topic(),
            message_id = %envelope.message_id(),
            "publishing"
        );

        let link = self.link().await?;
        let result = publish_confirmed(
            &link.publish_channel,
            &self.exchange,
            envelope.topic(),
            envelope.payload(),
            properties_for(envelope),
        )
        .await;
        if result.is_err() {
            self.drop_if_closed(&link).await;
        }
        result
    }
}

/// Consumes `queue` in a supervised task that reconnects with backoff until
/// `shutdown` fires.
pub fn spawn_consumer(
    broker: &Arc<AmqpBroker>,
    queue: QueueSpec,
    handler: Arc<dyn EventHandler>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let broker = Arc::clone(broker);
    let token = shutdown.clone();
    spawn_supervised(queue.name, shutdown, Backoff::default(), move || {
        let broker = Arc::clone(&broker);
        let handler = Arc::clone(&handler);
        let token = token.clone();
        async move { broker.consume(&queue, handler, token).await }
    })
}

async fn publish_confirmed(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    payload: &[u8],
    properties: BasicProperties,
) -> Result<(), MessagingError> {
    let confirm = channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            payload,
            properties,
        )
        .await
        .map_err(|e| MessagingError::Publish(e.to_string()))?;

    let confirmation = confirm
        .await
        .map_err(|e| MessagingError::Publish(format!("publisher confirm failed: {e}")))?;
    if confirmation.is_nack() {
        return Err(MessagingError::Publish(format!(
            "broker nacked publish to {routing_key}"
        )));
    }
    Ok(())
}

async fn declare_on(
    channel: &Channel,
    exchange: &str,
    queue: &QueueSpec,
    policy: &RedeliveryPolicy,
) -> Result<(), MessagingError> {
    let durable = QueueDeclareOptions {
        durable: true,
        ..Default::default()
    };
    channel
        .queue_declare(queue.name, durable, FieldTable::default())
        .await?;
    for pattern in queue.bindings {
        channel
            .queue_bind(
                queue.name,
                exchange,
                pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        debug!(queue = queue.name, pattern, "queue bound");
    }

    channel
        .queue_declare(
            &redelivery::retry_queue(queue.name),
            durable,
            retry_queue_arguments(queue.name, policy),
        )
        .await?;
    channel
        .queue_declare(
            &redelivery::parking_queue(queue.name),
            durable,
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

/// Expired retry copies dead-letter through the default exchange straight
/// back into `queue`.
fn retry_queue_arguments(queue: &str, policy: &RedeliveryPolicy) -> FieldTable {
    let mut arguments = FieldTable::default();
    arguments.insert(
        "x-message-ttl".into(),
        AMQPValue::LongUInt(policy.delay_millis()),
    );
    arguments.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(String::new().into()),
    );
    arguments.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(queue.to_owned().into()),
    );
    arguments
}

async fn settle(
    channel: &Channel,
    queue: &QueueSpec,
    policy: &RedeliveryPolicy,
    handler: &dyn EventHandler,
    delivery: Delivery,
) {
    let tag = delivery.delivery_tag;
    let attempt = attempt_of(&delivery.properties);
    let settlement = match envelope_from(&delivery) {
        Ok(envelope) => policy.settle(dispatch(handler, &envelope).await, attempt),
        Err(e) => {
            error!(handler = handler.name(), error = %e, "undecodable delivery");
            Settlement::Reject
        }
    };

    let result = match settlement {
        Settlement::Ack => channel.basic_ack(tag, BasicAckOptions::default()).await,
        Settlement::Reject => {
            channel
                .basic_reject(tag, BasicRejectOptions { requeue: false })
                .await
        }
        Settlement::Retry { next_attempt } => {
            debug!(queue = queue.name, next_attempt, "scheduling redelivery");
            let target = redelivery::retry_queue(queue.name);
            copy_then_ack(channel, &target, &delivery, next_attempt).await
        }
        Settlement::Park => {
            warn!(
                queue = queue.name,
                attempt,
                routing_key = delivery.routing_key.as_str(),
                "redelivery limit reached, parking envelope"
            );
            let target = redelivery::parking_queue(queue.name);
            copy_then_ack(channel, &target, &delivery, attempt).await
        }
    };
    if let Err(e) = result {
        error!(error = %e, ?settlement, "failed to settle delivery");
    }
}

/// Publishes a copy of `delivery` straight to `target` and acknowledges the
/// original once the broker confirms the copy. If the copy fails the original
/// is returned to the queue instead.
async fn copy_then_ack(
    channel: &Channel,
    target: &str,
    delivery: &Delivery,
    attempt: u32,
) -> lapin::Result<()> {
    let properties =
        redelivery_properties(&delivery.properties, delivery.routing_key.as_str(), attempt);
    match publish_confirmed(channel, "", target, &delivery.data, properties).await {
        Ok(()) => {
            channel
                .basic_ack(delivery.delivery_tag, BasicAckOptions::default())
                .await
        }
        Err(e) => {
            error!(target, error = %e, "could not copy delivery, requeueing original");
            channel
                .basic_nack(
                    delivery.delivery_tag,
                    BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    },
                )
                .await
        }
    }
}

fn properties_for(envelope: &Envelope) -> BasicProperties {
    let mut headers = FieldTable::default();
    headers.insert(
        OWNER_HEADER.into(),
        AMQPValue::LongString(envelope.owner_id().to_owned().into()),
    );

    BasicProperties::default()
        .with_message_id(envelope.message_id().to_string().into())
        .with_correlation_id(envelope.correlation_id().to_string().into())
        .with_content_type("application/json".into())
        .with_timestamp(u64::try_from(envelope.published_at().timestamp()).unwrap_or_default())
        .with_delivery_mode(2)
        .with_headers(headers)
}

fn header<'a>(properties: &'a BasicProperties, name: &str) -> Option<&'a AMQPValue> {
    properties.headers().as_ref().and_then(|headers| {
        headers
            .inner()
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .map(|(_, value)| value)
    })
}

/// Attempt number of a delivery; first deliveries carry no header.
fn attempt_of(properties: &BasicProperties) -> u32 {
    match header(properties, ATTEMPT_HEADER) {
        Some(AMQPValue::LongUInt(n)) => *n,
        Some(AMQPValue::LongInt(n)) => u32::try_from(*n).unwrap_or(1),
        Some(AMQPValue::LongLongInt(n)) => u32::try_from(*n).unwrap_or(1),
        Some(AMQPValue::ShortUInt(n)) => u32::from(*n),
        _ => 1,
    }
    .max(1)
}

/// Properties of a retry or parking copy: the original's, plus the attempt
/// number and the topic it was first published under.
fn redelivery_properties(
    original: &BasicProperties,
    routing_key: &str,
    attempt: u32,
) -> BasicProperties {
    let mut headers = original.headers().clone().unwrap_or_default();
    if header(original, TOPIC_HEADER).is_none() {
        headers.insert(
            TOPIC_HEADER.into(),
            AMQPValue::LongString(routing_key.to_owned().into()),
        );
    }
    headers.insert(ATTEMPT_HEADER.into(), AMQPValue::LongUInt(attempt));
    original.clone().with_headers(headers)
}

/// Topic a delivery was published under. Retried copies arrive routed by
/// queue name and carry the topic in a header.
fn topic_of(properties: &BasicProperties, routing_key: &str) -> String {
    match header(properties, TOPIC_HEADER) {
        Some(AMQPValue::LongString(s)) => s.to_string(),
        _ => routing_key.to_owned(),
    }
}

fn envelope_from(delivery: &Delivery) -> Result<Envelope, ContractError> {
    let props = &delivery.properties;
    let topic = topic_of(props, delivery.routing_key.as_str());
    let topic = topic.as_str();

    let message_id = props
        .message_id()
        .as_ref()
        .and_then(|s| Uuid::parse_str(s.as_str()).ok())
        .ok_or_else(|| ContractError::Decode {
            topic: topic.to_owned(),
            reason: "missing or invalid message_id".into(),
        })?;
    let correlation_id = props
        .correlation_id()
        .as_ref()
        .and_then(|s| Uuid::parse_str(s.as_str()).ok())
        .unwrap_or(message_id);
    let owner_id = match header(props, OWNER_HEADER) {
        Some(AMQPValue::LongString(s)) => s.to_string(),
        _ => String::new(),
    };
    let published_at = props
        .timestamp()
        .and_then(|ts| i64::try_from(ts).ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    Envelope::from_parts(
        message_id,
        topic,
        &owner_id,
        correlation_id,
        published_at,
        delivery.data.clone(),
    )
}
