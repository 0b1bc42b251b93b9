//! The event envelope.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ContractError;
use crate::topics;

/// Routing metadata plus an opaque payload.
///
/// Fields are private: an envelope is built once, handed to a publisher and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    message_id: Uuid,
    topic: String,
    owner_id: String,
    correlation_id: Uuid,
    published_at: DateTime<Utc>,
    payload: Vec<u8>,
}

impl Envelope {
    /// Builds an envelope for `topic`, serializing `payload` as JSON.
    ///
    /// # Errors
    ///
    /// Returns `ContractError::MissingOwner` for a blank owner,
    /// `ContractError::InvalidTopic` for a wildcard or malformed topic, and
    /// `ContractError::Serialization` if the payload cannot be encoded.
    pub fn new<T: Serialize>(
        topic: &str,
        owner_id: &str,
        payload: &T,
        correlation_id: Uuid,
    ) -> Result<Self, ContractError> {
        let payload =
            serde_json::to_vec(payload).map_err(|e| ContractError::Serialization(e.to_string()))?;
        Self::from_parts(
            Uuid::new_v4(),
            topic,
            owner_id,
            correlation_id,
            Utc::now(),
            payload,
        )
    }

    /// Reassembles an envelope received from the broker.
    ///
    /// # Errors
    ///
    /// Same validation as [`Envelope::new`], minus serialization.
    pub fn from_parts(
        message_id: Uuid,
        topic: &str,
        owner_id: &str,
        correlation_id: Uuid,
        published_at: DateTime<Utc>,
        payload: Vec<u8>,
    ) -> Result<Self, ContractError> {
        if owner_id.trim().is_empty() {
            return Err(ContractError::MissingOwner);
        }
        if !topics::is_concrete(topic) {
            return Err(ContractError::InvalidTopic(topic.to_owned()));
        }
        Ok(Self {
            message_id,
            topic: topic.to_owned(),
            owner_id: owner_id.to_owned(),
            correlation_id,
            published_at,
            payload,
        })
    }

    /// Replaces the generated message ID with a caller-derived one.
    ///
    /// Used when the same logical event may be produced more than once (for
    /// example a provider webhook retried by the provider).
    #[must_use]
    pub fn with_message_id(mut self, message_id: Uuid) -> Self {
        self.message_id = message_id;
        self
    }

    /// Decodes the payload as the contract type for this topic.
    ///
    /// # Errors
    ///
    /// Returns `ContractError::Decode` if the bytes do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ContractError> {
        serde_json::from_slice(&self.payload).map_err(|e| ContractError::Decode {
            topic: self.topic.clone(),
            reason: e.to_string(),
        })
    }

    /// Unique message ID, used as the idempotency key.
    #[must_use]
    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    /// The concrete topic this envelope was published on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Routing/partitioning owner (rider or trip identity).
    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Correlation ID of the request that started the saga.
    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// When the producer built the envelope.
    #[must_use]
    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
