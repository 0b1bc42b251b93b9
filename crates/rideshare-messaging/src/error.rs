//! Messaging error types.

use thiserror::Error;

/// Errors raised while building or decoding an envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    /// Every published envelope must name an owner.
    #[error("envelope owner id must not be empty")]
    MissingOwner,

    /// Topics are concrete dotted names; wildcards are only valid in bindings.
    #[error("invalid topic {0:?}")]
    InvalidTopic(String),

    /// The payload could not be serialized.
    #[error("payload serialization failed: {0}")]
    Serialization(String),

    /// The payload did not match the contract for its topic.
    #[error("payload for topic {topic} could not be decoded: {reason}")]
    Decode {
        /// Topic of the offending envelope.
        topic: String,
        /// Decoder message.
        reason: String,
    },
}

/// Broker-level errors.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Connecting to or talking with the broker failed.
    #[error("broker connection error: {0}")]
    Connection(String),

    /// The broker refused or failed to confirm a publish.
    #[error("publish failed: {0}")]
    Publish(String),

    /// A consumer stream failed or ended unexpectedly.
    #[error("consume failed: {0}")]
    Consume(String),

    /// An envelope violated its contract.
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl From<lapin::Error> for MessagingError {
    fn from(err: lapin::Error) -> Self {
        Self::Connection(err.to_string())
    }
}
