//! Message envelope
//!
//! TigerStyle: Identity and timestamp fixed at creation, payload opaque.

use bytes::Bytes;
use holon_core::address::Address;
use holon_core::constants::MESSAGE_KIND_LENGTH_BYTES_MAX;
use holon_core::error::{Error, Result};
use holon_core::io::{IoContext, TimeProvider, WallClockTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        debug_assert!(!id.is_empty(), "message id must not be empty");
        Self(id)
    }

    /// Random identifier from the production generator
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a mailbox needs from a message
pub trait Message: Clone + Send + Sync + fmt::Debug + 'static {
    fn id(&self) -> &MessageId;

    fn sender(&self) -> &Address;

    /// Creation time in milliseconds, used by the default ordering
    fn created_at_ms(&self) -> u64;
}

/// Message carrying an opaque payload tagged with a kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: MessageId,
    pub sender: Address,
    pub receiver: Option<Address>,
    /// Payload kind tag, chosen by the sender
    pub kind: String,
    pub payload: Bytes,
    pub created_at_ms: u64,
}

impl Envelope {
    /// Create an envelope using the production clock and identifier generator
    ///
    /// For DST, use `new_with_io`.
    pub fn new(sender: Address, kind: impl Into<String>, payload: Bytes) -> Self {
        Self::build(
            MessageId::random(),
            sender,
            kind.into(),
            payload,
            WallClockTime::new().now_ms(),
        )
    }

    /// Create an envelope with injected time and randomness (for DST)
    pub fn new_with_io(
        sender: Address,
        kind: impl Into<String>,
        payload: Bytes,
        io: &IoContext,
    ) -> Self {
        Self::build(
            MessageId::new(io.gen_uuid()),
            sender,
            kind.into(),
            payload,
            io.now_ms(),
        )
    }

    /// Create an envelope whose payload is `value` encoded as JSON
    pub fn json<T: Serialize>(
        sender: Address,
        kind: impl Into<String>,
        value: &T,
        io: &IoContext,
    ) -> Result<Self> {
        let payload = serde_json::to_vec(value).map_err(|e| Error::SerializationFailed {
            reason: e.to_string(),
        })?;
        Ok(Self::new_with_io(sender, kind, Bytes::from(payload), io))
    }

    fn build(
        id: MessageId,
        sender: Address,
        kind: String,
        payload: Bytes,
        created_at_ms: u64,
    ) -> Self {
        debug_assert!(!kind.is_empty(), "message kind must not be empty");
        debug_assert!(
            kind.len() <= MESSAGE_KIND_LENGTH_BYTES_MAX,
            "message kind exceeds {} bytes",
            MESSAGE_KIND_LENGTH_BYTES_MAX
        );

        Self {
            id,
            sender,
            receiver: None,
            kind,
            payload,
            created_at_ms,
        }
    }

    pub fn with_receiver(mut self, receiver: Address) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Override the creation timestamp
    pub fn with_created_at_ms(mut self, created_at_ms: u64) -> Self {
        self.created_at_ms = created_at_ms;
        self
    }

    /// Decode a JSON payload
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload).map_err(|e| Error::DeserializationFailed {
            reason: e.to_string(),
        })
    }

    /// Milliseconds elapsed since creation
    pub fn age_ms(&self, time: &dyn TimeProvider) -> u64 {
        time.now_ms().saturating_sub(self.created_at_ms)
    }
}

impl Message for Envelope {
    fn id(&self) -> &MessageId {
        &self.id
    }

    fn sender(&self) -> &Address {
        &self.sender
    }

    fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }
}
