// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Client errors.

use embedded_kafka_engine::BrokerError;

/// A codec could not encode or decode a value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{codec}: {reason}")]
pub struct CodecError {
    codec: &'static str,
    reason: String,
}

impl CodecError {
    /// Creates an error attributed to the named codec.
    #[must_use]
    pub fn new(codec: &'static str, reason: impl Into<String>) -> Self {
        Self {
            codec,
            reason: reason.into(),
        }
    }

    /// Name of the failing codec.
    #[must_use]
    pub fn codec(&self) -> &'static str {
        self.codec
    }
}

/// Errors returned by clients.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A required client property is absent.
    #[error("missing required client property `{key}`")]
    MissingProperty {
        /// Property key.
        key: String,
    },

    /// A client property has an unusable value.
    #[error("invalid value `{value}` for client property `{key}`: {reason}")]
    InvalidProperty {
        /// Property key.
        key: String,
        /// Rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No codec is registered under the name.
    #[error("unknown codec `{name}`")]
    UnknownCodec {
        /// Requested codec name.
        name: String,
    },

    /// The codec cannot handle the client's key or value type.
    #[error("codec `{codec}` cannot be used as a {kind} for `{expected}`")]
    CodecMismatch {
        /// Codec name.
        codec: &'static str,
        /// Required codec kind.
        kind: String,
        /// Type the client needs to handle.
        expected: &'static str,
    },

    /// Encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// No running broker answers at the bootstrap address.
    #[error("no broker available at `{bootstrap}`")]
    BrokerUnavailable {
        /// Bootstrap address used.
        bootstrap: String,
    },

    /// The broker rejected the request.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// The client was used after being closed.
    #[error("{client} is closed")]
    Closed {
        /// Kind of client.
        client: &'static str,
    },

    /// `poll` was called without a subscription.
    #[error("consumer is not subscribed to any topic")]
    NotSubscribed,
}
