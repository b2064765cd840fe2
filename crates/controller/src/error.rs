// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors surfaced to the test runner.

use embedded_kafka_client::{ClientError, CodecKind};
use embedded_kafka_config::ConfigurationError;
use embedded_kafka_engine::StartupError;

/// Why an invocation did not run, or why one of its arguments could not be produced.
///
/// Teardown failures never surface here; they are logged and suppressed.
#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    /// Declarative input could not be interpreted. No engine was started.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The coordination service or the broker did not reach the running state.
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// The declared topics could not all be created.
    #[error("failed to create topics {topics:?}: {source}")]
    TopicCreation {
        /// Names of every topic in the rejected batch.
        topics: Vec<String>,
        /// Error reported by the admin client.
        #[source]
        source: ClientError,
    },

    /// No codec was configured or guessed for a key or value type.
    #[error("no {kind} could be determined for the {slot} type `{type_name}` of parameter `{parameter}`")]
    UnresolvedCodec {
        /// Parameter being resolved.
        parameter: String,
        /// Serializer or deserializer.
        kind: CodecKind,
        /// `key` or `value`.
        slot: &'static str,
        /// The type no codec was found for.
        type_name: &'static str,
    },

    /// No registered resolver produced a value for the parameter.
    #[error("no resolver is available for parameter `{parameter}` of type `{type_name}`")]
    NoResolverAvailable {
        /// Parameter being resolved.
        parameter: String,
        /// Declared type.
        type_name: &'static str,
    },

    /// The client could not be constructed.
    #[error("failed to construct parameter `{parameter}`: {source}")]
    Client {
        /// Parameter being resolved.
        parameter: String,
        /// Error reported by the client.
        #[source]
        source: ClientError,
    },

    /// A resolved argument was taken as the wrong type, or was not available.
    #[error("argument {index} is `{found}`, not `{expected}`")]
    Argument {
        /// Position of the argument.
        index: usize,
        /// Type requested by the test body.
        expected: &'static str,
        /// Type of the resolved value, or `nothing` when absent.
        found: &'static str,
    },
}
