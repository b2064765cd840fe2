// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the services and engines.

use crate::service::ServiceState;
use std::time::Duration;

/// Failure reported by an engine implementation.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// I/O failure while preparing or running the engine.
    #[error("{context}: {source}")]
    Io {
        /// What the engine was doing.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The engine rejected a configuration entry.
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    InvalidConfig {
        /// Property key.
        key: String,
        /// Rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A required configuration entry is absent.
    #[error("missing required configuration `{key}`")]
    MissingConfig {
        /// Property key.
        key: String,
    },

    /// No coordination service answers at the configured address.
    #[error("no coordination service reachable at `{address}`")]
    CoordinationUnavailable {
        /// Configured coordination address.
        address: String,
    },

    /// Another engine already serves the address.
    #[error("address `{address}` is already served by another engine")]
    AddressInUse {
        /// Contested address.
        address: String,
    },

    /// A coordination node already exists.
    #[error("coordination node `{path}` already exists")]
    NodeExists {
        /// Node path.
        path: String,
    },

    /// The service is not running.
    #[error("{service} is not running (state: {state:?})")]
    NotRunning {
        /// Service name.
        service: &'static str,
        /// Current state.
        state: ServiceState,
    },
}

/// An engine or its wrapping service failed to reach the running state.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    /// The engine reported a failure while starting.
    #[error("{service} failed to start: {source}")]
    Engine {
        /// Service name.
        service: &'static str,
        /// Engine failure.
        #[source]
        source: EngineError,
    },

    /// The engine did not signal readiness in time.
    #[error("{service} did not become ready within {timeout:?}")]
    Timeout {
        /// Service name.
        service: &'static str,
        /// Configured startup timeout.
        timeout: Duration,
    },

    /// The startup thread ended without reporting an outcome.
    #[error("{service} startup aborted before reporting readiness")]
    Aborted {
        /// Service name.
        service: &'static str,
    },

    /// `start` was called on a service that is not new.
    #[error("{service} cannot start from state {state:?}")]
    IllegalState {
        /// Service name.
        service: &'static str,
        /// Current state.
        state: ServiceState,
    },

    /// No port could be allocated.
    #[error("failed to allocate a port for {service}: {source}")]
    Port {
        /// Service name.
        service: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No scratch directory could be allocated.
    #[error("failed to allocate a scratch directory for {service}: {source}")]
    Scratch {
        /// Service name.
        service: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Request-level failures returned by a running broker.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The topic already exists.
    #[error("topic `{topic}` already exists")]
    TopicAlreadyExists {
        /// Topic name.
        topic: String,
    },

    /// The topic does not exist and auto-creation is disabled.
    #[error("unknown topic `{topic}`")]
    UnknownTopic {
        /// Topic name.
        topic: String,
    },

    /// The partition does not exist in the topic.
    #[error("topic `{topic}` has no partition {partition}")]
    UnknownPartition {
        /// Topic name.
        topic: String,
        /// Requested partition.
        partition: u32,
    },

    /// The requested replication factor exceeds the number of brokers.
    #[error(
        "replication factor {requested} for topic `{topic}` exceeds the {available} available broker(s)"
    )]
    InvalidReplicationFactor {
        /// Topic name.
        topic: String,
        /// Requested replication factor.
        requested: u16,
        /// Brokers available.
        available: u16,
    },

    /// A topic name or declaration is invalid.
    #[error("invalid topic `{topic}`: {reason}")]
    InvalidTopic {
        /// Topic name.
        topic: String,
        /// Why it is invalid.
        reason: String,
    },

    /// Group membership was requested without a group id.
    #[error("a consumer group id is required to subscribe")]
    InvalidGroupId,

    /// The member is not part of the group.
    #[error("member `{member}` is not part of group `{group}`")]
    UnknownMember {
        /// Group id.
        group: String,
        /// Member id.
        member: String,
    },

    /// The broker has shut down.
    #[error("broker is closed")]
    BrokerClosed,
}
