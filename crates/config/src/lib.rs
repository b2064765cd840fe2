// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Declarative configuration for embedded broker test invocations.
//!
//! This crate holds everything that is decided before any engine runs:
//! - parsing of `key=value` property entries,
//! - topic declarations and their validation,
//! - scope contributions (annotations and providers) and the merge across nested scopes,
//! - harness-wide settings (timeouts, scratch root, defaults).

pub mod error;
pub mod merge;
pub mod properties;
pub mod scope;
pub mod settings;
pub mod topic;

pub use error::ConfigurationError;
pub use merge::{MergedConfiguration, PropertyContribution, merge_properties, merge_topics};
pub use properties::{Properties, parse_properties_from_list};
pub use scope::{BrokerAnnotation, PropertiesProvider, ScopeChain, ScopeContribution, TopicsProvider};
pub use settings::HarnessSettings;
pub use topic::{
    DEFAULT_TOPIC_NUM_PARTITIONS, DEFAULT_TOPIC_REPLICATION_FACTOR, NewTopic, TopicName,
};
