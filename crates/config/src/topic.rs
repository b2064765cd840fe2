// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Topic declarations created on the broker before a test body runs.

use crate::error::ConfigurationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Partition count used when a declaration does not specify one.
pub const DEFAULT_TOPIC_NUM_PARTITIONS: u32 = 1;
/// Replication factor used when a declaration does not specify one.
pub const DEFAULT_TOPIC_REPLICATION_FACTOR: u16 = 1;

/// Name of a topic.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
#[schemars(with = "String")]
pub struct TopicName(String);

impl TopicName {
    /// Parses and validates a topic name.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidTopicName {
            name: raw.to_owned(),
            reason: reason.to_owned(),
        };
        if raw.trim().is_empty() {
            return Err(invalid("topic name must be non-empty"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(invalid("topic name must not contain whitespace"));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Returns the topic name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the owned topic name.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for TopicName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::borrow::Borrow<str> for TopicName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for TopicName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TopicName {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl TryFrom<&str> for TopicName {
    type Error = ConfigurationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TopicName> for String {
    fn from(value: TopicName) -> Self {
        value.0
    }
}

/// A topic to create on the broker: name, partition count and replication factor.
///
/// Partition count and replication factor are always at least one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawNewTopic", rename_all = "camelCase")]
pub struct NewTopic {
    name: TopicName,
    num_partitions: u32,
    replication_factor: u16,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawNewTopic {
    name: String,
    #[serde(default = "default_num_partitions")]
    num_partitions: u32,
    #[serde(default = "default_replication_factor")]
    replication_factor: u16,
}

const fn default_num_partitions() -> u32 {
    DEFAULT_TOPIC_NUM_PARTITIONS
}

const fn default_replication_factor() -> u16 {
    DEFAULT_TOPIC_REPLICATION_FACTOR
}

impl TryFrom<RawNewTopic> for NewTopic {
    type Error = ConfigurationError;

    fn try_from(raw: RawNewTopic) -> Result<Self, Self::Error> {
        Self::new(&raw.name, raw.num_partitions, raw.replication_factor)
    }
}

impl NewTopic {
    /// Creates a validated topic declaration.
    pub fn new(
        name: &str,
        num_partitions: u32,
        replication_factor: u16,
    ) -> Result<Self, ConfigurationError> {
        let name = TopicName::parse(name)?;
        if num_partitions == 0 {
            return Err(ConfigurationError::InvalidTopicDeclaration {
                topic: name.into_string(),
                reason: "partition count must be at least 1".to_owned(),
            });
        }
        if replication_factor == 0 {
            return Err(ConfigurationError::InvalidTopicDeclaration {
                topic: name.into_string(),
                reason: "replication factor must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            name,
            num_partitions,
            replication_factor,
        })
    }

    /// Creates a declaration with one partition and a replication factor of one.
    pub fn with_defaults(name: &str) -> Result<Self, ConfigurationError> {
        Self::new(
            name,
            DEFAULT_TOPIC_NUM_PARTITIONS,
            DEFAULT_TOPIC_REPLICATION_FACTOR,
        )
    }

    /// Topic name.
    #[must_use]
    pub fn name(&self) -> &TopicName {
        &self.name
    }

    /// Number of partitions.
    #[must_use]
    pub fn num_partitions(&self) -> u32 {
        self.num_partitions
    }

    /// Replication factor.
    #[must_use]
    pub fn replication_factor(&self) -> u16 {
        self.replication_factor
    }
}
