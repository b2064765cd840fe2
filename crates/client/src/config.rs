// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Client properties.

use crate::codec::{CodecClass, CodecKind, find_codec};
use crate::error::ClientError;
use embedded_kafka_config::Properties;
use std::collections::BTreeMap;
use std::fmt;

/// Well-known client property keys.
pub mod keys {
    /// Comma-separated broker addresses.
    pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";
    /// Client identifier used in logs.
    pub const CLIENT_ID: &str = "client.id";
    /// Consumer group id.
    pub const GROUP_ID: &str = "group.id";
    /// Consumer start position without a committed offset (`earliest` or `latest`).
    pub const AUTO_OFFSET_RESET: &str = "auto.offset.reset";
    /// Maximum records returned by one poll.
    pub const MAX_POLL_RECORDS: &str = "max.poll.records";
    /// Producer key codec.
    pub const KEY_SERIALIZER: &str = "key.serializer";
    /// Producer value codec.
    pub const VALUE_SERIALIZER: &str = "value.serializer";
    /// Consumer key codec.
    pub const KEY_DESERIALIZER: &str = "key.deserializer";
    /// Consumer value codec.
    pub const VALUE_DESERIALIZER: &str = "value.deserializer";
}

/// A client property value: plain text or a codec class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// Text value.
    Text(String),
    /// Codec class.
    Codec(CodecClass),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Codec(codec) => write!(f, "{codec}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<CodecClass> for PropertyValue {
    fn from(value: CodecClass) -> Self {
        Self::Codec(value)
    }
}

/// Ordered client property map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientProperties {
    entries: BTreeMap<String, PropertyValue>,
}

impl ClientProperties {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        _ = self.insert(key, value);
        self
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Removes a value.
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries.remove(key)
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    /// Looks up a text value. Codec values are not returned.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(PropertyValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Looks up a text value that must be present.
    pub fn require_text(&self, key: &str) -> Result<&str, ClientError> {
        self.text(key).ok_or_else(|| ClientError::MissingProperty {
            key: key.to_owned(),
        })
    }

    /// Resolves a codec property given either as a class or as a built-in codec name.
    pub fn codec(&self, key: &str, kind: CodecKind) -> Result<CodecClass, ClientError> {
        let codec = match self.entries.get(key) {
            None => {
                return Err(ClientError::MissingProperty {
                    key: key.to_owned(),
                });
            }
            Some(PropertyValue::Codec(codec)) => *codec,
            Some(PropertyValue::Text(name)) => {
                find_codec(name.trim()).ok_or_else(|| ClientError::UnknownCodec {
                    name: name.clone(),
                })?
            }
        };
        if codec.kind() != kind {
            return Err(ClientError::InvalidProperty {
                key: key.to_owned(),
                value: codec.name().to_owned(),
                reason: format!("expected a {kind}"),
            });
        }
        Ok(codec)
    }

    /// Parses an optional numeric property.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ClientError>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        match self.text(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ClientError::InvalidProperty {
                key: key.to_owned(),
                value: raw.to_owned(),
                reason: e.to_string(),
            }),
        }
    }

    /// Applies `other` on top of `self`; keys present in both take `other`'s value.
    pub fn extend(&mut self, other: ClientProperties) {
        self.entries.extend(other.entries);
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there is no entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Properties> for ClientProperties {
    fn from(properties: Properties) -> Self {
        properties.into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for ClientProperties
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
