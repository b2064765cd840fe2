// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Test parameter descriptors and their client annotations.

use embedded_kafka_client::{CodecClass, ParameterType};
use embedded_kafka_config::ConfigurationError;

/// Marks a parameter as a producer and configures it.
///
/// A codec left unset is guessed from the parameter's key or value type when the resolving
/// variant guesses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerAnnotation {
    properties: Vec<String>,
    key_serializer: Option<CodecClass>,
    value_serializer: Option<CodecClass>,
}

impl ProducerAnnotation {
    /// A producer annotation without properties or codecs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key=value` client property entries.
    #[must_use]
    pub fn properties<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Sets the key serializer class.
    #[must_use]
    pub fn key_serializer(mut self, codec: CodecClass) -> Self {
        self.key_serializer = Some(codec);
        self
    }

    /// Sets the value serializer class.
    #[must_use]
    pub fn value_serializer(mut self, codec: CodecClass) -> Self {
        self.value_serializer = Some(codec);
        self
    }

    pub(crate) fn property_entries(&self) -> &[String] {
        &self.properties
    }

    pub(crate) fn key_codec(&self) -> Option<CodecClass> {
        self.key_serializer
    }

    pub(crate) fn value_codec(&self) -> Option<CodecClass> {
        self.value_serializer
    }
}

/// Marks a parameter as a consumer and configures it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerAnnotation {
    properties: Vec<String>,
    key_deserializer: Option<CodecClass>,
    value_deserializer: Option<CodecClass>,
    topics: Vec<String>,
}

impl ConsumerAnnotation {
    /// A consumer annotation without properties, codecs or topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key=value` client property entries.
    #[must_use]
    pub fn properties<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Sets the key deserializer class.
    #[must_use]
    pub fn key_deserializer(mut self, codec: CodecClass) -> Self {
        self.key_deserializer = Some(codec);
        self
    }

    /// Sets the value deserializer class.
    #[must_use]
    pub fn value_deserializer(mut self, codec: CodecClass) -> Self {
        self.value_deserializer = Some(codec);
        self
    }

    /// Topics the consumer subscribes to when resolved.
    #[must_use]
    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics.extend(topics.into_iter().map(Into::into));
        self
    }

    pub(crate) fn property_entries(&self) -> &[String] {
        &self.properties
    }

    pub(crate) fn key_codec(&self) -> Option<CodecClass> {
        self.key_deserializer
    }

    pub(crate) fn value_codec(&self) -> Option<CodecClass> {
        self.value_deserializer
    }

    pub(crate) fn topic_list(&self) -> &[String] {
        &self.topics
    }
}

/// What a parameter is declared to receive.
#[derive(Debug, Clone)]
pub struct ParameterContext {
    name: String,
    declared: ParameterType,
    producer: Option<ProducerAnnotation>,
    consumer: Option<ConsumerAnnotation>,
    address: bool,
}

impl ParameterContext {
    /// An unannotated parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, declared: ParameterType) -> Self {
        Self {
            name: name.into(),
            declared,
            producer: None,
            consumer: None,
            address: false,
        }
    }

    /// Attaches a producer annotation.
    #[must_use]
    pub fn with_producer(mut self, annotation: ProducerAnnotation) -> Self {
        self.producer = Some(annotation);
        self
    }

    /// Attaches a consumer annotation.
    #[must_use]
    pub fn with_consumer(mut self, annotation: ConsumerAnnotation) -> Self {
        self.consumer = Some(annotation);
        self
    }

    /// Marks the parameter as receiving the broker address (`String`) or port (`u16`).
    #[must_use]
    pub fn as_address(mut self) -> Self {
        self.address = true;
        self
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub fn declared(&self) -> &ParameterType {
        &self.declared
    }

    /// Producer annotation, if any.
    #[must_use]
    pub fn producer(&self) -> Option<&ProducerAnnotation> {
        self.producer.as_ref()
    }

    /// Consumer annotation, if any.
    #[must_use]
    pub fn consumer(&self) -> Option<&ConsumerAnnotation> {
        self.consumer.as_ref()
    }

    /// True when flagged as an address parameter.
    #[must_use]
    pub fn is_address(&self) -> bool {
        self.address
    }

    /// True when a producer or consumer annotation is present.
    #[must_use]
    pub fn is_annotated(&self) -> bool {
        self.producer.is_some() || self.consumer.is_some()
    }

    /// Checks the annotations for contradictions.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.producer.is_some() && self.consumer.is_some() {
            return Err(ConfigurationError::ConflictingParameterIntent {
                parameter: self.name.clone(),
            });
        }
        if self.address {
            if self.is_annotated() {
                return Err(ConfigurationError::ConflictingParameterIntent {
                    parameter: self.name.clone(),
                });
            }
            if !self.declared.is::<String>() && !self.declared.is::<u16>() {
                return Err(ConfigurationError::UnsupportedAddressType {
                    parameter: self.name.clone(),
                    found: self.declared.declared().name().to_owned(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConsumerAnnotation, ParameterContext, ProducerAnnotation};
    use embedded_kafka_client::{ClientProperties, ParameterType};
    use embedded_kafka_config::ConfigurationError;

    #[test]
    fn producer_and_consumer_intent_conflict() {
        let parameter = ParameterContext::new("both", ParameterType::of::<ClientProperties>())
            .with_producer(ProducerAnnotation::new())
            .with_consumer(ConsumerAnnotation::new());
        assert_eq!(
            parameter.validate(),
            Err(ConfigurationError::ConflictingParameterIntent {
                parameter: "both".to_owned()
            })
        );
    }

    #[test]
    fn address_parameters_take_string_or_port() {
        assert!(ParameterContext::new("servers", ParameterType::plain::<String>())
            .as_address()
            .validate()
            .is_ok());
        assert!(ParameterContext::new("port", ParameterType::plain::<u16>())
            .as_address()
            .validate()
            .is_ok());
        assert!(matches!(
            ParameterContext::new("port", ParameterType::plain::<i64>())
                .as_address()
                .validate(),
            Err(ConfigurationError::UnsupportedAddressType { .. })
        ));
    }

    #[test]
    fn unannotated_parameters_are_valid() {
        let parameter = ParameterContext::new("props", ParameterType::of::<ClientProperties>());
        assert!(!parameter.is_annotated());
        assert!(parameter.validate().is_ok());
    }
}
