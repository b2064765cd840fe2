// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Declarative scope contributions.
//!
//! A test invocation is described by a [`ScopeChain`], ordered from the outermost scope (e.g. an
//! enclosing suite) to the innermost one (the test itself). Each [`ScopeContribution`] may carry
//! a [`BrokerAnnotation`] plus any number of [`PropertiesProvider`]s and [`TopicsProvider`]s.

use crate::error::ConfigurationError;
use crate::properties::{Properties, parse_properties_from_list};
use crate::topic::{
    DEFAULT_TOPIC_NUM_PARTITIONS, DEFAULT_TOPIC_REPLICATION_FACTOR, NewTopic,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Deferred value computation attached to a scope.
pub type Supplier = Arc<dyn Fn() -> Value + Send + Sync>;

/// Marks a scope as requiring an embedded broker and carries its static configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAnnotation {
    broker_properties: Vec<String>,
    expose_addresses: bool,
    create_topics: Vec<String>,
    topic_partitions: u32,
    topic_replication_factor: u16,
}

impl Default for BrokerAnnotation {
    fn default() -> Self {
        Self {
            broker_properties: Vec::new(),
            expose_addresses: false,
            create_topics: Vec::new(),
            topic_partitions: DEFAULT_TOPIC_NUM_PARTITIONS,
            topic_replication_factor: DEFAULT_TOPIC_REPLICATION_FACTOR,
        }
    }
}

impl BrokerAnnotation {
    /// Creates an annotation with no properties and no topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key=value` broker property entries.
    #[must_use]
    pub fn broker_properties<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.broker_properties
            .extend(entries.into_iter().map(Into::into));
        self
    }

    /// Publishes the broker and coordination addresses for the duration of the invocation.
    #[must_use]
    pub fn expose_addresses(mut self, expose: bool) -> Self {
        self.expose_addresses = expose;
        self
    }

    /// Adds topic names to create with the annotation's partition and replication defaults.
    #[must_use]
    pub fn create_topics<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_topics.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the partition count used for [`Self::create_topics`] names.
    #[must_use]
    pub fn topic_partitions(mut self, partitions: u32) -> Self {
        self.topic_partitions = partitions;
        self
    }

    /// Sets the replication factor used for [`Self::create_topics`] names.
    #[must_use]
    pub fn topic_replication_factor(mut self, replication_factor: u16) -> Self {
        self.topic_replication_factor = replication_factor;
        self
    }

    /// Returns true when the annotation asks for addresses to be exposed.
    #[must_use]
    pub fn exposes_addresses(&self) -> bool {
        self.expose_addresses
    }

    /// Parses the annotation's broker property entries.
    #[must_use]
    pub fn properties(&self) -> Properties {
        parse_properties_from_list(&self.broker_properties)
    }

    /// Builds the topic declarations named by the annotation.
    pub fn topics(&self) -> Result<Vec<NewTopic>, ConfigurationError> {
        self.create_topics
            .iter()
            .map(|name| NewTopic::new(name, self.topic_partitions, self.topic_replication_factor))
            .collect()
    }
}

/// A named supplier of broker properties.
///
/// The supplier must return a JSON object. Scalar values are rendered as text, nested values as
/// JSON text and `null` entries are skipped.
#[derive(Clone)]
pub struct PropertiesProvider {
    name: String,
    merge: bool,
    supplier: Supplier,
}

impl fmt::Debug for PropertiesProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertiesProvider")
            .field("name", &self.name)
            .field("merge", &self.merge)
            .finish_non_exhaustive()
    }
}

impl PropertiesProvider {
    /// Creates a provider whose result is merged over earlier contributions.
    pub fn new<F>(name: impl Into<String>, supplier: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            merge: true,
            supplier: Arc::new(supplier),
        }
    }

    /// Creates a provider that discards every earlier contribution.
    pub fn replacing<F>(name: impl Into<String>, supplier: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::new(name, supplier).with_merge(false)
    }

    /// Sets the merge flag.
    #[must_use]
    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    /// Provider name, used in error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the result is merged (true) or replaces earlier contributions (false).
    #[must_use]
    pub fn merge(&self) -> bool {
        self.merge
    }

    /// Invokes the supplier and converts its result to properties.
    pub fn evaluate(&self) -> Result<Properties, ConfigurationError> {
        let value = (self.supplier)();
        let Value::Object(entries) = value else {
            return Err(ConfigurationError::PropertiesNotAMap {
                provider: self.name.clone(),
                found: describe(&value).to_owned(),
            });
        };
        let mut properties = Properties::new();
        for (key, value) in entries {
            let rendered = match value {
                Value::Null => continue,
                Value::String(text) => text,
                other => other.to_string(),
            };
            _ = properties.insert(key, rendered);
        }
        Ok(properties)
    }
}

/// A named supplier of topic declarations.
///
/// The supplier may return a topic object (`{"name", "numPartitions", "replicationFactor"}`), a
/// topic name (created with this provider's defaults), an array of any of these (nested arrays
/// are flattened) or `null` (no topics).
#[derive(Clone)]
pub struct TopicsProvider {
    name: String,
    num_partitions: u32,
    replication_factor: u16,
    supplier: Supplier,
}

impl fmt::Debug for TopicsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicsProvider")
            .field("name", &self.name)
            .field("num_partitions", &self.num_partitions)
            .field("replication_factor", &self.replication_factor)
            .finish_non_exhaustive()
    }
}

impl TopicsProvider {
    /// Creates a provider with one partition and a replication factor of one for bare names.
    pub fn new<F>(name: impl Into<String>, supplier: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            num_partitions: DEFAULT_TOPIC_NUM_PARTITIONS,
            replication_factor: DEFAULT_TOPIC_REPLICATION_FACTOR,
            supplier: Arc::new(supplier),
        }
    }

    /// Sets the partition count applied to bare topic names.
    #[must_use]
    pub fn with_num_partitions(mut self, num_partitions: u32) -> Self {
        self.num_partitions = num_partitions;
        self
    }

    /// Sets the replication factor applied to bare topic names.
    #[must_use]
    pub fn with_replication_factor(mut self, replication_factor: u16) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Provider name, used in error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the supplier and converts its result to topic declarations.
    pub fn evaluate(&self) -> Result<Vec<NewTopic>, ConfigurationError> {
        let value = (self.supplier)();
        let mut topics = Vec::new();
        self.collect(&value, &mut topics)?;
        Ok(topics)
    }

    fn collect(&self, value: &Value, topics: &mut Vec<NewTopic>) -> Result<(), ConfigurationError> {
        match value {
            Value::Null => Ok(()),
            Value::String(name) => {
                topics.push(NewTopic::new(
                    name,
                    self.num_partitions,
                    self.replication_factor,
                )?);
                Ok(())
            }
            Value::Array(items) => items.iter().try_for_each(|item| self.collect(item, topics)),
            Value::Object(_) => {
                let topic = serde_json::from_value::<NewTopic>(value.clone()).map_err(|e| {
                    ConfigurationError::UnsupportedTopicShape {
                        provider: self.name.clone(),
                        found: format!("object ({e})"),
                    }
                })?;
                topics.push(topic);
                Ok(())
            }
            other => Err(ConfigurationError::UnsupportedTopicShape {
                provider: self.name.clone(),
                found: describe(other).to_owned(),
            }),
        }
    }
}

impl From<NewTopic> for Value {
    fn from(topic: NewTopic) -> Self {
        serde_json::json!({
            "name": topic.name().as_str(),
            "numPartitions": topic.num_partitions(),
            "replicationFactor": topic.replication_factor(),
        })
    }
}

/// Everything one scope contributes to an invocation.
#[derive(Debug, Clone, Default)]
pub struct ScopeContribution {
    name: String,
    annotation: Option<BrokerAnnotation>,
    properties_providers: Vec<PropertiesProvider>,
    topics_providers: Vec<TopicsProvider>,
}

impl ScopeContribution {
    /// Creates an empty contribution for the named scope.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attaches a broker annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: BrokerAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Adds a properties provider.
    #[must_use]
    pub fn with_properties_provider(mut self, provider: PropertiesProvider) -> Self {
        self.properties_providers.push(provider);
        self
    }

    /// Adds a topics provider.
    #[must_use]
    pub fn with_topics_provider(mut self, provider: TopicsProvider) -> Self {
        self.topics_providers.push(provider);
        self
    }

    /// Scope name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Broker annotation, if any.
    #[must_use]
    pub fn annotation(&self) -> Option<&BrokerAnnotation> {
        self.annotation.as_ref()
    }

    /// Properties providers in declaration order.
    #[must_use]
    pub fn properties_providers(&self) -> &[PropertiesProvider] {
        &self.properties_providers
    }

    /// Topics providers in declaration order.
    #[must_use]
    pub fn topics_providers(&self) -> &[TopicsProvider] {
        &self.topics_providers
    }
}

/// Scopes of one invocation, outermost first.
#[derive(Debug, Clone, Default)]
pub struct ScopeChain {
    scopes: Vec<ScopeContribution>,
}

impl ScopeChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a scope nested inside every scope already in the chain.
    #[must_use]
    pub fn with_scope(mut self, scope: ScopeContribution) -> Self {
        self.scopes.push(scope);
        self
    }

    /// Scopes, outermost first.
    #[must_use]
    pub fn scopes(&self) -> &[ScopeContribution] {
        &self.scopes
    }

    /// True when any scope carries a broker annotation.
    #[must_use]
    pub fn requires_broker(&self) -> bool {
        self.scopes.iter().any(|scope| scope.annotation.is_some())
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
