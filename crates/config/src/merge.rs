// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Merging of scope contributions into the configuration of one invocation.

use crate::error::ConfigurationError;
use crate::properties::Properties;
use crate::scope::ScopeChain;
use crate::topic::{NewTopic, TopicName};
use std::collections::BTreeMap;

/// One ordered contribution to the broker properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyContribution {
    /// Properties contributed.
    pub properties: Properties,
    /// When false, every earlier contribution is discarded before this one applies.
    pub merge: bool,
}

impl PropertyContribution {
    /// A contribution merged over earlier ones.
    #[must_use]
    pub fn merged(properties: Properties) -> Self {
        Self {
            properties,
            merge: true,
        }
    }

    /// A contribution that replaces everything before it.
    #[must_use]
    pub fn replacing(properties: Properties) -> Self {
        Self {
            properties,
            merge: false,
        }
    }
}

/// Folds contributions, outermost first, into a single property map.
///
/// Later contributions override earlier ones key by key.
pub fn merge_properties<I>(contributions: I) -> Properties
where
    I: IntoIterator<Item = PropertyContribution>,
{
    let mut merged = Properties::new();
    for contribution in contributions {
        if !contribution.merge {
            merged.clear();
        }
        merged.extend(contribution.properties);
    }
    merged
}

/// Collects topic declarations by name; a later declaration of a name replaces the earlier one.
pub fn merge_topics<I>(declarations: I) -> BTreeMap<TopicName, NewTopic>
where
    I: IntoIterator<Item = NewTopic>,
{
    let mut merged = BTreeMap::new();
    for topic in declarations {
        _ = merged.insert(topic.name().clone(), topic);
    }
    merged
}

/// The effective configuration of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedConfiguration {
    broker_properties: Properties,
    topics: BTreeMap<TopicName, NewTopic>,
    expose_addresses: bool,
}

impl MergedConfiguration {
    /// Evaluates every scope of the chain and merges the results.
    ///
    /// Within a scope the annotation contributes first, then the properties providers and the
    /// topics providers in declaration order. Addresses are exposed when any annotation of the
    /// chain opts in.
    pub fn from_scopes(chain: &ScopeChain) -> Result<Self, ConfigurationError> {
        let mut contributions = Vec::new();
        let mut topics = Vec::new();
        let mut expose_addresses = false;

        for scope in chain.scopes() {
            if let Some(annotation) = scope.annotation() {
                contributions.push(PropertyContribution::merged(annotation.properties()));
                topics.extend(annotation.topics()?);
                expose_addresses |= annotation.exposes_addresses();
            }
            for provider in scope.properties_providers() {
                contributions.push(PropertyContribution {
                    properties: provider.evaluate()?,
                    merge: provider.merge(),
                });
            }
            for provider in scope.topics_providers() {
                topics.extend(provider.evaluate()?);
            }
        }

        Ok(Self {
            broker_properties: merge_properties(contributions),
            topics: merge_topics(topics),
            expose_addresses,
        })
    }

    /// Merged broker property overrides.
    #[must_use]
    pub fn broker_properties(&self) -> &Properties {
        &self.broker_properties
    }

    /// Merged topic declarations keyed by name.
    #[must_use]
    pub fn topics(&self) -> &BTreeMap<TopicName, NewTopic> {
        &self.topics
    }

    /// Topic declarations in name order.
    #[must_use]
    pub fn topics_to_create(&self) -> Vec<NewTopic> {
        self.topics.values().cloned().collect()
    }

    /// Whether addresses are published for the invocation.
    #[must_use]
    pub fn expose_addresses(&self) -> bool {
        self.expose_addresses
    }
}
