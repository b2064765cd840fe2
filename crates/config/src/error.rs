// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors raised while interpreting declarative configuration.

/// Declarative configuration that cannot be interpreted.
///
/// These errors are raised before any engine is started for the invocation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A topic name is empty or otherwise malformed.
    #[error("invalid topic name `{name}`: {reason}")]
    InvalidTopicName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// A topic declaration carries a partition count or replication factor below one.
    #[error("invalid declaration for topic `{topic}`: {reason}")]
    InvalidTopicDeclaration {
        /// Topic being declared.
        topic: String,
        /// What is wrong with the declaration.
        reason: String,
    },

    /// A properties provider returned something other than a map.
    #[error("properties provider `{provider}` must return a map, got {found}")]
    PropertiesNotAMap {
        /// Name of the provider.
        provider: String,
        /// Kind of value that was returned.
        found: String,
    },

    /// A topics provider returned a value outside the supported shapes.
    #[error(
        "topics provider `{provider}` must return a topic, a topic name, a collection of those or null, got {found}"
    )]
    UnsupportedTopicShape {
        /// Name of the provider.
        provider: String,
        /// Kind of value that was returned.
        found: String,
    },

    /// A parameter carries both a producer and a consumer annotation.
    #[error("parameter `{parameter}` cannot be annotated as both a producer and a consumer")]
    ConflictingParameterIntent {
        /// Name of the offending parameter.
        parameter: String,
    },

    /// An address parameter is declared with a type that cannot carry an address.
    #[error("address parameter `{parameter}` must be declared as `String` or `u16`, got `{found}`")]
    UnsupportedAddressType {
        /// Name of the offending parameter.
        parameter: String,
        /// Declared type.
        found: String,
    },

    /// Harness settings failed validation.
    #[error("invalid harness settings: {}", errors.join("; "))]
    InvalidSettings {
        /// One entry per violated constraint.
        errors: Vec<String>,
    },

    /// Harness settings could not be read or deserialized.
    #[error("failed to load harness settings from `{source_name}`: {reason}")]
    SettingsLoad {
        /// File path or other description of the settings source.
        source_name: String,
        /// Underlying failure.
        reason: String,
    },
}
