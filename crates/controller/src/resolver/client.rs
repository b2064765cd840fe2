// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Producer and consumer resolution shared by every client family.
//!
//! A [`KafkaClientArgumentResolver`] decides the codecs of a parameter (explicit class first,
//! then a guess from the key or value type when its [`ClientVariant`] guesses), merges the
//! codec properties, the annotation's properties and the connection properties in that order,
//! and hands the result to the declared type's constructor.

use super::{ArgumentResolver, ParameterContext};
use crate::context::InvocationContext;
use crate::error::HarnessError;
use embedded_kafka_client::config::keys;
use embedded_kafka_client::consumer::{CONSUMER, KAFKA_CONSUMER};
use embedded_kafka_client::inject::CLIENT_PROPERTIES;
use embedded_kafka_client::producer::{KAFKA_PRODUCER, PRODUCER};
use embedded_kafka_client::{
    ClientProperties, ClientSpec, CodecClass, CodecKind, DisposableParameter, GuesserRegistry,
    ParameterType, RawType, TypeToken,
};
use embedded_kafka_config::parse_properties_from_list;

/// The client families one resolver handles.
pub trait ClientVariant: Send + Sync + 'static {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Families resolved as producers, annotated or not.
    fn producer_types(&self) -> &'static [RawType];

    /// Families resolved as consumers, annotated or not.
    fn consumer_types(&self) -> &'static [RawType];

    /// Families resolved only when a producer or consumer annotation says which one.
    fn annotated_only_types(&self) -> &'static [RawType] {
        &[]
    }

    /// Whether missing codecs are guessed from the declared key and value types.
    fn guesses(&self, _declared: &ParameterType) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Produce,
    Consume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Key,
    Value,
}

impl Slot {
    fn label(self) -> &'static str {
        match self {
            Slot::Key => "key",
            Slot::Value => "value",
        }
    }
}

/// Resolves the producers and consumers of one [`ClientVariant`].
pub struct KafkaClientArgumentResolver<V> {
    variant: V,
    guessers: GuesserRegistry,
}

impl<V: ClientVariant> KafkaClientArgumentResolver<V> {
    /// Resolver for `variant`, guessing with `guessers`.
    #[must_use]
    pub fn new(variant: V, guessers: GuesserRegistry) -> Self {
        Self { variant, guessers }
    }

    fn intent(&self, parameter: &ParameterContext) -> Option<Intent> {
        let raw = parameter.declared().raw();
        let produces = self.variant.producer_types().contains(&raw);
        let consumes = self.variant.consumer_types().contains(&raw);
        let either = self.variant.annotated_only_types().contains(&raw);
        match (parameter.producer(), parameter.consumer()) {
            (Some(_), None) if produces || either => Some(Intent::Produce),
            (None, Some(_)) if consumes || either => Some(Intent::Consume),
            (None, None) if produces => Some(Intent::Produce),
            (None, None) if consumes => Some(Intent::Consume),
            _ => None,
        }
    }

    fn codec(
        &self,
        parameter: &ParameterContext,
        kind: CodecKind,
        slot: Slot,
        explicit: Option<CodecClass>,
    ) -> Result<Option<CodecClass>, HarnessError> {
        if explicit.is_some() {
            return Ok(explicit);
        }
        let declared = parameter.declared();
        if !self.variant.guesses(declared) {
            return Ok(None);
        }
        let ty: Option<TypeToken> = match slot {
            Slot::Key => declared.key_type(),
            Slot::Value => declared.value_type(),
        };
        let Some(ty) = ty else {
            return Ok(None);
        };
        self.guessers
            .guess(kind, &ty, slot == Slot::Key)
            .map(Some)
            .ok_or_else(|| HarnessError::UnresolvedCodec {
                parameter: parameter.name().to_owned(),
                kind,
                slot: slot.label(),
                type_name: ty.name(),
            })
    }
}

impl<V: ClientVariant> ArgumentResolver for KafkaClientArgumentResolver<V> {
    fn name(&self) -> &str {
        self.variant.name()
    }

    fn supports(&self, parameter: &ParameterContext) -> bool {
        !parameter.is_address() && self.intent(parameter).is_some()
    }

    fn resolve(
        &self,
        parameter: &ParameterContext,
        context: &InvocationContext,
    ) -> Result<Option<DisposableParameter>, HarnessError> {
        let Some(intent) = self.intent(parameter) else {
            return Ok(None);
        };
        let (kind, key_slot, value_slot) = match intent {
            Intent::Produce => (
                CodecKind::Serializer,
                keys::KEY_SERIALIZER,
                keys::VALUE_SERIALIZER,
            ),
            Intent::Consume => (
                CodecKind::Deserializer,
                keys::KEY_DESERIALIZER,
                keys::VALUE_DESERIALIZER,
            ),
        };
        let (explicit_key, explicit_value, entries, topics) = match intent {
            Intent::Produce => match parameter.producer() {
                Some(annotation) => (
                    annotation.key_codec(),
                    annotation.value_codec(),
                    annotation.property_entries(),
                    &[][..],
                ),
                None => (None, None, &[][..], &[][..]),
            },
            Intent::Consume => match parameter.consumer() {
                Some(annotation) => (
                    annotation.key_codec(),
                    annotation.value_codec(),
                    annotation.property_entries(),
                    annotation.topic_list(),
                ),
                None => (None, None, &[][..], &[][..]),
            },
        };

        let mut properties = ClientProperties::new();
        if let Some(codec) = self.codec(parameter, kind, Slot::Key, explicit_key)? {
            _ = properties.insert(key_slot, codec);
        }
        if let Some(codec) = self.codec(parameter, kind, Slot::Value, explicit_value)? {
            _ = properties.insert(value_slot, codec);
        }
        properties.extend(ClientProperties::from(parse_properties_from_list(entries)));
        properties.extend(context.client_properties());

        tracing::debug!(
            parameter = parameter.name(),
            resolver = self.variant.name(),
            declared = parameter.declared().declared().name(),
            "constructing client"
        );
        let spec = ClientSpec {
            properties,
            topics: topics.to_vec(),
        };
        match parameter.declared().construct(spec) {
            None => Ok(None),
            Some(Ok(resolved)) => Ok(Some(resolved)),
            Some(Err(source)) => Err(HarnessError::Client {
                parameter: parameter.name().to_owned(),
                source,
            }),
        }
    }
}

/// Producers, consumers and the merged configuration map.
///
/// `ClientProperties` is only resolved when annotated, and receives only explicitly configured
/// codecs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreClients;

impl ClientVariant for CoreClients {
    fn name(&self) -> &'static str {
        "core"
    }

    fn producer_types(&self) -> &'static [RawType] {
        &[KAFKA_PRODUCER, PRODUCER]
    }

    fn consumer_types(&self) -> &'static [RawType] {
        &[KAFKA_CONSUMER, CONSUMER]
    }

    fn annotated_only_types(&self) -> &'static [RawType] {
        &[CLIENT_PROPERTIES]
    }

    fn guesses(&self, declared: &ParameterType) -> bool {
        declared.raw() != CLIENT_PROPERTIES
    }
}

/// Stream-based senders and receivers with their options.
#[cfg(feature = "reactive")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ReactiveClients;

#[cfg(feature = "reactive")]
impl ClientVariant for ReactiveClients {
    fn name(&self) -> &'static str {
        "reactive"
    }

    fn producer_types(&self) -> &'static [RawType] {
        use embedded_kafka_client::reactive::{KAFKA_SENDER, SENDER_OPTIONS};
        &[KAFKA_SENDER, SENDER_OPTIONS]
    }

    fn consumer_types(&self) -> &'static [RawType] {
        use embedded_kafka_client::reactive::{KAFKA_RECEIVER, RECEIVER_OPTIONS};
        &[KAFKA_RECEIVER, RECEIVER_OPTIONS]
    }
}

/// Templates and client factories.
#[cfg(feature = "template")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateClients;

#[cfg(feature = "template")]
impl ClientVariant for TemplateClients {
    fn name(&self) -> &'static str {
        "template"
    }

    fn producer_types(&self) -> &'static [RawType] {
        use embedded_kafka_client::template::{KAFKA_OPERATIONS, KAFKA_TEMPLATE, PRODUCER_FACTORY};
        &[KAFKA_TEMPLATE, KAFKA_OPERATIONS, PRODUCER_FACTORY]
    }

    fn consumer_types(&self) -> &'static [RawType] {
        use embedded_kafka_client::template::CONSUMER_FACTORY;
        &[CONSUMER_FACTORY]
    }
}
