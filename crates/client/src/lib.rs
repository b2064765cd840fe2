// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Clients for the embedded broker.
//!
//! - [`producer`], [`consumer`] and [`admin`]: the core client family.
//! - [`reactive`]: stream-based sender and receiver (feature `reactive`).
//! - [`template`]: template and factory clients (feature `template`).
//!
//! Every client type that can be injected into a test implements [`inject::Injectable`], which
//! carries the type information (client family, key and value types, constructor) that the
//! parameter resolvers work from.

pub mod admin;
pub mod codec;
pub mod config;
mod connection;
pub mod consumer;
pub mod error;
pub mod guess;
pub mod inject;
pub mod producer;
#[cfg(feature = "reactive")]
pub mod reactive;
#[cfg(feature = "template")]
pub mod template;

pub use codec::{CodecClass, CodecKind, Deserializer, Serializer};
pub use config::{ClientProperties, PropertyValue};
pub use consumer::{Consumer, ConsumerRecord, ConsumerRecords, KafkaConsumer};
pub use error::{ClientError, CodecError};
pub use guess::{BuiltinSerializerTypeGuesser, GuesserRegistry, SerializerTypeGuesser};
pub use inject::{
    ClientSpec, Closeable, DisposableParameter, Injectable, ParameterType, RawType, TypeToken,
};
pub use producer::{KafkaProducer, Producer, ProducerRecord, RecordMetadata};
