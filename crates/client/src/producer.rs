// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Producer client.

use crate::codec::{CodecKind, Serializer};
use crate::config::{ClientProperties, keys};
use crate::connection;
use crate::error::ClientError;
use crate::inject::{ClientSpec, Closeable, DisposableParameter, Injectable, RawType, TypeToken};
use embedded_kafka_engine::memory::BrokerHandle;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Raw type of [`KafkaProducer`].
pub const KAFKA_PRODUCER: RawType = RawType::new("KafkaProducer");
/// Raw type of `Box<dyn Producer<K, V>>`.
pub const PRODUCER: RawType = RawType::new("Producer");

/// A record to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord<K, V> {
    topic: String,
    partition: Option<u32>,
    key: Option<K>,
    value: Option<V>,
}

impl<K, V> ProducerRecord<K, V> {
    /// A keyed record.
    pub fn new(topic: impl Into<String>, key: K, value: V) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            key: Some(key),
            value: Some(value),
        }
    }

    /// A record without key.
    pub fn value_only(topic: impl Into<String>, value: V) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            key: None,
            value: Some(value),
        }
    }

    /// Pins the record to a partition instead of letting the broker choose.
    #[must_use]
    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Target topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Key.
    #[must_use]
    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    /// Value.
    #[must_use]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }
}

/// Where a sent record was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Topic.
    pub topic: String,
    /// Partition.
    pub partition: u32,
    /// Offset within the partition.
    pub offset: u64,
}

/// Producer operations, for code written against the interface rather than the client.
pub trait Producer<K, V>: Send + Sync {
    /// Sends a record and returns where it was stored.
    fn send(&self, record: ProducerRecord<K, V>) -> Result<RecordMetadata, ClientError>;

    /// Number of partitions of a topic.
    fn partition_count(&self, topic: &str) -> Result<u32, ClientError>;

    /// Waits for buffered records to be sent.
    fn flush(&self) -> Result<(), ClientError>;

    /// Closes the producer.
    fn close(&self) -> Result<(), ClientError>;
}

/// Producer client bound to a running broker. Cheap to clone; clones share the connection.
pub struct KafkaProducer<K, V> {
    inner: Arc<ProducerInner<K, V>>,
}

struct ProducerInner<K, V> {
    client_id: String,
    broker: BrokerHandle,
    key_serializer: Box<dyn Serializer<K>>,
    value_serializer: Box<dyn Serializer<V>>,
    closed: AtomicBool,
}

impl<K, V> Clone for KafkaProducer<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: 'static, V: 'static> KafkaProducer<K, V> {
    /// Connects to `bootstrap.servers` and instantiates `key.serializer` and `value.serializer`.
    pub fn new(properties: &ClientProperties) -> Result<Self, ClientError> {
        let broker = connection::connect(properties)?;
        let key_serializer = properties
            .codec(keys::KEY_SERIALIZER, CodecKind::Serializer)?
            .new_serializer::<K>()?;
        let value_serializer = properties
            .codec(keys::VALUE_SERIALIZER, CodecKind::Serializer)?
            .new_serializer::<V>()?;
        let client_id = connection::client_id(properties, "producer");
        tracing::debug!(%client_id, bootstrap = broker.bootstrap_address(), "producer created");
        Ok(Self {
            inner: Arc::new(ProducerInner {
                client_id,
                broker,
                key_serializer,
                value_serializer,
                closed: AtomicBool::new(false),
            }),
        })
    }
}

impl<K, V> KafkaProducer<K, V> {
    /// Client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.inner.closed.load(Ordering::Acquire) {
            Err(ClientError::Closed { client: "producer" })
        } else {
            Ok(())
        }
    }

    /// Serializes and appends a record.
    pub fn send(&self, record: ProducerRecord<K, V>) -> Result<RecordMetadata, ClientError> {
        self.ensure_open()?;
        let inner = &self.inner;
        let topic = record.topic.as_str();
        let key = record
            .key
            .as_ref()
            .map(|key| inner.key_serializer.serialize(topic, key))
            .transpose()?;
        let value = record
            .value
            .as_ref()
            .map(|value| inner.value_serializer.serialize(topic, value))
            .transpose()?;
        let position = inner.broker.append(topic, record.partition, key, value)?;
        tracing::trace!(
            client_id = %inner.client_id,
            topic,
            partition = position.partition,
            offset = position.offset,
            "record sent"
        );
        Ok(RecordMetadata {
            topic: position.topic.into_string(),
            partition: position.partition,
            offset: position.offset,
        })
    }

    /// Number of partitions of a topic, auto-creating it when the broker allows.
    pub fn partition_count(&self, topic: &str) -> Result<u32, ClientError> {
        self.ensure_open()?;
        Ok(self.inner.broker.partition_count(topic)?)
    }

    /// Records are appended synchronously, so there is nothing to wait for.
    pub fn flush(&self) -> Result<(), ClientError> {
        self.ensure_open()
    }

    /// Closes the producer. Idempotent.
    pub fn close(&self) -> Result<(), ClientError> {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(client_id = %self.inner.client_id, "producer closed");
        }
        Ok(())
    }
}

impl<K, V> Producer<K, V> for KafkaProducer<K, V> {
    fn send(&self, record: ProducerRecord<K, V>) -> Result<RecordMetadata, ClientError> {
        KafkaProducer::send(self, record)
    }

    fn partition_count(&self, topic: &str) -> Result<u32, ClientError> {
        KafkaProducer::partition_count(self, topic)
    }

    fn flush(&self) -> Result<(), ClientError> {
        KafkaProducer::flush(self)
    }

    fn close(&self) -> Result<(), ClientError> {
        KafkaProducer::close(self)
    }
}

impl<K, V> Closeable for KafkaProducer<K, V> {
    fn close(&self) -> Result<(), ClientError> {
        KafkaProducer::close(self)
    }
}

impl<K: 'static, V: 'static> Injectable for KafkaProducer<K, V> {
    const RAW: RawType = KAFKA_PRODUCER;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        Self::new(&spec.properties).map(DisposableParameter::closeable)
    }
}

impl<K: 'static, V: 'static> Injectable for Box<dyn Producer<K, V>> {
    const RAW: RawType = PRODUCER;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        let producer = KafkaProducer::<K, V>::new(&spec.properties)?;
        let handle = producer.clone();
        let boxed: Box<dyn Producer<K, V>> = Box::new(producer);
        Ok(DisposableParameter::new(boxed, move || handle.close()))
    }
}
