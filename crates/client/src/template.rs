// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Template and factory clients.

use crate::config::{ClientProperties, keys};
use crate::consumer::KafkaConsumer;
use crate::error::ClientError;
use crate::inject::{ClientSpec, Closeable, DisposableParameter, Injectable, RawType, TypeToken};
use crate::producer::{KafkaProducer, ProducerRecord, RecordMetadata};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;

/// Raw type of [`KafkaTemplate`].
pub const KAFKA_TEMPLATE: RawType = RawType::new("KafkaTemplate");
/// Raw type of `Box<dyn KafkaOperations<K, V>>`.
pub const KAFKA_OPERATIONS: RawType = RawType::new("KafkaOperations");
/// Raw type of [`ProducerFactory`].
pub const PRODUCER_FACTORY: RawType = RawType::new("ProducerFactory");
/// Raw type of [`ConsumerFactory`].
pub const CONSUMER_FACTORY: RawType = RawType::new("ConsumerFactory");

/// Creates producers from a fixed configuration.
pub struct ProducerFactory<K, V> {
    properties: ClientProperties,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for ProducerFactory<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.properties.clone())
    }
}

impl<K, V> ProducerFactory<K, V> {
    /// Factory for the given properties.
    #[must_use]
    pub fn new(properties: ClientProperties) -> Self {
        Self {
            properties,
            _types: PhantomData,
        }
    }

    /// Producer configuration.
    #[must_use]
    pub fn configuration(&self) -> &ClientProperties {
        &self.properties
    }
}

impl<K: 'static, V: 'static> ProducerFactory<K, V> {
    /// Creates a new producer.
    pub fn create_producer(&self) -> Result<KafkaProducer<K, V>, ClientError> {
        KafkaProducer::new(&self.properties)
    }
}

/// Creates consumers from a fixed configuration.
pub struct ConsumerFactory<K, V> {
    properties: ClientProperties,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for ConsumerFactory<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.properties.clone())
    }
}

impl<K, V> ConsumerFactory<K, V> {
    /// Factory for the given properties.
    #[must_use]
    pub fn new(properties: ClientProperties) -> Self {
        Self {
            properties,
            _types: PhantomData,
        }
    }

    /// Consumer configuration.
    #[must_use]
    pub fn configuration(&self) -> &ClientProperties {
        &self.properties
    }
}

impl<K: 'static, V: 'static> ConsumerFactory<K, V> {
    /// Creates a new consumer, optionally overriding `group.id`.
    pub fn create_consumer(&self, group_id: Option<&str>) -> Result<KafkaConsumer<K, V>, ClientError> {
        match group_id {
            None => KafkaConsumer::new(&self.properties),
            Some(group_id) => {
                KafkaConsumer::new(&self.properties.clone().with(keys::GROUP_ID, group_id))
            }
        }
    }
}

/// High-level send operations.
pub trait KafkaOperations<K, V>: Send + Sync {
    /// Sends `value` with an optional key to `topic`.
    fn send(&self, topic: &str, key: Option<K>, value: V) -> Result<RecordMetadata, ClientError>;

    /// Sends a prepared record.
    fn send_record(&self, record: ProducerRecord<K, V>) -> Result<RecordMetadata, ClientError>;

    /// Sends `value` to the default topic.
    fn send_default(&self, value: V) -> Result<RecordMetadata, ClientError>;

    /// Flushes the underlying producer.
    fn flush(&self) -> Result<(), ClientError>;
}

/// Sends through a lazily created producer shared by all clones.
pub struct KafkaTemplate<K, V> {
    inner: Arc<TemplateInner<K, V>>,
}

struct TemplateInner<K, V> {
    factory: ProducerFactory<K, V>,
    producer: Mutex<Option<KafkaProducer<K, V>>>,
    default_topic: Mutex<Option<String>>,
}

impl<K, V> Clone for KafkaTemplate<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> KafkaTemplate<K, V> {
    /// Template over the given factory.
    #[must_use]
    pub fn new(factory: ProducerFactory<K, V>) -> Self {
        Self {
            inner: Arc::new(TemplateInner {
                factory,
                producer: Mutex::new(None),
                default_topic: Mutex::new(None),
            }),
        }
    }

    /// Factory the template creates its producer from.
    #[must_use]
    pub fn producer_factory(&self) -> &ProducerFactory<K, V> {
        &self.inner.factory
    }

    /// Sets the topic used by `send_default`.
    pub fn set_default_topic(&self, topic: impl Into<String>) {
        *self.inner.default_topic.lock() = Some(topic.into());
    }

    /// Closes the producer if one was created. The next send creates a new one.
    pub fn close(&self) -> Result<(), ClientError> {
        match self.inner.producer.lock().take() {
            Some(producer) => producer.close(),
            None => Ok(()),
        }
    }
}

impl<K: 'static, V: 'static> KafkaTemplate<K, V> {
    fn producer(&self) -> Result<KafkaProducer<K, V>, ClientError> {
        let mut producer = self.inner.producer.lock();
        if let Some(existing) = producer.as_ref() {
            return Ok(existing.clone());
        }
        let created = self.inner.factory.create_producer()?;
        *producer = Some(created.clone());
        Ok(created)
    }
}

impl<K: 'static, V: 'static> KafkaOperations<K, V> for KafkaTemplate<K, V> {
    fn send(&self, topic: &str, key: Option<K>, value: V) -> Result<RecordMetadata, ClientError> {
        let record = match key {
            Some(key) => ProducerRecord::new(topic, key, value),
            None => ProducerRecord::value_only(topic, value),
        };
        self.send_record(record)
    }

    fn send_record(&self, record: ProducerRecord<K, V>) -> Result<RecordMetadata, ClientError> {
        self.producer()?.send(record)
    }

    fn send_default(&self, value: V) -> Result<RecordMetadata, ClientError> {
        let topic = self
            .inner
            .default_topic
            .lock()
            .clone()
            .ok_or_else(|| ClientError::MissingProperty {
                key: "default topic".to_owned(),
            })?;
        self.send(&topic, None, value)
    }

    fn flush(&self) -> Result<(), ClientError> {
        match self.inner.producer.lock().as_ref() {
            Some(producer) => producer.flush(),
            None => Ok(()),
        }
    }
}

impl<K, V> Closeable for KafkaTemplate<K, V> {
    fn close(&self) -> Result<(), ClientError> {
        KafkaTemplate::close(self)
    }
}

impl<K: 'static, V: 'static> Injectable for KafkaTemplate<K, V> {
    const RAW: RawType = KAFKA_TEMPLATE;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        let template = Self::new(ProducerFactory::new(spec.properties));
        // Fail at resolution time rather than on first send.
        _ = template.producer()?;
        Ok(DisposableParameter::closeable(template))
    }
}

impl<K: 'static, V: 'static> Injectable for Box<dyn KafkaOperations<K, V>> {
    const RAW: RawType = KAFKA_OPERATIONS;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        let template = KafkaTemplate::<K, V>::new(ProducerFactory::new(spec.properties));
        _ = template.producer()?;
        let handle = template.clone();
        let boxed: Box<dyn KafkaOperations<K, V>> = Box::new(template);
        Ok(DisposableParameter::new(boxed, move || handle.close()))
    }
}

impl<K: 'static, V: 'static> Injectable for ProducerFactory<K, V> {
    const RAW: RawType = PRODUCER_FACTORY;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        Ok(DisposableParameter::plain(Self::new(spec.properties)))
    }
}

impl<K: 'static, V: 'static> Injectable for ConsumerFactory<K, V> {
    const RAW: RawType = CONSUMER_FACTORY;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        Ok(DisposableParameter::plain(Self::new(spec.properties)))
    }
}
