// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Stream-based clients: [`KafkaSender`] and [`KafkaReceiver`] with their options.

use crate::config::{ClientProperties, PropertyValue};
use crate::consumer::{ConsumerRecord, KafkaConsumer};
use crate::error::ClientError;
use crate::inject::{ClientSpec, Closeable, DisposableParameter, Injectable, RawType, TypeToken};
use crate::producer::{KafkaProducer, ProducerRecord, RecordMetadata};
use embedded_kafka_engine::BrokerError;
use futures::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

/// Raw type of [`SenderOptions`].
pub const SENDER_OPTIONS: RawType = RawType::new("SenderOptions");
/// Raw type of [`KafkaSender`].
pub const KAFKA_SENDER: RawType = RawType::new("KafkaSender");
/// Raw type of [`ReceiverOptions`].
pub const RECEIVER_OPTIONS: RawType = RawType::new("ReceiverOptions");
/// Raw type of [`KafkaReceiver`].
pub const KAFKA_RECEIVER: RawType = RawType::new("KafkaReceiver");

/// Configuration of a [`KafkaSender`].
pub struct SenderOptions<K, V> {
    properties: ClientProperties,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for SenderOptions<K, V> {
    fn clone(&self) -> Self {
        Self::create(self.properties.clone())
    }
}

impl<K, V> SenderOptions<K, V> {
    /// Options backed by the given properties.
    #[must_use]
    pub fn create(properties: ClientProperties) -> Self {
        Self {
            properties,
            _types: PhantomData,
        }
    }

    /// Adds or replaces a property.
    #[must_use]
    pub fn producer_property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        _ = self.properties.insert(key, value);
        self
    }

    /// Producer properties.
    #[must_use]
    pub fn producer_properties(&self) -> &ClientProperties {
        &self.properties
    }
}

/// Sends records asynchronously through an owned producer.
pub struct KafkaSender<K, V> {
    producer: KafkaProducer<K, V>,
}

impl<K, V> Clone for KafkaSender<K, V> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
        }
    }
}

impl<K: 'static, V: 'static> KafkaSender<K, V> {
    /// Creates the sender and its producer.
    pub fn create(options: SenderOptions<K, V>) -> Result<Self, ClientError> {
        Ok(Self {
            producer: KafkaProducer::new(&options.properties)?,
        })
    }
}

impl<K, V> KafkaSender<K, V> {
    /// Sends one record.
    pub async fn send(&self, record: ProducerRecord<K, V>) -> Result<RecordMetadata, ClientError> {
        self.producer.send(record)
    }

    /// Sends every record of `records` in order, yielding one result per record.
    pub fn send_all<'a, S>(
        &'a self,
        records: S,
    ) -> impl Stream<Item = Result<RecordMetadata, ClientError>> + 'a
    where
        S: Stream<Item = ProducerRecord<K, V>> + 'a,
    {
        records.map(move |record| self.producer.send(record))
    }

    /// Closes the producer.
    pub fn close(&self) -> Result<(), ClientError> {
        self.producer.close()
    }
}

impl<K, V> Closeable for KafkaSender<K, V> {
    fn close(&self) -> Result<(), ClientError> {
        KafkaSender::close(self)
    }
}

/// Configuration of a [`KafkaReceiver`]: properties plus subscription.
pub struct ReceiverOptions<K, V> {
    properties: ClientProperties,
    topics: Vec<String>,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for ReceiverOptions<K, V> {
    fn clone(&self) -> Self {
        Self::create(self.properties.clone()).subscription(self.topics.clone())
    }
}

impl<K, V> ReceiverOptions<K, V> {
    /// Options backed by the given properties, without subscription.
    #[must_use]
    pub fn create(properties: ClientProperties) -> Self {
        Self {
            properties,
            topics: Vec::new(),
            _types: PhantomData,
        }
    }

    /// Sets the topics to subscribe to.
    #[must_use]
    pub fn subscription<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Adds or replaces a property.
    #[must_use]
    pub fn consumer_property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        _ = self.properties.insert(key, value);
        self
    }

    /// Subscribed topics.
    #[must_use]
    pub fn subscription_topics(&self) -> &[String] {
        &self.topics
    }

    /// Consumer properties.
    #[must_use]
    pub fn consumer_properties(&self) -> &ClientProperties {
        &self.properties
    }
}

/// Exposes subscribed topics as a stream of records.
///
/// Each call to [`receive`](Self::receive) creates and subscribes its own consumer; all of them
/// are closed by [`close`](Self::close).
pub struct KafkaReceiver<K, V> {
    options: ReceiverOptions<K, V>,
    consumers: Arc<Mutex<Vec<KafkaConsumer<K, V>>>>,
}

impl<K, V> Clone for KafkaReceiver<K, V> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            consumers: Arc::clone(&self.consumers),
        }
    }
}

impl<K, V> KafkaReceiver<K, V> {
    /// Creates a receiver. No consumer exists until [`receive`](Self::receive) is called.
    #[must_use]
    pub fn create(options: ReceiverOptions<K, V>) -> Self {
        Self {
            options,
            consumers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Receiver options.
    #[must_use]
    pub fn options(&self) -> &ReceiverOptions<K, V> {
        &self.options
    }

    /// Closes every consumer created by this receiver.
    pub fn close(&self) -> Result<(), ClientError> {
        let consumers = std::mem::take(&mut *self.consumers.lock());
        for consumer in consumers {
            consumer.close()?;
        }
        Ok(())
    }
}

impl<K, V> KafkaReceiver<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// Subscribes a new consumer and streams its records. The stream ends when the consumer
    /// or the broker is closed.
    pub fn receive(
        &self,
    ) -> Result<impl Stream<Item = Result<ConsumerRecord<K, V>, ClientError>> + Send + 'static, ClientError>
    {
        let consumer = KafkaConsumer::<K, V>::new(&self.options.properties)?;
        consumer.subscribe(&self.options.topics)?;
        self.consumers.lock().push(consumer.clone());

        Ok(stream::unfold(
            (consumer, VecDeque::new()),
            |(consumer, mut buffered)| async move {
                loop {
                    if let Some(record) = buffered.pop_front() {
                        return Some((Ok(record), (consumer, buffered)));
                    }
                    match consumer.poll_async().await {
                        Ok(records) => buffered.extend(records),
                        Err(ClientError::Closed { .. })
                        | Err(ClientError::Broker(BrokerError::BrokerClosed)) => return None,
                        Err(error) => return Some((Err(error), (consumer, buffered))),
                    }
                }
            },
        ))
    }
}

impl<K, V> Closeable for KafkaReceiver<K, V> {
    fn close(&self) -> Result<(), ClientError> {
        KafkaReceiver::close(self)
    }
}

impl<K: 'static, V: 'static> Injectable for SenderOptions<K, V> {
    const RAW: RawType = SENDER_OPTIONS;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        Ok(DisposableParameter::plain(Self::create(spec.properties)))
    }
}

impl<K: 'static, V: 'static> Injectable for KafkaSender<K, V> {
    const RAW: RawType = KAFKA_SENDER;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        Self::create(SenderOptions::create(spec.properties)).map(DisposableParameter::closeable)
    }
}

impl<K: 'static, V: 'static> Injectable for ReceiverOptions<K, V> {
    const RAW: RawType = RECEIVER_OPTIONS;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        Ok(DisposableParameter::plain(
            Self::create(spec.properties).subscription(spec.topics),
        ))
    }
}

impl<K: 'static, V: 'static> Injectable for KafkaReceiver<K, V> {
    const RAW: RawType = KAFKA_RECEIVER;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        let options = ReceiverOptions::create(spec.properties).subscription(spec.topics);
        Ok(DisposableParameter::closeable(Self::create(options)))
    }
}
