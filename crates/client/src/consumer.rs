// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Consumer client.
//!
//! Consumers join the group named by `group.id` when they subscribe. Records handed out by a
//! poll are committed immediately, so each record reaches one member of the group.

use crate::codec::{CodecKind, Deserializer};
use crate::config::{ClientProperties, keys};
use crate::connection;
use crate::error::ClientError;
use crate::inject::{ClientSpec, Closeable, DisposableParameter, Injectable, RawType, TypeToken};
use embedded_kafka_engine::memory::{BrokerHandle, FetchedRecord, OffsetReset};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Raw type of [`KafkaConsumer`].
pub const KAFKA_CONSUMER: RawType = RawType::new("KafkaConsumer");
/// Raw type of `Box<dyn Consumer<K, V>>`.
pub const CONSUMER: RawType = RawType::new("Consumer");

const DEFAULT_MAX_POLL_RECORDS: usize = 500;

/// A record read from a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerRecord<K, V> {
    topic: String,
    partition: u32,
    offset: u64,
    timestamp_ms: u64,
    key: Option<K>,
    value: Option<V>,
}

impl<K, V> ConsumerRecord<K, V> {
    /// Topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Partition.
    #[must_use]
    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Offset within the partition.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Append time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
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

    /// Splits into key and value.
    #[must_use]
    pub fn into_key_value(self) -> (Option<K>, Option<V>) {
        (self.key, self.value)
    }
}

/// Records returned by one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerRecords<K, V> {
    records: Vec<ConsumerRecord<K, V>>,
}

impl<K, V> ConsumerRecords<K, V> {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the poll returned nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in delivery order.
    pub fn iter(&self) -> std::slice::Iter<'_, ConsumerRecord<K, V>> {
        self.records.iter()
    }

    /// Records of one topic.
    pub fn records<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a ConsumerRecord<K, V>> {
        self.records.iter().filter(move |record| record.topic == topic)
    }
}

impl<K, V> IntoIterator for ConsumerRecords<K, V> {
    type Item = ConsumerRecord<K, V>;
    type IntoIter = std::vec::IntoIter<ConsumerRecord<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Consumer operations, for code written against the interface rather than the client.
pub trait Consumer<K, V>: Send + Sync {
    /// Replaces the subscription and joins the group.
    fn subscribe(&self, topics: &[String]) -> Result<(), ClientError>;

    /// Leaves the group and clears the subscription.
    fn unsubscribe(&self) -> Result<(), ClientError>;

    /// Current subscription.
    fn subscription(&self) -> Vec<String>;

    /// Waits up to `timeout` for records.
    fn poll(&self, timeout: Duration) -> Result<ConsumerRecords<K, V>, ClientError>;

    /// Closes the consumer, leaving its group.
    fn close(&self) -> Result<(), ClientError>;
}

/// Consumer client bound to a running broker. Cheap to clone; clones share the membership.
pub struct KafkaConsumer<K, V> {
    inner: Arc<ConsumerInner<K, V>>,
}

struct ConsumerInner<K, V> {
    member_id: String,
    group_id: Option<String>,
    reset: OffsetReset,
    max_poll_records: usize,
    broker: BrokerHandle,
    key_deserializer: Box<dyn Deserializer<K>>,
    value_deserializer: Box<dyn Deserializer<V>>,
    subscription: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl<K, V> Clone for KafkaConsumer<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: 'static, V: 'static> KafkaConsumer<K, V> {
    /// Connects to `bootstrap.servers` and instantiates `key.deserializer` and
    /// `value.deserializer`. `group.id` is only required once the consumer subscribes.
    pub fn new(properties: &ClientProperties) -> Result<Self, ClientError> {
        let broker = connection::connect(properties)?;
        let key_deserializer = properties
            .codec(keys::KEY_DESERIALIZER, CodecKind::Deserializer)?
            .new_deserializer::<K>()?;
        let value_deserializer = properties
            .codec(keys::VALUE_DESERIALIZER, CodecKind::Deserializer)?
            .new_deserializer::<V>()?;
        let reset = match properties.text(keys::AUTO_OFFSET_RESET) {
            None => OffsetReset::default(),
            Some(raw) => OffsetReset::parse(raw).ok_or_else(|| ClientError::InvalidProperty {
                key: keys::AUTO_OFFSET_RESET.to_owned(),
                value: raw.to_owned(),
                reason: "expected `earliest` or `latest`".to_owned(),
            })?,
        };
        let max_poll_records =
            properties.parse_or(keys::MAX_POLL_RECORDS, DEFAULT_MAX_POLL_RECORDS)?;
        let member_id = connection::client_id(properties, "consumer");
        tracing::debug!(%member_id, bootstrap = broker.bootstrap_address(), "consumer created");
        Ok(Self {
            inner: Arc::new(ConsumerInner {
                member_id,
                group_id: properties.text(keys::GROUP_ID).map(str::to_owned),
                reset,
                max_poll_records: max_poll_records.max(1),
                broker,
                key_deserializer,
                value_deserializer,
                subscription: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }
}

impl<K, V> KafkaConsumer<K, V> {
    /// Member id within the group.
    #[must_use]
    pub fn member_id(&self) -> &str {
        &self.inner.member_id
    }

    /// Group id, when configured.
    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        self.inner.group_id.as_deref()
    }

    /// True once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.is_closed() {
            Err(ClientError::Closed { client: "consumer" })
        } else {
            Ok(())
        }
    }

    /// Replaces the subscription and joins the group.
    pub fn subscribe(&self, topics: &[String]) -> Result<(), ClientError> {
        self.ensure_open()?;
        let group_id = self
            .inner
            .group_id
            .as_deref()
            .ok_or_else(|| ClientError::MissingProperty {
                key: keys::GROUP_ID.to_owned(),
            })?;
        self.inner
            .broker
            .join_group(group_id, &self.inner.member_id, topics, self.inner.reset)?;
        *self.inner.subscription.lock() = topics.to_vec();
        tracing::debug!(member_id = %self.inner.member_id, group_id, ?topics, "consumer subscribed");
        Ok(())
    }

    /// Leaves the group and clears the subscription. A no-op without subscription.
    pub fn unsubscribe(&self) -> Result<(), ClientError> {
        let previous = std::mem::take(&mut *self.inner.subscription.lock());
        if previous.is_empty() {
            return Ok(());
        }
        if let Some(group_id) = self.inner.group_id.as_deref() {
            _ = self.inner.broker.leave_group(group_id, &self.inner.member_id);
        }
        tracing::debug!(member_id = %self.inner.member_id, "consumer unsubscribed");
        Ok(())
    }

    /// Current subscription.
    #[must_use]
    pub fn subscription(&self) -> Vec<String> {
        self.inner.subscription.lock().clone()
    }

    /// Closes the consumer, leaving its group. Idempotent.
    pub fn close(&self) -> Result<(), ClientError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.unsubscribe()?;
        tracing::debug!(member_id = %self.inner.member_id, "consumer closed");
        Ok(())
    }

    fn fetch(&self) -> Result<ConsumerRecords<K, V>, ClientError> {
        self.ensure_open()?;
        let Some(group_id) = self.inner.group_id.as_deref() else {
            return Err(ClientError::NotSubscribed);
        };
        if self.inner.subscription.lock().is_empty() {
            return Err(ClientError::NotSubscribed);
        }
        let fetched =
            self.inner
                .broker
                .fetch(group_id, &self.inner.member_id, self.inner.max_poll_records)?;
        let records = fetched
            .into_iter()
            .map(|fetched| self.decode(fetched))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ConsumerRecords { records })
    }

    fn decode(&self, fetched: FetchedRecord) -> Result<ConsumerRecord<K, V>, ClientError> {
        let topic = fetched.topic.into_string();
        let record = fetched.record;
        let key = record
            .key
            .map(|key| self.inner.key_deserializer.deserialize(&topic, &key))
            .transpose()?;
        let value = record
            .value
            .map(|value| self.inner.value_deserializer.deserialize(&topic, &value))
            .transpose()?;
        Ok(ConsumerRecord {
            topic,
            partition: fetched.partition,
            offset: record.offset,
            timestamp_ms: record.timestamp_ms,
            key,
            value,
        })
    }

    /// Waits up to `timeout` for records. Returns an empty batch on timeout.
    pub fn poll(&self, timeout: Duration) -> Result<ConsumerRecords<K, V>, ClientError> {
        let deadline = Instant::now() + timeout;
        loop {
            let seen = self.inner.broker.append_version();
            let records = self.fetch()?;
            let now = Instant::now();
            if !records.is_empty() || now >= deadline {
                return Ok(records);
            }
            _ = self.inner.broker.wait_for_append(seen, deadline - now);
        }
    }

    /// Waits, without blocking the executor, until records are available.
    pub async fn poll_async(&self) -> Result<ConsumerRecords<K, V>, ClientError> {
        loop {
            let mut appended = std::pin::pin!(self.inner.broker.appended());
            _ = appended.as_mut().enable();
            let records = self.fetch()?;
            if !records.is_empty() {
                return Ok(records);
            }
            appended.await;
        }
    }
}

impl<K, V> Consumer<K, V> for KafkaConsumer<K, V> {
    fn subscribe(&self, topics: &[String]) -> Result<(), ClientError> {
        KafkaConsumer::subscribe(self, topics)
    }

    fn unsubscribe(&self) -> Result<(), ClientError> {
        KafkaConsumer::unsubscribe(self)
    }

    fn subscription(&self) -> Vec<String> {
        KafkaConsumer::subscription(self)
    }

    fn poll(&self, timeout: Duration) -> Result<ConsumerRecords<K, V>, ClientError> {
        KafkaConsumer::poll(self, timeout)
    }

    fn close(&self) -> Result<(), ClientError> {
        KafkaConsumer::close(self)
    }
}

impl<K, V> Closeable for KafkaConsumer<K, V> {
    fn close(&self) -> Result<(), ClientError> {
        KafkaConsumer::close(self)
    }
}

/// Builds a consumer and, when topics are given, subscribes it. A subscribed consumer is
/// disposed by unsubscribing first and closing second.
fn construct_consumer<K: 'static, V: 'static>(
    spec: &ClientSpec,
) -> Result<(KafkaConsumer<K, V>, bool), ClientError> {
    let consumer = KafkaConsumer::<K, V>::new(&spec.properties)?;
    if spec.topics.is_empty() {
        return Ok((consumer, false));
    }
    if let Err(error) = consumer.subscribe(&spec.topics) {
        _ = consumer.close();
        return Err(error);
    }
    Ok((consumer, true))
}

fn consumer_disposer<K, V>(
    consumer: KafkaConsumer<K, V>,
    subscribed: bool,
) -> impl FnOnce() -> Result<(), ClientError> + Send + 'static
where
    K: 'static,
    V: 'static,
{
    move || {
        if subscribed {
            consumer.unsubscribe()?;
        }
        consumer.close()
    }
}

impl<K: 'static, V: 'static> Injectable for KafkaConsumer<K, V> {
    const RAW: RawType = KAFKA_CONSUMER;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        let (consumer, subscribed) = construct_consumer::<K, V>(&spec)?;
        let disposer = consumer_disposer(consumer.clone(), subscribed);
        Ok(DisposableParameter::new(consumer, disposer))
    }
}

impl<K: 'static, V: 'static> Injectable for Box<dyn Consumer<K, V>> {
    const RAW: RawType = CONSUMER;

    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        Some((TypeToken::of::<K>(), TypeToken::of::<V>()))
    }

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        let (consumer, subscribed) = construct_consumer::<K, V>(&spec)?;
        let disposer = consumer_disposer(consumer.clone(), subscribed);
        let boxed: Box<dyn Consumer<K, V>> = Box::new(consumer);
        Ok(DisposableParameter::new(boxed, disposer))
    }
}
