// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! In-memory broker engine and the client-facing [`BrokerHandle`].

use super::endpoint::{BROKERS, COORDINATORS};
use super::group::{ConsumerGroup, OffsetReset};
use super::log::{FetchedRecord, RecordPosition, TopicPartitions};
use super::probe::ProbeListener;
use super::store::CoordinationStore;
use crate::broker::{BrokerConfig, BrokerEngineFactory, keys};
use crate::error::{BrokerError, EngineError};
use crate::service::Engine;
use bytes::Bytes;
use embedded_kafka_config::{NewTopic, TopicName};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

/// Number of brokers in an embedded cluster.
const CLUSTER_SIZE: u16 = 1;

/// Broker properties interpreted by the in-memory engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Id registered under `/brokers/ids`.
    pub broker_id: u32,
    /// Create unknown topics on first produce or subscribe.
    pub auto_create_topics: bool,
    /// Partition count of auto-created topics.
    pub num_partitions: u32,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            broker_id: 0,
            auto_create_topics: true,
            num_partitions: 1,
        }
    }
}

impl BrokerSettings {
    /// Reads the supported keys from the effective broker configuration.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, EngineError> {
        let defaults = Self::default();
        let broker_id = parse_or(config, keys::BROKER_ID, defaults.broker_id)?;
        let auto_create_topics =
            parse_or(config, keys::AUTO_CREATE_TOPICS_ENABLE, defaults.auto_create_topics)?;
        let num_partitions = parse_or(config, keys::NUM_PARTITIONS, defaults.num_partitions)?;
        if num_partitions == 0 {
            return Err(EngineError::InvalidConfig {
                key: keys::NUM_PARTITIONS.to_owned(),
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            broker_id,
            auto_create_topics,
            num_partitions,
        })
    }
}

fn parse_or<T>(config: &BrokerConfig, key: &str, default: T) -> Result<T, EngineError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match config.property(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| EngineError::InvalidConfig {
            key: key.to_owned(),
            value: raw.to_owned(),
            reason: e.to_string(),
        }),
    }
}

/// Shape of an existing topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescription {
    /// Topic name.
    pub name: TopicName,
    /// Partition count.
    pub partitions: u32,
    /// Replication factor.
    pub replication_factor: u16,
}

/// Handle on a running in-memory broker. Cheap to clone.
#[derive(Clone)]
pub struct BrokerHandle {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    bootstrap_address: String,
    settings: BrokerSettings,
    topics: RwLock<HashMap<TopicName, Arc<TopicPartitions>>>,
    groups: Mutex<HashMap<String, ConsumerGroup>>,
    version: Mutex<u64>,
    appended: Condvar,
    notify: Notify,
    closed: AtomicBool,
}

impl BrokerHandle {
    fn new(bootstrap_address: String, settings: BrokerSettings) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                bootstrap_address,
                settings,
                topics: RwLock::new(HashMap::new()),
                groups: Mutex::new(HashMap::new()),
                version: Mutex::new(0),
                appended: Condvar::new(),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Address the broker listens on.
    #[must_use]
    pub fn bootstrap_address(&self) -> &str {
        &self.inner.bootstrap_address
    }

    /// Interpreted broker properties.
    #[must_use]
    pub fn settings(&self) -> &BrokerSettings {
        &self.inner.settings
    }

    /// True once the broker has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.is_closed() {
            Err(BrokerError::BrokerClosed)
        } else {
            Ok(())
        }
    }

    /// Creates every topic or none of them.
    pub fn create_topics(&self, topics: &[NewTopic]) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut existing = self.inner.topics.write();
        let mut seen = BTreeSet::new();
        for topic in topics {
            let name = topic.name();
            if existing.contains_key(name) || !seen.insert(name) {
                return Err(BrokerError::TopicAlreadyExists {
                    topic: name.to_string(),
                });
            }
            if topic.replication_factor() > CLUSTER_SIZE {
                return Err(BrokerError::InvalidReplicationFactor {
                    topic: name.to_string(),
                    requested: topic.replication_factor(),
                    available: CLUSTER_SIZE,
                });
            }
        }
        for topic in topics {
            let partitions = TopicPartitions::new(
                topic.name().clone(),
                topic.num_partitions(),
                topic.replication_factor(),
            );
            _ = existing.insert(topic.name().clone(), Arc::new(partitions));
            tracing::debug!(
                topic = %topic.name(),
                partitions = topic.num_partitions(),
                "topic created"
            );
        }
        Ok(())
    }

    /// Names of existing topics, sorted.
    #[must_use]
    pub fn topic_names(&self) -> Vec<TopicName> {
        let mut names: Vec<_> = self.inner.topics.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Describes a topic.
    #[must_use]
    pub fn describe_topic(&self, topic: &str) -> Option<TopicDescription> {
        self.inner
            .topics
            .read()
            .get(topic)
            .map(|partitions| TopicDescription {
                name: partitions.name().clone(),
                partitions: partitions.partition_count(),
                replication_factor: partitions.replication_factor(),
            })
    }

    /// Returns the topic, creating it when auto-creation is enabled.
    fn topic_or_create(&self, topic: &str) -> Result<Arc<TopicPartitions>, BrokerError> {
        if let Some(existing) = self.inner.topics.read().get(topic) {
            return Ok(Arc::clone(existing));
        }
        if !self.inner.settings.auto_create_topics {
            return Err(BrokerError::UnknownTopic {
                topic: topic.to_owned(),
            });
        }
        let name = TopicName::parse(topic).map_err(|e| BrokerError::InvalidTopic {
            topic: topic.to_owned(),
            reason: e.to_string(),
        })?;
        let mut topics = self.inner.topics.write();
        let partitions = topics.entry(name.clone()).or_insert_with(|| {
            tracing::debug!(topic = %name, "auto-creating topic");
            Arc::new(TopicPartitions::new(
                name,
                self.inner.settings.num_partitions,
                CLUSTER_SIZE,
            ))
        });
        Ok(Arc::clone(partitions))
    }

    /// Partition count of a topic, auto-creating it when enabled.
    pub fn partition_count(&self, topic: &str) -> Result<u32, BrokerError> {
        self.ensure_open()?;
        Ok(self.topic_or_create(topic)?.partition_count())
    }

    /// Appends a serialized record and wakes waiting consumers.
    pub fn append(
        &self,
        topic: &str,
        partition: Option<u32>,
        key: Option<Bytes>,
        value: Option<Bytes>,
    ) -> Result<RecordPosition, BrokerError> {
        self.ensure_open()?;
        let partitions = self.topic_or_create(topic)?;
        let index = partition.unwrap_or_else(|| partitions.choose_partition(key.as_ref()));
        let log = partitions
            .partition(index)
            .ok_or_else(|| BrokerError::UnknownPartition {
                topic: topic.to_owned(),
                partition: index,
            })?;
        let offset = log.append(key, value);
        self.signal_append();
        Ok(RecordPosition {
            topic: partitions.name().clone(),
            partition: index,
            offset,
        })
    }

    fn signal_append(&self) {
        {
            let mut version = self.inner.version.lock();
            *version = version.wrapping_add(1);
        }
        _ = self.inner.appended.notify_all();
        self.inner.notify.notify_waiters();
    }

    /// Adds or updates a group member and its subscription.
    ///
    /// With [`OffsetReset::Latest`], positions of existing partitions are pinned to the current
    /// end so that records appended after joining are delivered.
    pub fn join_group(
        &self,
        group_id: &str,
        member_id: &str,
        topics: &[String],
        reset: OffsetReset,
    ) -> Result<(), BrokerError> {
        self.ensure_open()?;
        if group_id.trim().is_empty() {
            return Err(BrokerError::InvalidGroupId);
        }
        let mut subscribed = BTreeSet::new();
        let mut existing = Vec::new();
        for topic in topics {
            match self.topic_or_create(topic) {
                Ok(partitions) => {
                    _ = subscribed.insert(partitions.name().clone());
                    existing.push(partitions);
                }
                Err(BrokerError::UnknownTopic { .. }) => {
                    let name = TopicName::parse(topic).map_err(|e| BrokerError::InvalidTopic {
                        topic: topic.clone(),
                        reason: e.to_string(),
                    })?;
                    _ = subscribed.insert(name);
                }
                Err(other) => return Err(other),
            }
        }

        let mut groups = self.inner.groups.lock();
        let group = groups.entry(group_id.to_owned()).or_default();
        group.join(member_id, subscribed, reset);
        for partitions in existing {
            for index in 0..partitions.partition_count() {
                if let Some(log) = partitions.partition(index) {
                    _ = group.position(partitions.name(), index, reset, log.end_offset());
                }
            }
        }
        tracing::debug!(group = group_id, member = member_id, "member joined group");
        Ok(())
    }

    /// Removes a member from its group. Returns true when it was a member.
    pub fn leave_group(&self, group_id: &str, member_id: &str) -> bool {
        let mut groups = self.inner.groups.lock();
        let Some(group) = groups.get_mut(group_id) else {
            return false;
        };
        let left = group.leave(member_id);
        if left {
            tracing::debug!(group = group_id, member = member_id, "member left group");
        }
        left
    }

    /// Topics a member is subscribed to.
    pub fn subscription(&self, group_id: &str, member_id: &str) -> Result<Vec<TopicName>, BrokerError> {
        let groups = self.inner.groups.lock();
        groups
            .get(group_id)
            .ok_or_else(|| BrokerError::UnknownMember {
                group: group_id.to_owned(),
                member: member_id.to_owned(),
            })?
            .subscription(group_id, member_id)
    }

    /// Partitions currently owned by a member.
    pub fn assignment(&self, group_id: &str, member_id: &str) -> Result<Vec<(TopicName, u32)>, BrokerError> {
        let topics = self.inner.topics.read();
        let groups = self.inner.groups.lock();
        let group = groups
            .get(group_id)
            .ok_or_else(|| BrokerError::UnknownMember {
                group: group_id.to_owned(),
                member: member_id.to_owned(),
            })?;
        group.assignment(group_id, member_id, |topic| {
            topics.get(topic).map(|t| t.partition_count())
        })
    }

    /// Hands out up to `max_records` records from the member's partitions and commits them.
    pub fn fetch(
        &self,
        group_id: &str,
        member_id: &str,
        max_records: usize,
    ) -> Result<Vec<FetchedRecord>, BrokerError> {
        self.ensure_open()?;
        let topics = self.inner.topics.read();
        let mut groups = self.inner.groups.lock();
        let group = groups
            .get_mut(group_id)
            .ok_or_else(|| BrokerError::UnknownMember {
                group: group_id.to_owned(),
                member: member_id.to_owned(),
            })?;
        let reset = group.reset_of(group_id, member_id)?;
        let assignment = group.assignment(group_id, member_id, |topic| {
            topics.get(topic).map(|t| t.partition_count())
        })?;

        let mut fetched = Vec::new();
        for (topic, index) in assignment {
            if fetched.len() >= max_records {
                break;
            }
            let Some(log) = topics.get(&topic).and_then(|t| t.partition(index)) else {
                continue;
            };
            let position = group.position(&topic, index, reset, log.end_offset());
            let records = log.read(position, max_records - fetched.len());
            if let Some(last) = records.last() {
                group.commit(&topic, index, last.offset + 1);
            }
            fetched.extend(records.into_iter().map(|record| FetchedRecord {
                topic: topic.clone(),
                partition: index,
                record,
            }));
        }
        Ok(fetched)
    }

    /// Counter bumped on every append. Pair with [`Self::wait_for_append`].
    #[must_use]
    pub fn append_version(&self) -> u64 {
        *self.inner.version.lock()
    }

    /// Blocks until the append counter moves past `seen`, the broker closes or `timeout` elapses.
    /// Returns false on timeout.
    pub fn wait_for_append(&self, seen: u64, timeout: Duration) -> bool {
        let mut version = self.inner.version.lock();
        if *version != seen || self.is_closed() {
            return true;
        }
        !self.inner.appended.wait_for(&mut version, timeout).timed_out()
    }

    /// Future resolved on the next append or close. Call `enable` on it before checking for
    /// records to avoid missing a wakeup.
    pub fn appended(&self) -> Notified<'_> {
        self.inner.notify.notified()
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.topics.write().clear();
        self.inner.groups.lock().clear();
        self.signal_append();
    }
}

impl std::fmt::Debug for BrokerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerHandle")
            .field("bootstrap_address", &self.inner.bootstrap_address)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Creates [`InMemoryBrokerEngine`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryBrokerEngineFactory;

impl BrokerEngineFactory for InMemoryBrokerEngineFactory {
    fn create(&self, config: BrokerConfig) -> Result<Arc<dyn Engine>, EngineError> {
        Ok(Arc::new(InMemoryBrokerEngine {
            config,
            running: Mutex::new(None),
        }))
    }
}

struct InMemoryBrokerEngine {
    config: BrokerConfig,
    running: Mutex<Option<RunningBroker>>,
}

struct RunningBroker {
    handle: BrokerHandle,
    probe: ProbeListener,
    coordination: Arc<CoordinationStore>,
    registration: String,
}

impl InMemoryBrokerEngine {
    fn write_meta_properties(&self, settings: &BrokerSettings) -> Result<(), EngineError> {
        let path = self.config.log_dir.join("meta.properties");
        let contents = format!(
            "version=0\nbroker.id={}\n{}={}\n",
            settings.broker_id,
            keys::COORDINATION_CONNECT,
            self.config.coordination_address
        );
        std::fs::write(&path, contents).map_err(|source| EngineError::Io {
            context: format!("failed to write {}", path.display()),
            source,
        })
    }

    fn responder(handle: &BrokerHandle) -> super::probe::Responder {
        let handle = handle.clone();
        Arc::new(move |command: &str| match command {
            "ruok" => "imok".to_owned(),
            "stat" => format!(
                "broker.id={}\ntopics={}\nbootstrap={}\n",
                handle.settings().broker_id,
                handle.topic_names().len(),
                handle.bootstrap_address()
            ),
            _ => String::new(),
        })
    }
}

impl Engine for InMemoryBrokerEngine {
    fn startup(&self) -> Result<(), EngineError> {
        let config = &self.config;
        let settings = BrokerSettings::from_config(config)?;
        let coordination = COORDINATORS
            .lookup(&config.coordination_address)
            .ok_or_else(|| EngineError::CoordinationUnavailable {
                address: config.coordination_address.clone(),
            })?;
        self.write_meta_properties(&settings)?;

        let registration = format!("/brokers/ids/{}", settings.broker_id);
        let bootstrap = config.bootstrap_address();
        let registration_data = format!(
            "{{\"host\":\"{}\",\"port\":{},\"endpoints\":[\"PLAINTEXT://{}\"]}}",
            config.host, config.port, bootstrap
        );
        coordination.create(&registration, Bytes::from(registration_data))?;

        let handle = BrokerHandle::new(bootstrap.clone(), settings);
        let registered = ProbeListener::bind(
            "broker",
            &config.host,
            config.port,
            Self::responder(&handle),
        )
        .and_then(|probe| {
            BROKERS
                .register(&bootstrap, config.port, handle.clone())
                .map(|()| probe)
        });
        let probe = match registered {
            Ok(probe) => probe,
            Err(error) => {
                _ = coordination.delete(&registration);
                return Err(error);
            }
        };

        tracing::info!(
            bootstrap = %bootstrap,
            broker_id = handle.settings().broker_id,
            "in-memory broker ready"
        );
        *self.running.lock() = Some(RunningBroker {
            handle,
            probe,
            coordination,
            registration,
        });
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        let Some(mut running) = self.running.lock().take() else {
            return Ok(());
        };
        BROKERS.deregister(self.config.port);
        running.probe.close();
        running.handle.close();
        _ = running.coordination.delete(&running.registration);
        tracing::info!(bootstrap = %running.handle.bootstrap_address(), "in-memory broker stopped");
        Ok(())
    }
}
