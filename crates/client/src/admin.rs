// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Admin client: topic creation and inspection.

use crate::config::ClientProperties;
use crate::connection;
use crate::error::ClientError;
use crate::inject::Closeable;
use embedded_kafka_config::{NewTopic, TopicName};
use embedded_kafka_engine::BrokerError;
use embedded_kafka_engine::memory::{BrokerHandle, TopicDescription};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Admin client bound to a running broker.
#[derive(Clone)]
pub struct AdminClient {
    broker: BrokerHandle,
    closed: Arc<AtomicBool>,
}

impl AdminClient {
    /// Connects to `bootstrap.servers`.
    pub fn create(properties: &ClientProperties) -> Result<Self, ClientError> {
        Ok(Self {
            broker: connection::connect(properties)?,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::Acquire) {
            Err(ClientError::Closed { client: "admin client" })
        } else {
            Ok(())
        }
    }

    /// Creates all topics or none of them.
    pub fn create_topics(&self, topics: &[NewTopic]) -> Result<(), ClientError> {
        self.ensure_open()?;
        self.broker.create_topics(topics)?;
        tracing::debug!(count = topics.len(), "topics created");
        Ok(())
    }

    /// Names of existing topics, sorted.
    pub fn list_topics(&self) -> Result<Vec<TopicName>, ClientError> {
        self.ensure_open()?;
        Ok(self.broker.topic_names())
    }

    /// Describes a topic.
    pub fn describe_topic(&self, topic: &str) -> Result<TopicDescription, ClientError> {
        self.ensure_open()?;
        self.broker.describe_topic(topic).ok_or_else(|| {
            ClientError::Broker(BrokerError::UnknownTopic {
                topic: topic.to_owned(),
            })
        })
    }

    /// Closes the client. Idempotent.
    pub fn close(&self) -> Result<(), ClientError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl Closeable for AdminClient {
    fn close(&self) -> Result<(), ClientError> {
        AdminClient::close(self)
    }
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("bootstrap", &self.broker.bootstrap_address())
            .finish_non_exhaustive()
    }
}
