// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-invocation view of the running services.

use embedded_kafka_client::ClientProperties;
use embedded_kafka_client::config::keys;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key under which the broker bootstrap address is exposed.
pub const EXPOSED_BOOTSTRAP_SERVERS: &str = "embedded.kafka.bootstrap.servers";
/// Key under which the coordination address is exposed.
pub const EXPOSED_COORDINATION_CONNECT: &str = "embedded.zookeeper.connect";

/// Addresses published for code that cannot receive them as parameters.
///
/// Populated only when a scope opts in, and emptied when the invocation is torn down. Clones
/// share the same entries.
#[derive(Debug, Clone, Default)]
pub struct ExposedAddresses {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl ExposedAddresses {
    /// Value published under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Every published entry.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }

    /// True when nothing is published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub(crate) fn publish(&self, bootstrap: &str, coordination: &str) {
        let mut entries = self.entries.write();
        _ = entries.insert(EXPOSED_BOOTSTRAP_SERVERS.to_owned(), bootstrap.to_owned());
        _ = entries.insert(EXPOSED_COORDINATION_CONNECT.to_owned(), coordination.to_owned());
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Addresses of the services started for one invocation.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    bootstrap_address: String,
    coordination_address: String,
    broker_port: u16,
    exposed: ExposedAddresses,
}

impl InvocationContext {
    pub(crate) fn new(
        bootstrap_address: String,
        coordination_address: String,
        broker_port: u16,
    ) -> Self {
        Self {
            bootstrap_address,
            coordination_address,
            broker_port,
            exposed: ExposedAddresses::default(),
        }
    }

    /// Broker `host:port`.
    #[must_use]
    pub fn bootstrap_address(&self) -> &str {
        &self.bootstrap_address
    }

    /// Coordination `host:port`.
    #[must_use]
    pub fn coordination_address(&self) -> &str {
        &self.coordination_address
    }

    /// Broker listener port.
    #[must_use]
    pub fn broker_port(&self) -> u16 {
        self.broker_port
    }

    /// Published addresses. Empty unless a scope asked for them.
    #[must_use]
    pub fn exposed(&self) -> &ExposedAddresses {
        &self.exposed
    }

    /// Connection properties every client receives.
    #[must_use]
    pub fn client_properties(&self) -> ClientProperties {
        ClientProperties::new().with(keys::BOOTSTRAP_SERVERS, self.bootstrap_address.as_str())
    }
}
