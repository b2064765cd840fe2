// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Broker service: owns a broker engine, its port and its log directory.
//!
//! The service sets a few properties itself (listener, log directory, coordination address and
//! the internal offsets topic replication factor). Those always win over user overrides.

use crate::error::{EngineError, StartupError};
use crate::service::{Engine, ServiceCore, ServiceState};
use crate::support::port::PortAllocator;
use crate::support::scratch::ScratchDirectoryPool;
use embedded_kafka_config::{HarnessSettings, Properties};
use std::path::PathBuf;
use std::sync::Arc;

const SERVICE: &str = "broker";

/// Well-known broker property keys.
pub mod keys {
    /// Coordination service connect address. Managed by the service.
    pub const COORDINATION_CONNECT: &str = "zookeeper.connect";
    /// Listener specification. Managed by the service.
    pub const LISTENERS: &str = "listeners";
    /// Log directory. Managed by the service.
    pub const LOG_DIR: &str = "log.dir";
    /// Replication factor of the internal offsets topic. Managed by the service.
    pub const OFFSETS_TOPIC_REPLICATION_FACTOR: &str = "offsets.topic.replication.factor";
    /// Broker id registered with the coordination service.
    pub const BROKER_ID: &str = "broker.id";
    /// Whether unknown topics are created on first use.
    pub const AUTO_CREATE_TOPICS_ENABLE: &str = "auto.create.topics.enable";
    /// Partition count of auto-created topics.
    pub const NUM_PARTITIONS: &str = "num.partitions";

    /// Keys set by the service that user overrides cannot change.
    pub const MANAGED: [&str; 4] = [
        COORDINATION_CONNECT,
        LISTENERS,
        LOG_DIR,
        OFFSETS_TOPIC_REPLICATION_FACTOR,
    ];
}

/// Everything a broker engine needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Interface to bind.
    pub host: String,
    /// Listener port.
    pub port: u16,
    /// Log directory.
    pub log_dir: PathBuf,
    /// Coordination service address.
    pub coordination_address: String,
    /// Effective properties: user overrides plus the managed keys.
    pub properties: Properties,
}

impl BrokerConfig {
    /// `host:port` bootstrap address.
    #[must_use]
    pub fn bootstrap_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Looks up an effective property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Builds broker engines.
pub trait BrokerEngineFactory: Send + Sync {
    /// Creates an engine for the given configuration. The engine is not started yet.
    fn create(&self, config: BrokerConfig) -> Result<Arc<dyn Engine>, EngineError>;
}

/// A broker engine bound to a local port for the duration of one invocation.
pub struct BrokerService {
    core: ServiceCore,
    factory: Arc<dyn BrokerEngineFactory>,
    host: String,
    port: u16,
    coordination_address: String,
    overrides: Properties,
    log_dirs: ScratchDirectoryPool,
}

impl BrokerService {
    /// Allocates a port and records the overrides. Nothing is started yet.
    pub fn new(
        factory: Arc<dyn BrokerEngineFactory>,
        coordination_address: impl Into<String>,
        overrides: Properties,
        ports: &dyn PortAllocator,
        settings: &HarnessSettings,
    ) -> Result<Self, StartupError> {
        let port = ports
            .allocate()
            .map_err(|source| StartupError::Port {
                service: SERVICE,
                source,
            })?;
        Ok(Self {
            core: ServiceCore::new(
                SERVICE,
                settings.startup_timeout(),
                settings.shutdown_timeout(),
            ),
            factory,
            host: settings.host.clone(),
            port,
            coordination_address: coordination_address.into(),
            overrides,
            log_dirs: ScratchDirectoryPool::new("kafka", settings.scratch_root.as_deref()),
        })
    }

    /// Starts the engine and blocks until it is ready or startup fails.
    pub fn start(&mut self) -> Result<(), StartupError> {
        self.core.begin()?;
        tracing::debug!(
            port = self.port,
            coordination = %self.coordination_address,
            "starting broker service"
        );
        let engine = match self.prepare() {
            Ok(engine) => engine,
            Err(error) => {
                self.core.fail();
                self.log_dirs.close();
                return Err(error);
            }
        };
        let started = self.core.launch(engine);
        if started.is_err() {
            self.log_dirs.close();
        }
        started
    }

    fn prepare(&self) -> Result<Arc<dyn Engine>, StartupError> {
        let log_dir = self
            .log_dirs
            .allocate()
            .map_err(|source| StartupError::Scratch {
                service: SERVICE,
                source,
            })?;
        let config = self.effective_config(log_dir);
        self.factory
            .create(config)
            .map_err(|source| StartupError::Engine {
                service: SERVICE,
                source,
            })
    }

    fn effective_config(&self, log_dir: PathBuf) -> BrokerConfig {
        let managed = [
            (keys::COORDINATION_CONNECT, self.coordination_address.clone()),
            (keys::LISTENERS, format!("PLAINTEXT://{}", self.bootstrap_address())),
            (keys::LOG_DIR, log_dir.display().to_string()),
            (keys::OFFSETS_TOPIC_REPLICATION_FACTOR, "1".to_owned()),
        ];
        let mut properties = self.overrides.clone();
        for (key, value) in managed {
            if let Some(previous) = properties.insert(key.to_owned(), value) {
                tracing::debug!(key, overridden = %previous, "ignoring override of a managed broker property");
            }
        }
        BrokerConfig {
            host: self.host.clone(),
            port: self.port,
            log_dir,
            coordination_address: self.coordination_address.clone(),
            properties,
        }
    }

    /// Stops the engine. Idempotent; never fails.
    pub fn stop(&mut self) {
        self.core.stop();
    }

    /// Stops the engine and deletes its log directory.
    pub fn close(&mut self) {
        self.stop();
        self.log_dirs.close();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.core.state()
    }

    /// Allocated listener port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` bootstrap address.
    #[must_use]
    pub fn bootstrap_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Drop for BrokerService {
    fn drop(&mut self) {
        self.close();
    }
}
