// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Coordination service: owns a coordination engine, its port and its scratch directories.

use crate::error::{EngineError, StartupError};
use crate::service::{Engine, ServiceCore, ServiceState};
use crate::support::port::PortAllocator;
use crate::support::scratch::ScratchDirectoryPool;
use embedded_kafka_config::HarnessSettings;
use std::path::PathBuf;
use std::sync::Arc;

const SERVICE: &str = "coordination";

/// Everything a coordination engine needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinationConfig {
    /// Interface to bind.
    pub host: String,
    /// Client port.
    pub port: u16,
    /// Snapshot directory.
    pub data_dir: PathBuf,
    /// Transaction log directory.
    pub data_log_dir: PathBuf,
}

impl CoordinationConfig {
    /// `host:port` address clients connect to.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builds coordination engines.
pub trait CoordinationEngineFactory: Send + Sync {
    /// Creates an engine for the given configuration. The engine is not started yet.
    fn create(&self, config: CoordinationConfig) -> Result<Arc<dyn Engine>, EngineError>;
}

/// A coordination engine bound to a local port for the duration of one invocation.
pub struct CoordinationService {
    core: ServiceCore,
    factory: Arc<dyn CoordinationEngineFactory>,
    host: String,
    port: u16,
    data_dirs: ScratchDirectoryPool,
    log_dirs: ScratchDirectoryPool,
}

impl CoordinationService {
    /// Allocates a port and prepares the scratch pools. Nothing is started yet.
    pub fn new(
        factory: Arc<dyn CoordinationEngineFactory>,
        ports: &dyn PortAllocator,
        settings: &HarnessSettings,
    ) -> Result<Self, StartupError> {
        let port = ports
            .allocate()
            .map_err(|source| StartupError::Port {
                service: SERVICE,
                source,
            })?;
        let root = settings.scratch_root.as_deref();
        Ok(Self {
            core: ServiceCore::new(
                SERVICE,
                settings.startup_timeout(),
                settings.shutdown_timeout(),
            ),
            factory,
            host: settings.host.clone(),
            port,
            data_dirs: ScratchDirectoryPool::new("zookeeper-data", root),
            log_dirs: ScratchDirectoryPool::new("zookeeper-log", root),
        })
    }

    /// Starts the engine and blocks until it is ready or startup fails.
    ///
    /// On failure every partially acquired resource is released before the error is returned.
    pub fn start(&mut self) -> Result<(), StartupError> {
        self.core.begin()?;
        tracing::debug!(port = self.port, "starting coordination service");
        let engine = match self.prepare() {
            Ok(engine) => engine,
            Err(error) => {
                self.core.fail();
                self.release_directories();
                return Err(error);
            }
        };
        let started = self.core.launch(engine);
        if started.is_err() {
            self.release_directories();
        }
        started
    }

    fn prepare(&self) -> Result<Arc<dyn Engine>, StartupError> {
        let scratch = |source| StartupError::Scratch {
            service: SERVICE,
            source,
        };
        let config = CoordinationConfig {
            host: self.host.clone(),
            port: self.port,
            data_dir: self.data_dirs.allocate().map_err(scratch)?,
            data_log_dir: self.log_dirs.allocate().map_err(scratch)?,
        };
        self.factory
            .create(config)
            .map_err(|source| StartupError::Engine {
                service: SERVICE,
                source,
            })
    }

    /// Stops the engine. Idempotent; never fails.
    pub fn stop(&mut self) {
        self.core.stop();
    }

    /// Stops the engine and deletes its scratch directories.
    pub fn close(&mut self) {
        self.stop();
        self.release_directories();
    }

    fn release_directories(&self) {
        self.data_dirs.close();
        self.log_dirs.close();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.core.state()
    }

    /// Allocated client port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` connect address. Only available while running.
    pub fn address(&self) -> Result<String, EngineError> {
        self.core.ensure_running()?;
        Ok(format!("{}:{}", self.host, self.port))
    }
}

impl Drop for CoordinationService {
    fn drop(&mut self) {
        self.close();
    }
}
