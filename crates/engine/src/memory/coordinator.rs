// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! In-memory coordination engine.

use super::endpoint::COORDINATORS;
use super::probe::{ProbeListener, Responder};
use super::store::CoordinationStore;
use crate::coordination::{CoordinationConfig, CoordinationEngineFactory};
use crate::error::EngineError;
use crate::service::Engine;
use parking_lot::Mutex;
use std::sync::Arc;

/// Creates in-memory coordination engines.
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryCoordinationEngineFactory;

impl CoordinationEngineFactory for InMemoryCoordinationEngineFactory {
    fn create(&self, config: CoordinationConfig) -> Result<Arc<dyn Engine>, EngineError> {
        Ok(Arc::new(InMemoryCoordinationEngine {
            config,
            store: Arc::new(CoordinationStore::new()),
            probe: Mutex::new(None),
        }))
    }
}

struct InMemoryCoordinationEngine {
    config: CoordinationConfig,
    store: Arc<CoordinationStore>,
    probe: Mutex<Option<ProbeListener>>,
}

impl InMemoryCoordinationEngine {
    fn responder(&self) -> Responder {
        let store = Arc::clone(&self.store);
        let address = self.config.address();
        Arc::new(move |command: &str| match command {
            "ruok" => "imok".to_owned(),
            "stat" | "srvr" => format!(
                "Zookeeper version: embedded\nClient address: {address}\nMode: standalone\nNode count: {}\n",
                store.len()
            ),
            _ => String::new(),
        })
    }
}

impl Engine for InMemoryCoordinationEngine {
    fn startup(&self) -> Result<(), EngineError> {
        let myid = self.config.data_dir.join("myid");
        std::fs::write(&myid, "1\n").map_err(|source| EngineError::Io {
            context: format!("failed to write {}", myid.display()),
            source,
        })?;

        let address = self.config.address();
        let probe = ProbeListener::bind(
            "coordination",
            &self.config.host,
            self.config.port,
            self.responder(),
        )?;
        COORDINATORS.register(&address, self.config.port, Arc::clone(&self.store))?;
        *self.probe.lock() = Some(probe);
        tracing::info!(%address, "in-memory coordination service ready");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        let Some(mut probe) = self.probe.lock().take() else {
            return Ok(());
        };
        COORDINATORS.deregister(self.config.port);
        probe.close();
        self.store.clear();
        tracing::info!(address = %self.config.address(), "in-memory coordination service stopped");
        Ok(())
    }
}
