// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Engine abstraction and the lifecycle shared by the coordination and broker services.
//!
//! Engines start on a dedicated thread; the owning service waits for the readiness signal
//! up to its startup timeout. Shutdown is bounded the same way and never fails the caller.

use crate::error::{EngineError, StartupError};
use flume::RecvTimeoutError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Lifecycle of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    /// Constructed, never started.
    New,
    /// Waiting for the engine to signal readiness.
    Starting,
    /// Engine ready and serving.
    Running,
    /// Shutdown in progress.
    Stopping,
    /// Stopped. Terminal.
    Terminated,
    /// Startup failed; partially acquired resources were released. Terminal.
    Failed,
}

/// A runnable engine.
///
/// Both methods are called from threads owned by the service. `shutdown` must tolerate being
/// called after a failed or partial `startup` and being called more than once. When `startup`
/// outlives the startup timeout, `shutdown` runs on the startup thread once `startup` returns.
pub trait Engine: Send + Sync {
    /// Brings the engine up and returns once it is ready to serve.
    fn startup(&self) -> Result<(), EngineError>;

    /// Stops the engine and releases what it holds.
    fn shutdown(&self) -> Result<(), EngineError>;
}

pub(crate) struct ServiceCore {
    service: &'static str,
    state: ServiceState,
    engine: Option<Arc<dyn Engine>>,
    startup_timeout: Duration,
    shutdown_timeout: Duration,
}

impl ServiceCore {
    pub(crate) fn new(
        service: &'static str,
        startup_timeout: Duration,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            service,
            state: ServiceState::New,
            engine: None,
            startup_timeout,
            shutdown_timeout,
        }
    }

    pub(crate) fn state(&self) -> ServiceState {
        self.state
    }

    pub(crate) fn ensure_running(&self) -> Result<(), EngineError> {
        if self.state == ServiceState::Running {
            Ok(())
        } else {
            Err(EngineError::NotRunning {
                service: self.service,
                state: self.state,
            })
        }
    }

    /// Moves from `New` to `Starting`.
    pub(crate) fn begin(&mut self) -> Result<(), StartupError> {
        if self.state != ServiceState::New {
            return Err(StartupError::IllegalState {
                service: self.service,
                state: self.state,
            });
        }
        self.state = ServiceState::Starting;
        Ok(())
    }

    /// Marks a startup that failed before an engine existed.
    pub(crate) fn fail(&mut self) {
        self.state = ServiceState::Failed;
    }

    /// Starts the engine on its own thread and waits for readiness.
    ///
    /// On timeout the startup thread is left to finish; it owns the shutdown of whatever the
    /// engine built in the meantime.
    pub(crate) fn launch(&mut self, engine: Arc<dyn Engine>) -> Result<(), StartupError> {
        let service = self.service;
        let (tx, rx) = flume::bounded(1);
        let abandoned = Arc::new(Mutex::new(false));
        let startup_engine = Arc::clone(&engine);
        let startup_abandoned = Arc::clone(&abandoned);
        self.engine = Some(engine);

        let spawned = thread::Builder::new()
            .name(format!("{service}-startup"))
            .spawn(move || {
                let started = startup_engine.startup();
                let abandoned = startup_abandoned.lock();
                if *abandoned {
                    drop(abandoned);
                    release_abandoned(service, startup_engine.as_ref(), started);
                } else {
                    _ = tx.send(started);
                }
            });
        if let Err(source) = spawned {
            self.abort();
            return Err(StartupError::Engine {
                service,
                source: EngineError::Io {
                    context: "failed to spawn the startup thread".to_owned(),
                    source,
                },
            });
        }

        let started = match rx.recv_timeout(self.startup_timeout) {
            Ok(started) => started,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(self.abort_with(StartupError::Aborted { service }));
            }
            Err(RecvTimeoutError::Timeout) => {
                let mut abandoned = abandoned.lock();
                match rx.try_recv() {
                    Ok(started) => started,
                    Err(_) => {
                        *abandoned = true;
                        drop(abandoned);
                        self.engine = None;
                        self.state = ServiceState::Failed;
                        let error = StartupError::Timeout {
                            service,
                            timeout: self.startup_timeout,
                        };
                        tracing::error!(service, %error, "service failed to start");
                        return Err(error);
                    }
                }
            }
        };
        match started {
            Ok(()) => {
                self.state = ServiceState::Running;
                tracing::info!(service, "service started");
                Ok(())
            }
            Err(source) => Err(self.abort_with(StartupError::Engine { service, source })),
        }
    }

    /// Stops a running service. A no-op for services that are already stopped or failed.
    pub(crate) fn stop(&mut self) {
        match self.state {
            ServiceState::Running | ServiceState::Starting => {
                self.state = ServiceState::Stopping;
                if let Some(engine) = self.engine.take() {
                    self.shutdown_bounded(engine);
                }
                self.state = ServiceState::Terminated;
                tracing::info!(service = self.service, "service stopped");
            }
            ServiceState::New => self.state = ServiceState::Terminated,
            ServiceState::Stopping | ServiceState::Terminated | ServiceState::Failed => {}
        }
    }

    fn abort_with(&mut self, error: StartupError) -> StartupError {
        tracing::error!(service = self.service, %error, "service failed to start");
        self.abort();
        error
    }

    fn abort(&mut self) {
        self.state = ServiceState::Failed;
        if let Some(engine) = self.engine.take() {
            self.shutdown_bounded(engine);
        }
    }

    fn shutdown_bounded(&self, engine: Arc<dyn Engine>) {
        let service = self.service;
        let (tx, rx) = flume::bounded(1);
        let shutdown_engine = Arc::clone(&engine);
        let spawned = thread::Builder::new()
            .name(format!("{service}-shutdown"))
            .spawn(move || {
                _ = tx.send(shutdown_engine.shutdown());
            });
        let outcome = match spawned {
            Ok(_) => rx.recv_timeout(self.shutdown_timeout),
            Err(error) => {
                tracing::warn!(service, %error, "shutting down on the calling thread");
                Ok(engine.shutdown())
            }
        };
        match outcome {
            Ok(Ok(())) => tracing::debug!(service, "engine shut down"),
            Ok(Err(error)) => tracing::warn!(service, %error, "engine reported an error on shutdown"),
            Err(RecvTimeoutError::Timeout) => tracing::warn!(
                service,
                timeout = ?self.shutdown_timeout,
                "engine did not shut down in time"
            ),
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!(service, "engine shutdown aborted")
            }
        }
    }
}

/// Shuts down an engine whose startup finished after the service gave up on it.
fn release_abandoned(service: &'static str, engine: &dyn Engine, started: Result<(), EngineError>) {
    if let Err(error) = started {
        tracing::debug!(service, %error, "abandoned startup failed");
    }
    match engine.shutdown() {
        Ok(()) => tracing::info!(service, "abandoned engine released"),
        Err(error) => {
            tracing::warn!(service, %error, "abandoned engine reported an error on shutdown")
        }
    }
}
