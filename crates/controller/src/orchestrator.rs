// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-invocation lifecycle: start, resolve, run, tear down.
//!
//! An invocation moves through [`LifecyclePhase`]s in order. A failure while starting the broker
//! stops the coordination service; a failure while creating topics stops the broker and then
//! the coordination service. Once set up, an [`Invocation`] tears down on
//! [`teardown`](Invocation::teardown) or on drop: resolved parameters are disposed of in reverse
//! order, then the broker and the coordination service are stopped and the exposed addresses
//! are cleared. Teardown failures are logged and never returned.

use crate::admin::{ClientTopicAdmin, TopicAdmin};
use crate::context::InvocationContext;
use crate::error::HarnessError;
use crate::resolver::{ParameterContext, ResolverRegistry};
use embedded_kafka_client::inject::Disposer;
use embedded_kafka_config::{HarnessSettings, MergedConfiguration, ScopeChain};
use embedded_kafka_engine::memory::{
    InMemoryBrokerEngineFactory, InMemoryCoordinationEngineFactory,
};
use embedded_kafka_engine::{
    BrokerEngineFactory, BrokerService, CoordinationEngineFactory, CoordinationService,
    PortAllocator, RandomPortAllocator, StartupError,
};
use std::any::{Any, type_name};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::Arc;

/// Where an invocation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Nothing is running.
    Idle,
    /// The coordination service is starting.
    CoordinationStarting,
    /// The coordination service is running.
    CoordinationUp,
    /// The broker is starting.
    BrokerStarting,
    /// The broker is running.
    BrokerUp,
    /// Declared topics exist; parameters can be resolved.
    TopicsReady,
    /// Resources are being released.
    TearingDown,
}

/// Starts the services an invocation needs and resolves its parameters.
#[derive(Clone)]
pub struct LifecycleOrchestrator {
    settings: HarnessSettings,
    coordination_engine: Arc<dyn CoordinationEngineFactory>,
    broker_engine: Arc<dyn BrokerEngineFactory>,
    ports: Arc<dyn PortAllocator>,
    admin: Arc<dyn TopicAdmin>,
    resolvers: ResolverRegistry,
}

impl Default for LifecycleOrchestrator {
    fn default() -> Self {
        Self::new(HarnessSettings::default())
    }
}

impl LifecycleOrchestrator {
    /// Orchestrator backed by the in-memory engines and the built-in resolvers.
    #[must_use]
    pub fn new(settings: HarnessSettings) -> Self {
        Self {
            settings,
            coordination_engine: Arc::new(InMemoryCoordinationEngineFactory),
            broker_engine: Arc::new(InMemoryBrokerEngineFactory),
            ports: Arc::new(RandomPortAllocator::default()),
            admin: Arc::new(ClientTopicAdmin),
            resolvers: ResolverRegistry::builtin(),
        }
    }

    /// Replaces the coordination engine.
    #[must_use]
    pub fn with_coordination_engine(mut self, factory: Arc<dyn CoordinationEngineFactory>) -> Self {
        self.coordination_engine = factory;
        self
    }

    /// Replaces the broker engine.
    #[must_use]
    pub fn with_broker_engine(mut self, factory: Arc<dyn BrokerEngineFactory>) -> Self {
        self.broker_engine = factory;
        self
    }

    /// Replaces the port allocator.
    #[must_use]
    pub fn with_port_allocator(mut self, ports: Arc<dyn PortAllocator>) -> Self {
        self.ports = ports;
        self
    }

    /// Replaces the topic admin.
    #[must_use]
    pub fn with_topic_admin(mut self, admin: Arc<dyn TopicAdmin>) -> Self {
        self.admin = admin;
        self
    }

    /// Replaces the resolvers.
    #[must_use]
    pub fn with_resolvers(mut self, resolvers: ResolverRegistry) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Harness settings.
    #[must_use]
    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Merges the scopes, starts both services and creates the declared topics.
    ///
    /// Configuration errors are raised before anything starts. Any later failure rolls back what
    /// was started before it is returned.
    pub fn setup(&self, scopes: &ScopeChain) -> Result<Invocation, HarnessError> {
        self.settings.validate()?;
        let merged = MergedConfiguration::from_scopes(scopes)?;
        if !scopes.requires_broker() {
            tracing::debug!("no scope carries a broker annotation, starting with defaults");
        }

        let mut phase = LifecyclePhase::CoordinationStarting;
        tracing::debug!(?phase, "setting up invocation");
        let mut coordination = CoordinationService::new(
            Arc::clone(&self.coordination_engine),
            self.ports.as_ref(),
            &self.settings,
        )?;
        coordination.start()?;
        let coordination_address = match coordination.address() {
            Ok(address) => address,
            Err(source) => {
                coordination.stop();
                return Err(StartupError::Engine {
                    service: "coordination",
                    source,
                }
                .into());
            }
        };
        phase = LifecyclePhase::CoordinationUp;
        tracing::info!(?phase, address = %coordination_address, "coordination service up");

        phase = LifecyclePhase::BrokerStarting;
        tracing::debug!(?phase, "starting broker");
        let broker = BrokerService::new(
            Arc::clone(&self.broker_engine),
            coordination_address.as_str(),
            merged.broker_properties().clone(),
            self.ports.as_ref(),
            &self.settings,
        )
        .and_then(|mut broker| broker.start().map(|()| broker));
        let mut broker = match broker {
            Ok(broker) => broker,
            Err(error) => {
                tracing::debug!(%error, "broker failed to start, stopping coordination service");
                coordination.stop();
                return Err(error.into());
            }
        };
        let bootstrap_address = broker.bootstrap_address();
        phase = LifecyclePhase::BrokerUp;
        tracing::info!(?phase, bootstrap = %bootstrap_address, "broker up");

        let topics = merged.topics_to_create();
        if !topics.is_empty() {
            if let Err(source) = self.admin.create_topics(&bootstrap_address, &topics) {
                tracing::debug!(%source, "topic creation failed, stopping broker and coordination service");
                broker.stop();
                coordination.stop();
                return Err(HarnessError::TopicCreation {
                    topics: topics.iter().map(|topic| topic.name().to_string()).collect(),
                    source,
                });
            }
        }
        phase = LifecyclePhase::TopicsReady;
        tracing::debug!(?phase, topics = topics.len(), "invocation ready");

        let context =
            InvocationContext::new(bootstrap_address, coordination_address, broker.port());
        if merged.expose_addresses() || self.settings.expose_addresses {
            context
                .exposed()
                .publish(context.bootstrap_address(), context.coordination_address());
        }
        Ok(Invocation {
            phase,
            context,
            coordination,
            broker,
            resolvers: self.resolvers.clone(),
            disposables: Vec::new(),
        })
    }

    /// Runs `body` inside a fully set up invocation.
    ///
    /// Parameters are validated before anything starts and resolved once the topics exist.
    /// Teardown runs whether resolution fails, the body returns or the body panics; a panic is
    /// resumed after teardown.
    pub fn run<F, R>(
        &self,
        scopes: &ScopeChain,
        parameters: &[ParameterContext],
        body: F,
    ) -> Result<R, HarnessError>
    where
        F: FnOnce(ResolvedArguments, &InvocationContext) -> R,
    {
        self.resolvers.validate(parameters)?;
        let mut invocation = self.setup(scopes)?;
        let arguments = match invocation.resolve_all(parameters) {
            Ok(arguments) => arguments,
            Err(error) => {
                invocation.teardown();
                return Err(error);
            }
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| body(arguments, invocation.context())));
        invocation.teardown();
        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => resume_unwind(panic),
        }
    }
}

/// The running services of one invocation and the values resolved for it.
pub struct Invocation {
    phase: LifecyclePhase,
    context: InvocationContext,
    coordination: CoordinationService,
    broker: BrokerService,
    resolvers: ResolverRegistry,
    disposables: Vec<(String, Disposer)>,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("phase", &self.phase)
            .field("context", &self.context)
            .field("disposables", &self.disposables.len())
            .finish_non_exhaustive()
    }
}

impl Invocation {
    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Addresses of the running services.
    #[must_use]
    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    /// Resolves one parameter, registering its disposer for teardown.
    pub fn resolve(
        &mut self,
        parameter: &ParameterContext,
    ) -> Result<(Box<dyn Any + Send>, &'static str), HarnessError> {
        let resolved = self.resolvers.resolve(parameter, &self.context)?;
        let (value, type_name, disposer) = resolved.into_parts();
        if let Some(disposer) = disposer {
            self.disposables.push((parameter.name().to_owned(), disposer));
        }
        tracing::debug!(parameter = parameter.name(), type_name, "parameter resolved");
        Ok((value, type_name))
    }

    /// Resolves every parameter in order.
    pub fn resolve_all(
        &mut self,
        parameters: &[ParameterContext],
    ) -> Result<ResolvedArguments, HarnessError> {
        let values = parameters
            .iter()
            .map(|parameter| self.resolve(parameter).map(Some))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResolvedArguments { values })
    }

    /// Releases everything in reverse order of acquisition.
    pub fn teardown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.phase == LifecyclePhase::Idle {
            return;
        }
        self.phase = LifecyclePhase::TearingDown;
        tracing::debug!(phase = ?self.phase, disposables = self.disposables.len(), "tearing down invocation");
        while let Some((parameter, disposer)) = self.disposables.pop() {
            match catch_unwind(AssertUnwindSafe(disposer)) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(%parameter, %error, "failed to dispose of parameter");
                }
                Err(_) => {
                    tracing::warn!(%parameter, "disposer panicked");
                }
            }
        }
        self.broker.stop();
        self.coordination.stop();
        self.context.exposed().clear();
        self.phase = LifecyclePhase::Idle;
        tracing::info!("invocation torn down");
    }
}

impl Drop for Invocation {
    fn drop(&mut self) {
        self.release();
    }
}

/// Values resolved for a test body, taken by position.
pub struct ResolvedArguments {
    values: Vec<Option<(Box<dyn Any + Send>, &'static str)>>,
}

impl fmt::Debug for ResolvedArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.values
                    .iter()
                    .map(|value| value.as_ref().map(|(_, type_name)| *type_name)),
            )
            .finish()
    }
}

impl ResolvedArguments {
    /// Number of arguments, taken or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes argument `index` as a `T`.
    ///
    /// On a type mismatch the value stays in place and can be taken again with the right type.
    pub fn take<T: Any>(&mut self, index: usize) -> Result<T, HarnessError> {
        let missing = || HarnessError::Argument {
            index,
            expected: type_name::<T>(),
            found: "nothing",
        };
        let slot = self.values.get_mut(index).ok_or_else(missing)?;
        let (value, found) = slot.take().ok_or_else(missing)?;
        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => {
                *slot = Some((value, found));
                Err(HarnessError::Argument {
                    index,
                    expected: type_name::<T>(),
                    found,
                })
            }
        }
    }
}
