// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Embedded broker test harness.
//!
//! The [`LifecycleOrchestrator`] gives each test invocation its own coordination service and
//! broker on freshly allocated ports, creates the topics declared by the invocation's
//! [`ScopeChain`](embedded_kafka_config::ScopeChain), resolves the test's parameters into
//! clients through a [`ResolverRegistry`] and tears everything down afterwards, including when
//! setup fails partway or the test panics.

pub mod admin;
pub mod context;
pub mod error;
mod logging;
pub mod orchestrator;
pub mod resolver;

pub use admin::{ClientTopicAdmin, TopicAdmin};
pub use context::{
    EXPOSED_BOOTSTRAP_SERVERS, EXPOSED_COORDINATION_CONNECT, ExposedAddresses, InvocationContext,
};
pub use error::HarnessError;
pub use logging::init_test_logging;
pub use orchestrator::{Invocation, LifecycleOrchestrator, LifecyclePhase, ResolvedArguments};
pub use resolver::{
    ArgumentResolver, ConsumerAnnotation, ParameterContext, ProducerAnnotation, ResolverRegistry,
};
