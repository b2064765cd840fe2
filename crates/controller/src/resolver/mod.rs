// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Turning test parameters into values.
//!
//! A [`ResolverRegistry`] holds an ordered list of [`ArgumentResolver`]s. The first resolver that
//! supports a parameter and produces a value wins; later resolvers that also support it are
//! reported as shadowed.

mod address;
mod client;
mod parameter;

pub use address::AddressArgumentResolver;
#[cfg(feature = "reactive")]
pub use client::ReactiveClients;
#[cfg(feature = "template")]
pub use client::TemplateClients;
pub use client::{ClientVariant, CoreClients, KafkaClientArgumentResolver};
pub use parameter::{ConsumerAnnotation, ParameterContext, ProducerAnnotation};

use crate::context::InvocationContext;
use crate::error::HarnessError;
use embedded_kafka_client::{DisposableParameter, GuesserRegistry};
use embedded_kafka_config::ConfigurationError;
use std::sync::Arc;

/// One strategy for producing parameter values.
pub trait ArgumentResolver: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Whether this resolver handles the parameter.
    fn supports(&self, parameter: &ParameterContext) -> bool;

    /// Produces the value. `Ok(None)` declines, letting the next supporting resolver try.
    fn resolve(
        &self,
        parameter: &ParameterContext,
        context: &InvocationContext,
    ) -> Result<Option<DisposableParameter>, HarnessError>;
}

/// Ordered resolvers.
#[derive(Clone)]
pub struct ResolverRegistry {
    resolvers: Vec<Arc<dyn ArgumentResolver>>,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ResolverRegistry {
    /// A registry with no resolvers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Address, core, reactive and template resolvers, guessing with the built-in guesser.
    #[must_use]
    pub fn builtin() -> Self {
        Self::with_guessers(GuesserRegistry::builtin())
    }

    /// The built-in resolvers, guessing with `guessers`.
    #[must_use]
    pub fn with_guessers(guessers: GuesserRegistry) -> Self {
        let registry = Self::empty()
            .with_resolver(Arc::new(AddressArgumentResolver))
            .with_resolver(Arc::new(KafkaClientArgumentResolver::new(
                CoreClients,
                guessers.clone(),
            )));
        #[cfg(feature = "reactive")]
        let registry = registry.with_resolver(Arc::new(KafkaClientArgumentResolver::new(
            ReactiveClients,
            guessers.clone(),
        )));
        #[cfg(feature = "template")]
        let registry = registry.with_resolver(Arc::new(KafkaClientArgumentResolver::new(
            TemplateClients,
            guessers.clone(),
        )));
        registry
    }

    /// Appends a resolver, consulted after the ones already registered.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ArgumentResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Resolver names in consultation order.
    #[must_use]
    pub fn resolver_names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|resolver| resolver.name()).collect()
    }

    /// Checks every parameter's annotations. Runs before any engine is started.
    pub fn validate(&self, parameters: &[ParameterContext]) -> Result<(), ConfigurationError> {
        parameters.iter().try_for_each(ParameterContext::validate)
    }

    /// Resolves one parameter.
    pub fn resolve(
        &self,
        parameter: &ParameterContext,
        context: &InvocationContext,
    ) -> Result<DisposableParameter, HarnessError> {
        parameter.validate()?;
        let candidates: Vec<&Arc<dyn ArgumentResolver>> = self
            .resolvers
            .iter()
            .filter(|resolver| resolver.supports(parameter))
            .collect();
        if let [winner, shadowed @ ..] = candidates.as_slice() {
            if !shadowed.is_empty() {
                let shadowed: Vec<&str> = shadowed.iter().map(|resolver| resolver.name()).collect();
                tracing::warn!(
                    parameter = parameter.name(),
                    winner = winner.name(),
                    ?shadowed,
                    "several resolvers support the parameter, the first registered is used"
                );
            }
        }
        for resolver in candidates {
            if let Some(resolved) = resolver.resolve(parameter, context)? {
                return Ok(resolved);
            }
        }
        Err(HarnessError::NoResolverAvailable {
            parameter: parameter.name().to_owned(),
            type_name: parameter.declared().declared().name(),
        })
    }
}
