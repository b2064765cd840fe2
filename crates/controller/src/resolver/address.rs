// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Resolves address parameters to the bootstrap address or the broker port.

use super::{ArgumentResolver, ParameterContext};
use crate::context::InvocationContext;
use crate::error::HarnessError;
use embedded_kafka_client::DisposableParameter;
use embedded_kafka_config::ConfigurationError;

/// Resolves address parameters: the bootstrap address as `String`, the broker port as `u16`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddressArgumentResolver;

impl ArgumentResolver for AddressArgumentResolver {
    fn name(&self) -> &str {
        "address"
    }

    fn supports(&self, parameter: &ParameterContext) -> bool {
        parameter.is_address()
    }

    fn resolve(
        &self,
        parameter: &ParameterContext,
        context: &InvocationContext,
    ) -> Result<Option<DisposableParameter>, HarnessError> {
        let declared = parameter.declared();
        if declared.is::<String>() {
            Ok(Some(DisposableParameter::plain(
                context.bootstrap_address().to_owned(),
            )))
        } else if declared.is::<u16>() {
            Ok(Some(DisposableParameter::plain(context.broker_port())))
        } else {
            Err(ConfigurationError::UnsupportedAddressType {
                parameter: parameter.name().to_owned(),
                found: declared.declared().name().to_owned(),
            }
            .into())
        }
    }
}
