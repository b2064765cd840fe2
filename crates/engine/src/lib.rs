// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Coordination and broker services for embedded test invocations.
//!
//! The services own the lifecycle (ports, scratch directories, bounded startup and shutdown);
//! the engines behind them are pluggable through [`CoordinationEngineFactory`] and
//! [`BrokerEngineFactory`]. An in-process engine pair is provided in [`memory`].

pub mod broker;
pub mod coordination;
pub mod error;
pub mod memory;
pub mod service;
pub mod support;

pub use broker::{BrokerConfig, BrokerEngineFactory, BrokerService};
pub use coordination::{CoordinationConfig, CoordinationEngineFactory, CoordinationService};
pub use error::{BrokerError, EngineError, StartupError};
pub use service::{Engine, ServiceState};
pub use support::port::{PortAllocator, RandomPortAllocator};
pub use support::scratch::ScratchDirectoryPool;
