// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! In-process coordination and broker engines.
//!
//! Both engines bind a real TCP listener on their allocated port (answering the `ruok` and
//! `stat` health probes) and register themselves in a process-local endpoint table so that
//! clients created from a bootstrap address reach the broker state directly.

mod broker;
mod coordinator;
mod endpoint;
mod group;
mod log;
mod probe;
mod store;

pub use broker::{BrokerHandle, BrokerSettings, InMemoryBrokerEngineFactory, TopicDescription};
pub use coordinator::InMemoryCoordinationEngineFactory;
pub use endpoint::{lookup_broker, lookup_coordination};
pub use group::OffsetReset;
pub use log::{FetchedRecord, RecordPosition, StoredRecord};
pub use store::CoordinationStore;
