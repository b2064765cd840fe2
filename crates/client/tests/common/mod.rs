// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! A coordination service and a broker running on the in-memory engines.

use embedded_kafka_client::ClientProperties;
use embedded_kafka_client::config::keys;
use embedded_kafka_config::{HarnessSettings, Properties};
use embedded_kafka_engine::memory::{InMemoryBrokerEngineFactory, InMemoryCoordinationEngineFactory};
use embedded_kafka_engine::{BrokerService, CoordinationService, RandomPortAllocator};
use std::sync::Arc;

pub struct Cluster {
    pub coordination: CoordinationService,
    pub broker: BrokerService,
    _scratch: tempfile::TempDir,
}

impl Cluster {
    pub fn start(overrides: Properties) -> Self {
        let scratch = tempfile::tempdir().expect("scratch root");
        let settings = HarnessSettings {
            scratch_root: Some(scratch.path().to_path_buf()),
            startup_timeout_ms: 5_000,
            shutdown_timeout_ms: 5_000,
            ..HarnessSettings::default()
        };
        let ports = RandomPortAllocator::default();
        let mut coordination = CoordinationService::new(
            Arc::new(InMemoryCoordinationEngineFactory),
            &ports,
            &settings,
        )
        .expect("coordination port");
        coordination.start().expect("coordination starts");
        let connect = coordination.address().expect("coordination running");
        let mut broker = BrokerService::new(
            Arc::new(InMemoryBrokerEngineFactory),
            &connect,
            overrides,
            &ports,
            &settings,
        )
        .expect("broker port");
        broker.start().expect("broker starts");
        Self {
            coordination,
            broker,
            _scratch: scratch,
        }
    }

    pub fn bootstrap(&self) -> String {
        self.broker.bootstrap_address()
    }

    /// Properties with `bootstrap.servers` and string codecs in both directions.
    pub fn string_properties(&self) -> ClientProperties {
        ClientProperties::new()
            .with(keys::BOOTSTRAP_SERVERS, self.bootstrap())
            .with(keys::KEY_SERIALIZER, "StringSerializer")
            .with(keys::VALUE_SERIALIZER, "StringSerializer")
            .with(keys::KEY_DESERIALIZER, "StringDeserializer")
            .with(keys::VALUE_DESERIALIZER, "StringDeserializer")
            .with(keys::AUTO_OFFSET_RESET, "earliest")
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        self.broker.stop();
        self.coordination.stop();
    }
}
