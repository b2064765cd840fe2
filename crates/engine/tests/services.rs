// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle tests for the coordination and broker services backed by the in-memory engines.

use embedded_kafka_config::{HarnessSettings, NewTopic, Properties, parse_properties_from_list};
use embedded_kafka_engine::broker::keys;
use embedded_kafka_engine::memory::{
    InMemoryBrokerEngineFactory, InMemoryCoordinationEngineFactory, lookup_broker,
    lookup_coordination,
};
use embedded_kafka_engine::support::port::FixedPortAllocator;
use embedded_kafka_engine::{
    BrokerError, BrokerService, CoordinationService, EngineError, RandomPortAllocator,
    ServiceState, StartupError,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

fn settings(scratch: &tempfile::TempDir) -> HarnessSettings {
    HarnessSettings {
        scratch_root: Some(scratch.path().to_path_buf()),
        startup_timeout_ms: 5_000,
        shutdown_timeout_ms: 5_000,
        ..HarnessSettings::default()
    }
}

fn coordination(settings: &HarnessSettings) -> CoordinationService {
    CoordinationService::new(
        Arc::new(InMemoryCoordinationEngineFactory),
        &RandomPortAllocator::default(),
        settings,
    )
    .expect("port allocated")
}

fn broker(settings: &HarnessSettings, connect: &str, overrides: Properties) -> BrokerService {
    BrokerService::new(
        Arc::new(InMemoryBrokerEngineFactory),
        connect,
        overrides,
        &RandomPortAllocator::default(),
        settings,
    )
    .expect("port allocated")
}

fn probe(port: u16, command: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("listener reachable");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout set");
    stream
        .write_all(format!("{command}\n").as_bytes())
        .expect("probe sent");
    let mut reply = String::new();
    _ = stream.read_to_string(&mut reply).expect("reply read");
    reply
}

/// Scenario:
/// 1. Given a new coordination service.
/// 2. When it is started, probed and stopped twice.
/// 3. Then it answers `ruok`, exposes its address only while running and frees its port.
#[test]
fn coordination_start_probe_stop() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let settings = settings(&scratch);
    let mut service = coordination(&settings);

    assert_eq!(service.state(), ServiceState::New);
    assert!(matches!(
        service.address(),
        Err(EngineError::NotRunning { .. })
    ));

    service.start().expect("coordination starts");
    assert_eq!(service.state(), ServiceState::Running);
    let address = service.address().expect("running");
    assert_eq!(address, format!("127.0.0.1:{}", service.port()));
    assert_eq!(probe(service.port(), "ruok"), "imok");
    assert!(probe(service.port(), "stat").contains("Mode: standalone"));
    assert!(lookup_coordination(&address).is_some());

    service.stop();
    service.stop();

    assert_eq!(service.state(), ServiceState::Terminated);
    assert!(lookup_coordination(&address).is_none());
    assert!(TcpListener::bind(("127.0.0.1", service.port())).is_ok());
}

#[test]
fn stopping_a_never_started_service_is_a_no_op() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let mut service = coordination(&settings(&scratch));
    service.stop();
    service.stop();
    assert_eq!(service.state(), ServiceState::Terminated);
}

/// Scenario:
/// 1. Given a port already bound by another listener.
/// 2. When a coordination service is started on that port.
/// 3. Then startup fails and no scratch directory is left behind.
#[test]
fn coordination_start_fails_on_taken_port() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let settings = settings(&scratch);
    let taken = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let port = taken.local_addr().expect("addr").port();
    let mut service = CoordinationService::new(
        Arc::new(InMemoryCoordinationEngineFactory),
        &FixedPortAllocator(port),
        &settings,
    )
    .expect("fixed port");

    let result = service.start();

    assert!(matches!(result, Err(StartupError::Engine { .. })));
    assert_eq!(service.state(), ServiceState::Failed);
    assert_eq!(
        std::fs::read_dir(scratch.path()).expect("scratch").count(),
        0
    );
}

/// Scenario:
/// 1. Given a running coordination service.
/// 2. When a broker is started with overrides that include a managed key.
/// 3. Then the broker registers itself, writes its metadata and ignores the managed override.
#[test]
fn broker_registers_with_coordination_and_owns_managed_keys() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let settings = settings(&scratch);
    let mut zk = coordination(&settings);
    zk.start().expect("coordination starts");
    let connect = zk.address().expect("running");

    let overrides = parse_properties_from_list([
        "broker.id=3",
        "listeners=PLAINTEXT://example.invalid:1",
        "auto.create.topics.enable=false",
    ]);
    let mut kafka = broker(&settings, &connect, overrides);
    kafka.start().expect("broker starts");

    let store = lookup_coordination(&connect).expect("store");
    assert_eq!(store.children("/brokers/ids"), vec!["3"]);
    assert_eq!(probe(kafka.port(), "ruok"), "imok");

    let handle = lookup_broker(&kafka.bootstrap_address()).expect("broker registered");
    assert!(!handle.settings().auto_create_topics);
    assert_eq!(handle.settings().broker_id, 3);
    assert!(matches!(
        handle.append("undeclared", None, None, None),
        Err(BrokerError::UnknownTopic { .. })
    ));

    let meta = std::fs::read_dir(scratch.path())
        .expect("scratch")
        .filter_map(Result::ok)
        .map(|entry| entry.path().join("meta.properties"))
        .find(|path| path.exists())
        .expect("meta.properties written");
    assert!(
        std::fs::read_to_string(meta)
            .expect("readable")
            .contains("broker.id=3")
    );

    kafka.close();
    assert!(store.children("/brokers/ids").is_empty());
    assert!(handle.is_closed());
    assert!(lookup_broker(&kafka.bootstrap_address()).is_none());

    zk.close();
    assert_eq!(
        std::fs::read_dir(scratch.path()).expect("scratch").count(),
        0
    );
}

#[test]
fn managed_keys_are_listed() {
    assert!(keys::MANAGED.contains(&keys::LISTENERS));
    assert!(keys::MANAGED.contains(&keys::COORDINATION_CONNECT));
    assert!(!keys::MANAGED.contains(&keys::BROKER_ID));
}

#[test]
fn broker_without_coordination_fails_to_start() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let settings = settings(&scratch);
    let unused = RandomPortAllocator::default();
    let port = embedded_kafka_engine::PortAllocator::allocate(&unused).expect("port");
    let mut kafka = broker(&settings, &format!("127.0.0.1:{port}"), Properties::new());

    let result = kafka.start();

    assert!(matches!(
        result,
        Err(StartupError::Engine {
            source: EngineError::CoordinationUnavailable { .. },
            ..
        })
    ));
    assert_eq!(kafka.state(), ServiceState::Failed);
    kafka.stop();
    assert_eq!(kafka.state(), ServiceState::Failed);
}

/// Scenario:
/// 1. Given a running broker.
/// 2. When topics are created in one batch that contains an invalid replication factor.
/// 3. Then nothing is created; a valid batch is created in full.
#[test]
fn topic_creation_is_all_or_nothing() {
    let scratch = tempfile::tempdir().expect("scratch root");
    let settings = settings(&scratch);
    let mut zk = coordination(&settings);
    zk.start().expect("coordination starts");
    let mut kafka = broker(&settings, &zk.address().expect("running"), Properties::new());
    kafka.start().expect("broker starts");
    let handle = lookup_broker(&kafka.bootstrap_address()).expect("broker");

    let invalid = [
        NewTopic::with_defaults("ok").expect("valid"),
        NewTopic::new("replicated", 1, 2).expect("valid declaration"),
    ];
    assert!(matches!(
        handle.create_topics(&invalid),
        Err(BrokerError::InvalidReplicationFactor { requested: 2, .. })
    ));
    assert!(handle.topic_names().is_empty());

    let valid = [
        NewTopic::with_defaults("a").expect("valid"),
        NewTopic::new("b", 3, 1).expect("valid"),
    ];
    handle.create_topics(&valid).expect("created");
    assert_eq!(
        handle.describe_topic("b").map(|d| d.partitions),
        Some(3)
    );
    assert!(matches!(
        handle.create_topics(&valid[..1]),
        Err(BrokerError::TopicAlreadyExists { .. })
    ));
}
