// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Consumer group delivery through a running in-memory broker.

use bytes::Bytes;
use embedded_kafka_config::{HarnessSettings, NewTopic, Properties};
use embedded_kafka_engine::memory::{
    BrokerHandle, InMemoryBrokerEngineFactory, InMemoryCoordinationEngineFactory, OffsetReset,
    lookup_broker,
};
use embedded_kafka_engine::{BrokerError, BrokerService, CoordinationService, RandomPortAllocator};
use std::sync::Arc;
use std::time::Duration;

struct Cluster {
    _kafka: BrokerService,
    _zk: CoordinationService,
    handle: BrokerHandle,
}

fn cluster() -> Cluster {
    let settings = HarnessSettings::default();
    let ports = RandomPortAllocator::default();
    let mut zk = CoordinationService::new(
        Arc::new(InMemoryCoordinationEngineFactory),
        &ports,
        &settings,
    )
    .expect("port");
    zk.start().expect("coordination starts");
    let mut kafka = BrokerService::new(
        Arc::new(InMemoryBrokerEngineFactory),
        zk.address().expect("running"),
        Properties::new(),
        &ports,
        &settings,
    )
    .expect("port");
    kafka.start().expect("broker starts");
    let handle = lookup_broker(&kafka.bootstrap_address()).expect("broker");
    Cluster {
        _kafka: kafka,
        _zk: zk,
        handle,
    }
}

fn value(text: &'static str) -> Option<Bytes> {
    Some(Bytes::from_static(text.as_bytes()))
}

#[test]
fn earliest_member_sees_existing_records_once() {
    let cluster = cluster();
    let broker = &cluster.handle;
    broker
        .create_topics(&[NewTopic::with_defaults("t").expect("valid")])
        .expect("created");
    _ = broker.append("t", None, None, value("one")).expect("append");
    _ = broker.append("t", None, None, value("two")).expect("append");

    broker
        .join_group("g", "m1", &["t".to_owned()], OffsetReset::Earliest)
        .expect("joined");
    let first = broker.fetch("g", "m1", 10).expect("fetch");
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].record.value, value("one"));
    assert!(broker.fetch("g", "m1", 10).expect("fetch").is_empty());
}

#[test]
fn latest_member_sees_only_new_records() {
    let cluster = cluster();
    let broker = &cluster.handle;
    _ = broker.append("auto", None, None, value("old")).expect("auto-created");

    broker
        .join_group("g", "m1", &["auto".to_owned()], OffsetReset::Latest)
        .expect("joined");
    _ = broker.append("auto", None, None, value("new")).expect("append");

    let fetched = broker.fetch("g", "m1", 10).expect("fetch");
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].record.value, value("new"));
}

/// Scenario:
/// 1. Given two members of one group on a topic with two partitions.
/// 2. When a record is appended to each partition.
/// 3. Then each member receives exactly the record of its own partition.
#[test]
fn group_members_split_partitions() {
    let cluster = cluster();
    let broker = &cluster.handle;
    broker
        .create_topics(&[NewTopic::new("split", 2, 1).expect("valid")])
        .expect("created");
    for member in ["m1", "m2"] {
        broker
            .join_group("g", member, &["split".to_owned()], OffsetReset::Earliest)
            .expect("joined");
    }
    _ = broker.append("split", Some(0), None, value("p0")).expect("append");
    _ = broker.append("split", Some(1), None, value("p1")).expect("append");

    let m1 = broker.fetch("g", "m1", 10).expect("fetch");
    let m2 = broker.fetch("g", "m2", 10).expect("fetch");
    assert_eq!(m1.len(), 1);
    assert_eq!(m2.len(), 1);
    assert_eq!(m1[0].partition, 0);
    assert_eq!(m2[0].partition, 1);

    assert!(broker.leave_group("g", "m2"));
    assert!(matches!(
        broker.fetch("g", "m2", 10),
        Err(BrokerError::UnknownMember { .. })
    ));
}

#[test]
fn group_id_is_required_and_partitions_are_checked() {
    let cluster = cluster();
    let broker = &cluster.handle;
    assert_eq!(
        broker.join_group(" ", "m", &[], OffsetReset::Latest),
        Err(BrokerError::InvalidGroupId)
    );
    broker
        .create_topics(&[NewTopic::with_defaults("one").expect("valid")])
        .expect("created");
    assert!(matches!(
        broker.append("one", Some(5), None, None),
        Err(BrokerError::UnknownPartition { partition: 5, .. })
    ));
}

#[test]
fn waiters_wake_on_append() {
    let cluster = cluster();
    let broker = cluster.handle.clone();
    let seen = broker.append_version();
    assert!(!broker.wait_for_append(seen, Duration::from_millis(20)));

    let producer = broker.clone();
    let writer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        _ = producer.append("wake", None, None, value("x")).expect("append");
    });
    assert!(broker.wait_for_append(seen, Duration::from_secs(5)));
    writer.join().expect("writer thread");
}
