// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Client tests against a running in-memory broker.

#[allow(dead_code)]
mod common;

use common::Cluster;
use embedded_kafka_client::admin::AdminClient;
use embedded_kafka_client::config::keys;
use embedded_kafka_client::reactive::{KafkaReceiver, KafkaSender, ReceiverOptions, SenderOptions};
use embedded_kafka_client::template::{ConsumerFactory, KafkaOperations, KafkaTemplate, ProducerFactory};
use embedded_kafka_client::{
    ClientError, ClientSpec, Consumer, Injectable, KafkaConsumer, KafkaProducer, ProducerRecord,
};
use embedded_kafka_config::{NewTopic, Properties, parse_properties_from_list};
use embedded_kafka_engine::BrokerError;
use futures::StreamExt;
use std::time::Duration;

const POLL: Duration = Duration::from_secs(5);

/// Scenario:
/// 1. Given a broker and a topic with one partition.
/// 2. When a string record is produced and a consumer of a group subscribes from the earliest offset.
/// 3. Then the consumer receives the key and value, and a second poll returns nothing.
#[test]
fn produce_then_consume() {
    let cluster = Cluster::start(Properties::new());
    let props = cluster.string_properties().with(keys::GROUP_ID, "round-trip");

    let admin = AdminClient::create(&props).expect("admin connects");
    admin
        .create_topics(&[NewTopic::with_defaults("test-topic").expect("valid topic")])
        .expect("topic created");

    let producer = KafkaProducer::<String, String>::new(&props).expect("producer connects");
    let metadata = producer
        .send(ProducerRecord::new("test-topic", "KEY".to_owned(), "VALUE".to_owned()))
        .expect("record sent");
    assert_eq!(metadata.partition, 0);
    assert_eq!(metadata.offset, 0);

    let consumer = KafkaConsumer::<String, String>::new(&props).expect("consumer connects");
    consumer
        .subscribe(&["test-topic".to_owned()])
        .expect("subscribed");
    let records = consumer.poll(POLL).expect("polled");
    assert_eq!(records.len(), 1);
    let (key, value) = records.into_iter().next().expect("one record").into_key_value();
    assert_eq!(key.as_deref(), Some("KEY"));
    assert_eq!(value.as_deref(), Some("VALUE"));

    assert!(consumer.poll(Duration::from_millis(50)).expect("polled").is_empty());
    consumer.close().expect("closed");
    producer.close().expect("closed");
}

/// Scenario:
/// 1. Given a broker with `auto.create.topics.enable=false`.
/// 2. When a record is sent to an undeclared topic.
/// 3. Then the send fails with an unknown topic error.
#[test]
fn sending_to_missing_topic_without_auto_create() {
    let cluster = Cluster::start(parse_properties_from_list(["auto.create.topics.enable=false"]));
    let props = cluster.string_properties();
    let producer = KafkaProducer::<String, String>::new(&props).expect("producer connects");

    let error = producer
        .send(ProducerRecord::value_only("nowhere", "lost".to_owned()))
        .expect_err("topic does not exist");
    assert_eq!(
        error,
        ClientError::Broker(BrokerError::UnknownTopic {
            topic: "nowhere".to_owned()
        })
    );
}

/// Scenario:
/// 1. Given no broker on the bootstrap address.
/// 2. When a producer is created.
/// 3. Then creation fails with `BrokerUnavailable`.
#[test]
fn producer_without_broker() {
    let cluster = Cluster::start(Properties::new());
    let props = cluster.string_properties();
    drop(cluster);

    let error = KafkaProducer::<String, String>::new(&props).err();
    assert!(matches!(error, Some(ClientError::BrokerUnavailable { .. })));
}

/// Scenario:
/// 1. Given a producer configured with a string serializer for the value.
/// 2. When it is created as a producer of `i64` values.
/// 3. Then creation fails with a codec mismatch.
#[test]
fn serializer_type_must_match() {
    let cluster = Cluster::start(Properties::new());
    let props = cluster.string_properties();

    let error = KafkaProducer::<String, i64>::new(&props).err();
    assert!(matches!(
        error,
        Some(ClientError::CodecMismatch { codec: "StringSerializer", .. })
    ));
}

/// Scenario:
/// 1. Given a consumer injected with topics.
/// 2. When its disposer runs.
/// 3. Then the consumer has left its group and is closed.
#[test]
fn injected_consumer_is_unsubscribed_and_closed() {
    let cluster = Cluster::start(Properties::new());
    let spec = ClientSpec {
        properties: cluster.string_properties().with(keys::GROUP_ID, "disposal"),
        topics: vec!["events".to_owned()],
    };

    let resolved = KafkaConsumer::<String, String>::construct(spec).expect("constructed");
    let (value, _, disposer) = resolved.into_parts();
    let consumer = value
        .downcast::<KafkaConsumer<String, String>>()
        .expect("consumer value");
    assert_eq!(consumer.subscription(), vec!["events".to_owned()]);

    disposer.expect("consumer has disposer")().expect("disposed");
    assert!(consumer.subscription().is_empty());
    assert!(consumer.is_closed());
    assert_eq!(
        Consumer::poll(&*consumer, Duration::ZERO).err(),
        Some(ClientError::Closed { client: "consumer" })
    );
}

/// Scenario:
/// 1. Given a template over a producer factory with a default topic.
/// 2. When values are sent through the template and read by a factory-made consumer.
/// 3. Then both values arrive and the template can be closed and reused.
#[test]
fn template_sends_through_lazy_producer() {
    let cluster = Cluster::start(Properties::new());
    let props = cluster.string_properties();

    let template = KafkaTemplate::<String, String>::new(ProducerFactory::new(props.clone()));
    template.set_default_topic("defaults");
    _ = template
        .send("defaults", Some("k".to_owned()), "first".to_owned())
        .expect("sent");
    _ = template.send_default("second".to_owned()).expect("sent");
    template.flush().expect("flushed");
    template.close().expect("closed");
    _ = template.send_default("third".to_owned()).expect("new producer after close");

    let consumer = ConsumerFactory::<String, String>::new(props)
        .create_consumer(Some("template-readers"))
        .expect("consumer created");
    assert_eq!(consumer.group_id(), Some("template-readers"));
    consumer.subscribe(&["defaults".to_owned()]).expect("subscribed");
    let values: Vec<String> = consumer
        .poll(POLL)
        .expect("polled")
        .into_iter()
        .filter_map(|record| record.into_key_value().1)
        .collect();
    assert_eq!(values, ["first", "second", "third"]);
}

/// Scenario:
/// 1. Given a receiver subscribed to a topic.
/// 2. When a sender emits three records after the stream has started.
/// 3. Then the stream yields them in order.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn receiver_streams_sent_records() {
    let cluster = Cluster::start(Properties::new());
    let props = cluster.string_properties().with(keys::GROUP_ID, "streaming");

    let receiver = KafkaReceiver::create(
        ReceiverOptions::<String, String>::create(props.clone()).subscription(["stream"]),
    );
    let records = receiver.receive().expect("subscribed");
    let collector = tokio::spawn(records.take(3).collect::<Vec<_>>());

    let sender = KafkaSender::create(SenderOptions::<String, String>::create(props)).expect("sender");
    let sent = sender
        .send_all(futures::stream::iter(
            ["a", "b", "c"].map(|value| ProducerRecord::value_only("stream", value.to_owned())),
        ))
        .collect::<Vec<_>>()
        .await;
    assert!(sent.iter().all(Result::is_ok));

    let received = tokio::time::timeout(POLL, collector)
        .await
        .expect("records arrive")
        .expect("collector finished");
    let values: Vec<String> = received
        .into_iter()
        .map(|record| record.expect("record").into_key_value().1.expect("value"))
        .collect();
    assert_eq!(values, ["a", "b", "c"]);

    receiver.close().expect("receiver closed");
    sender.close().expect("sender closed");
}
