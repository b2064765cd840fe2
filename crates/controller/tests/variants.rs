// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Resolution of the reactive and template client families.

#![cfg(all(feature = "reactive", feature = "template"))]

use embedded_kafka_client::reactive::{KafkaReceiver, KafkaSender, SenderOptions};
use embedded_kafka_client::template::{ConsumerFactory, KafkaOperations, KafkaTemplate};
use embedded_kafka_client::{ParameterType, ProducerRecord};
use embedded_kafka_config::{BrokerAnnotation, HarnessSettings, ScopeChain, ScopeContribution};
use embedded_kafka_controller::{
    ConsumerAnnotation, LifecycleOrchestrator, ParameterContext, init_test_logging,
};
use futures::StreamExt;
use std::time::Duration;

fn orchestrator() -> LifecycleOrchestrator {
    LifecycleOrchestrator::new(HarnessSettings {
        startup_timeout_ms: 5_000,
        shutdown_timeout_ms: 5_000,
        ..HarnessSettings::default()
    })
}

fn scopes(topic: &str) -> ScopeChain {
    ScopeChain::new().with_scope(
        ScopeContribution::new("suite")
            .with_annotation(BrokerAnnotation::new().create_topics([topic])),
    )
}

/// Scenario:
/// 1. Given a sender and a receiver subscribed to `reactive-topic`, both with guessed codecs.
/// 2. When the sender emits two records.
/// 3. Then the receiver's stream yields them in order.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sender_and_receiver_are_resolved() {
    init_test_logging();
    let mut invocation = orchestrator()
        .setup(&scopes("reactive-topic"))
        .expect("setup");
    let (sender, _) = invocation
        .resolve(&ParameterContext::new(
            "sender",
            ParameterType::of::<KafkaSender<String, String>>(),
        ))
        .expect("sender resolved");
    let (receiver, _) = invocation
        .resolve(
            &ParameterContext::new(
                "receiver",
                ParameterType::of::<KafkaReceiver<String, String>>(),
            )
            .with_consumer(
                ConsumerAnnotation::new()
                    .topics(["reactive-topic"])
                    .properties(["group.id=reactive", "auto.offset.reset=earliest"]),
            ),
        )
        .expect("receiver resolved");
    let sender = sender
        .downcast::<KafkaSender<String, String>>()
        .expect("sender value");
    let receiver = receiver
        .downcast::<KafkaReceiver<String, String>>()
        .expect("receiver value");

    for value in ["one", "two"] {
        _ = sender
            .send(ProducerRecord::value_only("reactive-topic", value.to_owned()))
            .await
            .expect("sent");
    }
    let received = tokio::time::timeout(
        Duration::from_secs(5),
        receiver.receive().expect("subscribed").take(2).collect::<Vec<_>>(),
    )
    .await
    .expect("records arrive");
    let values: Vec<String> = received
        .into_iter()
        .filter_map(|record| record.expect("record").into_key_value().1)
        .collect();
    assert_eq!(values, ["one", "two"]);

    invocation.teardown();
    assert!(sender.send(ProducerRecord::value_only("reactive-topic", "late".to_owned())).await.is_err());
}

/// Scenario:
/// 1. Given sender options resolved for a parameter.
/// 2. When the options are inspected.
/// 3. Then they carry guessed serializers and the bootstrap address, and need no disposal.
#[test]
fn sender_options_are_plain_values() {
    let mut invocation = orchestrator().setup(&scopes("options")).expect("setup");
    let bootstrap = invocation.context().bootstrap_address().to_owned();
    let (options, type_name) = invocation
        .resolve(&ParameterContext::new(
            "options",
            ParameterType::of::<SenderOptions<String, Vec<u8>>>(),
        ))
        .expect("options resolved");
    assert!(type_name.contains("SenderOptions"));
    let options = options
        .downcast::<SenderOptions<String, Vec<u8>>>()
        .expect("options value");
    let properties = options.producer_properties();
    assert_eq!(properties.text("bootstrap.servers"), Some(bootstrap.as_str()));
    assert!(properties.get("key.serializer").is_some());
    assert!(properties.get("value.serializer").is_some());
    invocation.teardown();
}

/// Scenario:
/// 1. Given a template and a consumer factory resolved for the same topic.
/// 2. When the template sends to its default topic and a factory consumer polls.
/// 3. Then the record arrives.
#[test]
fn template_and_consumer_factory_are_resolved() {
    let orchestrator = orchestrator();
    let parameters = [
        ParameterContext::new(
            "template",
            ParameterType::of::<KafkaTemplate<String, i64>>(),
        ),
        ParameterContext::new(
            "factory",
            ParameterType::of::<ConsumerFactory<String, i64>>(),
        )
        .with_consumer(ConsumerAnnotation::new().properties(["auto.offset.reset=earliest"])),
    ];

    orchestrator
        .run(&scopes("ledger"), &parameters, |mut arguments, _| {
            let template: KafkaTemplate<String, i64> = arguments.take(0).expect("template");
            let factory: ConsumerFactory<String, i64> = arguments.take(1).expect("factory");
            template.set_default_topic("ledger");
            _ = template.send_default(42).expect("sent");

            let consumer = factory
                .create_consumer(Some("ledger-readers"))
                .expect("consumer created");
            consumer.subscribe(&["ledger".to_owned()]).expect("subscribed");
            let records = consumer.poll(Duration::from_secs(5)).expect("polled");
            assert_eq!(
                records.iter().map(|record| record.value().copied()).collect::<Vec<_>>(),
                [Some(42)]
            );
            consumer.close().expect("closed");
        })
        .expect("invocation ran");
}
