// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle tests: setup, resolution, rollback and teardown of a full invocation.

use embedded_kafka_client::config::keys;
use embedded_kafka_client::{
    ClientError, ClientProperties, DisposableParameter, KafkaConsumer, KafkaProducer,
    ParameterType, ProducerRecord,
};
use embedded_kafka_config::{
    BrokerAnnotation, HarnessSettings, NewTopic, PropertiesProvider, ScopeChain,
    ScopeContribution, TopicsProvider,
};
use embedded_kafka_controller::{
    ArgumentResolver, ConsumerAnnotation, EXPOSED_BOOTSTRAP_SERVERS, EXPOSED_COORDINATION_CONNECT,
    HarnessError, InvocationContext, LifecycleOrchestrator, LifecyclePhase, ParameterContext,
    ProducerAnnotation, ResolverRegistry, TopicAdmin, init_test_logging,
};
use embedded_kafka_engine::memory::{
    InMemoryBrokerEngineFactory, InMemoryCoordinationEngineFactory, lookup_broker,
    lookup_coordination,
};
use embedded_kafka_engine::{
    BrokerConfig, BrokerEngineFactory, CoordinationConfig, CoordinationEngineFactory, Engine,
    EngineError, StartupError,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

type Events = Arc<Mutex<Vec<String>>>;

fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

fn recorded(events: &Events) -> Vec<String> {
    events.lock().clone()
}

/// Wraps an engine and records its startup and shutdown calls.
struct RecordingEngine {
    name: &'static str,
    inner: Arc<dyn Engine>,
    events: Events,
}

impl Engine for RecordingEngine {
    fn startup(&self) -> Result<(), EngineError> {
        self.events.lock().push(format!("{}:startup", self.name));
        self.inner.startup()
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        self.events.lock().push(format!("{}:shutdown", self.name));
        self.inner.shutdown()
    }
}

struct RecordingCoordination(Events);

impl CoordinationEngineFactory for RecordingCoordination {
    fn create(&self, config: CoordinationConfig) -> Result<Arc<dyn Engine>, EngineError> {
        Ok(Arc::new(RecordingEngine {
            name: "coordination",
            inner: InMemoryCoordinationEngineFactory.create(config)?,
            events: Arc::clone(&self.0),
        }))
    }
}

struct RecordingBroker(Events);

impl BrokerEngineFactory for RecordingBroker {
    fn create(&self, config: BrokerConfig) -> Result<Arc<dyn Engine>, EngineError> {
        Ok(Arc::new(RecordingEngine {
            name: "broker",
            inner: InMemoryBrokerEngineFactory.create(config)?,
            events: Arc::clone(&self.0),
        }))
    }
}

/// Resolves parameters named `recorded` to a unit value whose disposal unsubscribes, then
/// closes, recording both steps.
struct RecordingResolver(Events);

impl ArgumentResolver for RecordingResolver {
    fn name(&self) -> &str {
        "recording"
    }

    fn supports(&self, parameter: &ParameterContext) -> bool {
        parameter.name().starts_with("recorded")
    }

    fn resolve(
        &self,
        parameter: &ParameterContext,
        _context: &InvocationContext,
    ) -> Result<Option<DisposableParameter>, HarnessError> {
        let events = Arc::clone(&self.0);
        let name = parameter.name().to_owned();
        Ok(Some(DisposableParameter::new((), move || {
            events.lock().push(format!("{name}:unsubscribe"));
            events.lock().push(format!("{name}:close"));
            Ok(())
        })))
    }
}

struct FailingAdmin;

impl TopicAdmin for FailingAdmin {
    fn create_topics(&self, _bootstrap: &str, _topics: &[NewTopic]) -> Result<(), ClientError> {
        Err(ClientError::BrokerUnavailable {
            bootstrap: "unreachable".to_owned(),
        })
    }
}

fn settings() -> HarnessSettings {
    HarnessSettings {
        startup_timeout_ms: 5_000,
        shutdown_timeout_ms: 5_000,
        ..HarnessSettings::default()
    }
}

fn recording_orchestrator(events: &Events) -> LifecycleOrchestrator {
    LifecycleOrchestrator::new(settings())
        .with_coordination_engine(Arc::new(RecordingCoordination(Arc::clone(events))))
        .with_broker_engine(Arc::new(RecordingBroker(Arc::clone(events))))
}

fn annotated(annotation: BrokerAnnotation) -> ScopeChain {
    ScopeChain::new().with_scope(ScopeContribution::new("suite").with_annotation(annotation))
}

/// Scenario:
/// 1. Given a scope declaring `test-topic`, a producer and a consumer subscribed to it.
/// 2. When the body sends `KEY`/`VALUE` and polls the consumer.
/// 3. Then exactly that record arrives, and afterwards no broker or coordination service is
///    registered on the invocation's addresses.
#[test]
fn round_trip_through_resolved_clients() {
    init_test_logging();
    let orchestrator = LifecycleOrchestrator::new(settings());
    let scopes = annotated(BrokerAnnotation::new().create_topics(["test-topic"]));
    let parameters = [
        ParameterContext::new(
            "producer",
            ParameterType::of::<KafkaProducer<String, String>>(),
        ),
        ParameterContext::new(
            "consumer",
            ParameterType::of::<KafkaConsumer<String, String>>(),
        )
        .with_consumer(
            ConsumerAnnotation::new()
                .topics(["test-topic"])
                .properties(["group.id=round-trip", "auto.offset.reset=earliest"]),
        ),
    ];

    let (bootstrap, coordination) = orchestrator
        .run(&scopes, &parameters, |mut arguments, context| {
            let producer: KafkaProducer<String, String> = arguments.take(0).expect("producer");
            let consumer: KafkaConsumer<String, String> = arguments.take(1).expect("consumer");
            _ = producer
                .send(ProducerRecord::new(
                    "test-topic",
                    "KEY".to_owned(),
                    "VALUE".to_owned(),
                ))
                .expect("record sent");

            let records = consumer.poll(Duration::from_secs(5)).expect("polled");
            assert_eq!(records.len(), 1);
            let record = records.iter().next().expect("one record");
            assert_eq!(record.key().map(String::as_str), Some("KEY"));
            assert_eq!(record.value().map(String::as_str), Some("VALUE"));
            (
                context.bootstrap_address().to_owned(),
                context.coordination_address().to_owned(),
            )
        })
        .expect("invocation ran");

    assert!(lookup_broker(&bootstrap).is_none());
    assert!(lookup_coordination(&coordination).is_none());
}

/// Scenario:
/// 1. Given a resolved parameter whose disposal unsubscribes then closes.
/// 2. When the invocation is torn down.
/// 3. Then both steps run in that order, before the broker and then the coordination service stop.
#[test]
fn disposal_precedes_service_shutdown() {
    let events = events();
    let orchestrator = recording_orchestrator(&events).with_resolvers(
        ResolverRegistry::builtin().with_resolver(Arc::new(RecordingResolver(Arc::clone(&events)))),
    );
    let mut invocation = orchestrator
        .setup(&annotated(BrokerAnnotation::new()))
        .expect("setup");
    assert_eq!(invocation.phase(), LifecyclePhase::TopicsReady);
    _ = invocation
        .resolve(&ParameterContext::new("recorded-first", ParameterType::plain::<()>()))
        .expect("resolved");
    _ = invocation
        .resolve(&ParameterContext::new("recorded-second", ParameterType::plain::<()>()))
        .expect("resolved");
    invocation.teardown();

    assert_eq!(
        recorded(&events),
        [
            "coordination:startup",
            "broker:startup",
            "recorded-second:unsubscribe",
            "recorded-second:close",
            "recorded-first:unsubscribe",
            "recorded-first:close",
            "broker:shutdown",
            "coordination:shutdown",
        ]
    );
}

/// Scenario:
/// 1. Given a scope whose broker properties make the broker engine reject its configuration.
/// 2. When the invocation is set up.
/// 3. Then a startup error is returned after the coordination service was stopped.
#[test]
fn broker_failure_stops_coordination() {
    let events = events();
    let orchestrator = recording_orchestrator(&events);
    let scopes = annotated(BrokerAnnotation::new().broker_properties(["num.partitions=0"]));

    let error = orchestrator.setup(&scopes).expect_err("broker rejects configuration");
    assert!(matches!(
        error,
        HarnessError::Startup(StartupError::Engine { service: "broker", .. })
    ));
    let recorded = recorded(&events);
    assert_eq!(recorded.first().map(String::as_str), Some("coordination:startup"));
    assert_eq!(recorded.last().map(String::as_str), Some("coordination:shutdown"));
}

/// Scenario:
/// 1. Given a topic declared with a replication factor the single broker cannot satisfy.
/// 2. When the invocation is set up.
/// 3. Then topic creation fails, the broker stops, then the coordination service stops.
#[test]
fn topic_failure_stops_broker_then_coordination() {
    let events = events();
    let orchestrator = recording_orchestrator(&events);
    let scopes = annotated(
        BrokerAnnotation::new()
            .create_topics(["single", "replicated"])
            .topic_replication_factor(2),
    );

    let error = orchestrator.setup(&scopes).expect_err("topics rejected");
    let HarnessError::TopicCreation { topics, .. } = error else {
        panic!("expected a topic creation error, got {error:?}");
    };
    assert_eq!(topics, ["replicated", "single"]);
    assert_eq!(
        recorded(&events),
        [
            "coordination:startup",
            "broker:startup",
            "broker:shutdown",
            "coordination:shutdown",
        ]
    );
}

/// Scenario:
/// 1. Given an admin that fails every topic creation.
/// 2. When an invocation declaring a topic is set up.
/// 3. Then the failure is reported as a topic creation error and nothing stays registered.
#[test]
fn admin_failure_rolls_back() {
    let events = events();
    let orchestrator = recording_orchestrator(&events).with_topic_admin(Arc::new(FailingAdmin));
    let error = orchestrator
        .setup(&annotated(BrokerAnnotation::new().create_topics(["orders"])))
        .expect_err("admin fails");
    assert!(matches!(
        error,
        HarnessError::TopicCreation {
            source: ClientError::BrokerUnavailable { .. },
            ..
        }
    ));
    assert_eq!(
        recorded(&events).last().map(String::as_str),
        Some("coordination:shutdown")
    );
}

/// Scenario:
/// 1. Given a parameter annotated as both producer and consumer.
/// 2. When the invocation runs.
/// 3. Then a configuration error is returned and no engine was started.
#[test]
fn conflicting_intent_starts_nothing() {
    let events = events();
    let orchestrator = recording_orchestrator(&events);
    let parameters = [ParameterContext::new(
        "both",
        ParameterType::of::<ClientProperties>(),
    )
    .with_producer(ProducerAnnotation::new())
    .with_consumer(ConsumerAnnotation::new())];

    let mut body_ran = false;
    let error = orchestrator
        .run(&annotated(BrokerAnnotation::new()), &parameters, |_, _| {
            body_ran = true;
        })
        .expect_err("conflict detected");
    assert!(matches!(error, HarnessError::Configuration(_)));
    assert!(!body_ran);
    assert!(recorded(&events).is_empty());
}

/// Scenario:
/// 1. Given a topics provider returning a number.
/// 2. When the invocation is set up.
/// 3. Then a configuration error is returned and no engine was started.
#[test]
fn unsupported_topic_shape_starts_nothing() {
    let events = events();
    let orchestrator = recording_orchestrator(&events);
    let scopes = ScopeChain::new().with_scope(
        ScopeContribution::new("suite")
            .with_annotation(BrokerAnnotation::new())
            .with_topics_provider(TopicsProvider::new("topics", || json!(42))),
    );

    let error = orchestrator.setup(&scopes).expect_err("shape rejected");
    assert!(matches!(error, HarnessError::Configuration(_)));
    assert!(recorded(&events).is_empty());
}

/// Scenario:
/// 1. Given a scope that exposes addresses.
/// 2. When the body reads them and the invocation ends.
/// 3. Then both keys were published during the body and are cleared afterwards.
#[test]
fn exposed_addresses_live_for_the_invocation() {
    let orchestrator = LifecycleOrchestrator::new(settings());
    let scopes = annotated(BrokerAnnotation::new().expose_addresses(true));

    let exposed = orchestrator
        .run(&scopes, &[], |_, context| {
            assert_eq!(
                context.exposed().get(EXPOSED_BOOTSTRAP_SERVERS).as_deref(),
                Some(context.bootstrap_address())
            );
            assert_eq!(
                context.exposed().get(EXPOSED_COORDINATION_CONNECT).as_deref(),
                Some(context.coordination_address())
            );
            context.exposed().clone()
        })
        .expect("invocation ran");
    assert!(exposed.is_empty());
}

/// Scenario:
/// 1. Given an outer scope that exposes addresses and an inner annotation that does not.
/// 2. When the body reads them.
/// 3. Then the bootstrap address is published for the invocation.
#[test]
fn outer_exposure_survives_inner_annotation() {
    let orchestrator = LifecycleOrchestrator::new(settings());
    let scopes = ScopeChain::new()
        .with_scope(
            ScopeContribution::new("suite")
                .with_annotation(BrokerAnnotation::new().expose_addresses(true)),
        )
        .with_scope(ScopeContribution::new("test").with_annotation(BrokerAnnotation::new()));

    let (published, bootstrap) = orchestrator
        .run(&scopes, &[], |_, context| {
            (
                context.exposed().get(EXPOSED_BOOTSTRAP_SERVERS),
                context.bootstrap_address().to_owned(),
            )
        })
        .expect("invocation ran");
    assert_eq!(published, Some(bootstrap));
}

/// Scenario:
/// 1. Given a scope without `expose_addresses`.
/// 2. When the body runs.
/// 3. Then nothing is published.
#[test]
fn addresses_are_not_exposed_by_default() {
    let orchestrator = LifecycleOrchestrator::new(settings());
    let published = orchestrator
        .run(&annotated(BrokerAnnotation::new()), &[], |_, context| {
            context.exposed().snapshot()
        })
        .expect("invocation ran");
    assert!(published.is_empty());
}

/// Scenario:
/// 1. Given a body that panics.
/// 2. When the invocation runs.
/// 3. Then the panic propagates after the services were stopped.
#[test]
fn panicking_body_still_tears_down() {
    let events = events();
    let orchestrator = recording_orchestrator(&events);
    let scopes = annotated(BrokerAnnotation::new());

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        orchestrator.run::<_, ()>(&scopes, &[], |_, _| panic!("assertion failed in body"))
    }));
    assert!(outcome.is_err());
    assert_eq!(
        recorded(&events).last().map(String::as_str),
        Some("coordination:shutdown")
    );
}

/// Scenario:
/// 1. Given address parameters declared as `String` and `u16`.
/// 2. When they are resolved.
/// 3. Then they receive the bootstrap address and the broker port.
#[test]
fn address_parameters_receive_bootstrap_and_port() {
    let orchestrator = LifecycleOrchestrator::new(settings());
    let parameters = [
        ParameterContext::new("servers", ParameterType::plain::<String>()).as_address(),
        ParameterContext::new("port", ParameterType::plain::<u16>()).as_address(),
    ];
    orchestrator
        .run(&annotated(BrokerAnnotation::new()), &parameters, |mut arguments, context| {
            let servers: String = arguments.take(0).expect("servers");
            assert_eq!(servers, context.bootstrap_address());
            assert!(matches!(
                arguments.take::<String>(1),
                Err(HarnessError::Argument { index: 1, found: "u16", .. })
            ));
            let port: u16 = arguments.take(1).expect("port");
            assert_eq!(port, context.broker_port());
            assert!(servers.ends_with(&format!(":{port}")));
        })
        .expect("invocation ran");
}

/// Scenario:
/// 1. Given an outer scope disabling topic auto-creation and a method scope re-enabling it
///    through a properties provider.
/// 2. When a producer sends to an undeclared topic.
/// 3. Then the innermost setting applies and the send succeeds.
#[test]
fn innermost_scope_configures_the_broker() {
    let orchestrator = LifecycleOrchestrator::new(settings());
    let scopes = ScopeChain::new()
        .with_scope(
            ScopeContribution::new("suite").with_annotation(
                BrokerAnnotation::new().broker_properties(["auto.create.topics.enable=false"]),
            ),
        )
        .with_scope(ScopeContribution::new("method").with_properties_provider(
            PropertiesProvider::new("auto-create", || {
                json!({ "auto.create.topics.enable": true })
            }),
        ));
    let parameters = [ParameterContext::new(
        "producer",
        ParameterType::of::<KafkaProducer<String, i32>>(),
    )];

    orchestrator
        .run(&scopes, &parameters, |mut arguments, _| {
            let producer: KafkaProducer<String, i32> = arguments.take(0).expect("producer");
            let metadata = producer
                .send(ProducerRecord::value_only("undeclared", 7))
                .expect("topic auto-created");
            assert_eq!(metadata.offset, 0);
        })
        .expect("invocation ran");
}

/// Scenario:
/// 1. Given an annotated `ClientProperties` parameter with an explicit property.
/// 2. When it is resolved.
/// 3. Then it carries the property and the bootstrap address.
#[test]
fn annotated_client_properties_are_injected() {
    let orchestrator = LifecycleOrchestrator::new(settings());
    let parameters = [ParameterContext::new(
        "props",
        ParameterType::of::<ClientProperties>(),
    )
    .with_producer(ProducerAnnotation::new().properties(["acks=all"]))];

    orchestrator
        .run(&annotated(BrokerAnnotation::new()), &parameters, |mut arguments, context| {
            let properties: ClientProperties = arguments.take(0).expect("properties");
            assert_eq!(properties.text("acks"), Some("all"));
            assert_eq!(
                properties.text(keys::BOOTSTRAP_SERVERS),
                Some(context.bootstrap_address())
            );
        })
        .expect("invocation ran");
}
