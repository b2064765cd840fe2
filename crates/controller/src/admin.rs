// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Topic creation through a transient administrative connection.

use embedded_kafka_client::admin::AdminClient;
use embedded_kafka_client::config::keys;
use embedded_kafka_client::{ClientError, ClientProperties};
use embedded_kafka_config::NewTopic;

/// Creates the declared topics once the broker is up.
pub trait TopicAdmin: Send + Sync {
    /// Creates every topic or none, blocking until the broker confirms.
    fn create_topics(&self, bootstrap: &str, topics: &[NewTopic]) -> Result<(), ClientError>;
}

/// Creates topics through a transient [`AdminClient`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientTopicAdmin;

impl TopicAdmin for ClientTopicAdmin {
    fn create_topics(&self, bootstrap: &str, topics: &[NewTopic]) -> Result<(), ClientError> {
        let admin =
            AdminClient::create(&ClientProperties::new().with(keys::BOOTSTRAP_SERVERS, bootstrap))?;
        let created = admin.create_topics(topics);
        _ = admin.close();
        created
    }
}
