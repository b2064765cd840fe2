// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Locates the broker named by `bootstrap.servers`.

use crate::config::{ClientProperties, keys};
use crate::error::ClientError;
use embedded_kafka_engine::memory::{BrokerHandle, lookup_broker};
use std::sync::atomic::{AtomicU64, Ordering};

/// Resolves `bootstrap.servers` to a running broker.
pub(crate) fn connect(properties: &ClientProperties) -> Result<BrokerHandle, ClientError> {
    let bootstrap = properties.require_text(keys::BOOTSTRAP_SERVERS)?;
    lookup_broker(bootstrap)
        .filter(|broker| !broker.is_closed())
        .ok_or_else(|| ClientError::BrokerUnavailable {
            bootstrap: bootstrap.to_owned(),
        })
}

/// `client.id` when set, otherwise `<prefix>-<n>` unique within the process.
pub(crate) fn client_id(properties: &ClientProperties, prefix: &str) -> String {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    match properties.text(keys::CLIENT_ID) {
        Some(id) => format!("{id}-{}", NEXT.fetch_add(1, Ordering::Relaxed)),
        None => format!("{prefix}-{}", NEXT.fetch_add(1, Ordering::Relaxed)),
    }
}
