// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Process-local table of running in-memory engines, keyed by port.

use super::broker::BrokerHandle;
use super::store::CoordinationStore;
use crate::error::EngineError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, OnceLock};

pub(super) struct EndpointTable<T> {
    entries: OnceLock<RwLock<HashMap<u16, T>>>,
}

impl<T: Clone> EndpointTable<T> {
    const fn new() -> Self {
        Self {
            entries: OnceLock::new(),
        }
    }

    fn entries(&self) -> &RwLock<HashMap<u16, T>> {
        self.entries.get_or_init(|| RwLock::new(HashMap::new()))
    }

    pub(super) fn register(&self, address: &str, port: u16, value: T) -> Result<(), EngineError> {
        match self.entries().write().entry(port) {
            Entry::Occupied(_) => Err(EngineError::AddressInUse {
                address: address.to_owned(),
            }),
            Entry::Vacant(slot) => {
                _ = slot.insert(value);
                Ok(())
            }
        }
    }

    pub(super) fn deregister(&self, port: u16) {
        _ = self.entries().write().remove(&port);
    }

    pub(super) fn lookup(&self, address: &str) -> Option<T> {
        let port = port_of(address)?;
        self.entries().read().get(&port).cloned()
    }
}

pub(super) static COORDINATORS: EndpointTable<Arc<CoordinationStore>> = EndpointTable::new();
pub(super) static BROKERS: EndpointTable<BrokerHandle> = EndpointTable::new();

/// Extracts the port of `host:port`, ignoring an optional `SCHEME://` prefix.
fn port_of(address: &str) -> Option<u16> {
    let address = address.trim();
    let address = address
        .split_once("://")
        .map_or(address, |(_, rest)| rest);
    let (_, port) = address.rsplit_once(':')?;
    port.parse().ok()
}

/// Finds the running broker behind a comma-separated bootstrap address list.
#[must_use]
pub fn lookup_broker(bootstrap_servers: &str) -> Option<BrokerHandle> {
    bootstrap_servers
        .split(',')
        .find_map(|address| BROKERS.lookup(address))
}

/// Finds the running coordination store behind a connect address.
#[must_use]
pub fn lookup_coordination(connect: &str) -> Option<Arc<CoordinationStore>> {
    connect
        .split(',')
        .find_map(|address| COORDINATORS.lookup(address))
}
