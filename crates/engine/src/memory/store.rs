// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Path-keyed node store served by the in-memory coordination engine.

use crate::error::EngineError;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Hierarchical key/value store addressed by `/`-separated paths.
#[derive(Debug, Default)]
pub struct CoordinationStore {
    nodes: RwLock<BTreeMap<String, Bytes>>,
}

impl CoordinationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a node. Fails if it already exists.
    pub fn create(&self, path: &str, data: Bytes) -> Result<(), EngineError> {
        match self.nodes.write().entry(path.to_owned()) {
            Entry::Occupied(_) => Err(EngineError::NodeExists {
                path: path.to_owned(),
            }),
            Entry::Vacant(slot) => {
                _ = slot.insert(data);
                Ok(())
            }
        }
    }

    /// Returns a node's data.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.nodes.read().get(path).cloned()
    }

    /// Deletes a node. Returns true when it existed.
    pub fn delete(&self, path: &str) -> bool {
        self.nodes.write().remove(path).is_some()
    }

    /// Names of the direct children of `path`, sorted.
    #[must_use]
    pub fn children(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.nodes
            .read()
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let rest = &key[prefix.len()..];
                (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_owned())
            })
            .collect()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// True when the store holds no node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.nodes.write().clear();
    }
}
