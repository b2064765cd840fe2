// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Parsing of `key=value` property entries.

use std::collections::BTreeMap;

/// Ordered string-to-string property map.
pub type Properties = BTreeMap<String, String>;

/// Parses a list of `key=value` entries into a property map.
///
/// Blank entries are ignored. Whitespace around keys and values is trimmed. An entry without
/// `=` yields the whole trimmed entry as key with an empty value. Later duplicates win.
pub fn parse_properties_from_list<I, S>(entries: I) -> Properties
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut properties = Properties::new();
    for entry in entries {
        let entry = entry.as_ref();
        if entry.trim().is_empty() {
            continue;
        }
        let (key, value) = split_entry(entry);
        _ = properties.insert(key, value);
    }
    properties
}

fn split_entry(entry: &str) -> (String, String) {
    match entry.split_once('=') {
        Some((key, value)) => (key.trim().to_owned(), value.trim().to_owned()),
        None => (entry.trim().to_owned(), String::new()),
    }
}
