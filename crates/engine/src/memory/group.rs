// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Consumer groups: membership, partition assignment and committed offsets.
//!
//! Partitions of a topic are spread round-robin over the members subscribed to it, ordered by
//! member id. Offsets are committed as records are handed out, so each record is delivered to
//! one member of a group.

use crate::error::BrokerError;
use embedded_kafka_config::TopicName;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Where a member starts reading a partition that has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetReset {
    /// From the first record.
    Earliest,
    /// From the end of the log at the time the position is first needed.
    #[default]
    Latest,
}

impl OffsetReset {
    /// Parses the `auto.offset.reset` client property.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "earliest" => Some(Self::Earliest),
            "latest" => Some(Self::Latest),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Member {
    topics: BTreeSet<TopicName>,
    reset: OffsetReset,
}

#[derive(Debug, Default)]
pub(super) struct ConsumerGroup {
    members: BTreeMap<String, Member>,
    committed: HashMap<(TopicName, u32), u64>,
}

impl ConsumerGroup {
    pub(super) fn join(&mut self, member: &str, topics: BTreeSet<TopicName>, reset: OffsetReset) {
        _ = self
            .members
            .insert(member.to_owned(), Member { topics, reset });
    }

    pub(super) fn leave(&mut self, member: &str) -> bool {
        self.members.remove(member).is_some()
    }

    pub(super) fn reset_of(&self, group: &str, member: &str) -> Result<OffsetReset, BrokerError> {
        self.member(group, member).map(|m| m.reset)
    }

    pub(super) fn subscription(&self, group: &str, member: &str) -> Result<Vec<TopicName>, BrokerError> {
        self.member(group, member)
            .map(|m| m.topics.iter().cloned().collect())
    }

    fn member(&self, group: &str, member: &str) -> Result<&Member, BrokerError> {
        self.members
            .get(member)
            .ok_or_else(|| BrokerError::UnknownMember {
                group: group.to_owned(),
                member: member.to_owned(),
            })
    }

    /// Partitions owned by `member`, given the partition count of each existing topic.
    pub(super) fn assignment<F>(
        &self,
        group: &str,
        member: &str,
        partition_count: F,
    ) -> Result<Vec<(TopicName, u32)>, BrokerError>
    where
        F: Fn(&TopicName) -> Option<u32>,
    {
        let subscribed = self.member(group, member)?;
        let mut assigned = Vec::new();
        for topic in &subscribed.topics {
            let Some(count) = partition_count(topic) else {
                continue;
            };
            let peers: Vec<&str> = self
                .members
                .iter()
                .filter(|(_, peer)| peer.topics.contains(topic))
                .map(|(id, _)| id.as_str())
                .collect();
            let Some(index) = peers.iter().position(|id| *id == member) else {
                continue;
            };
            assigned.extend(
                (0..count)
                    .filter(|partition| *partition as usize % peers.len() == index)
                    .map(|partition| (topic.clone(), partition)),
            );
        }
        Ok(assigned)
    }

    /// Committed offset of a partition, initialised from `reset` when there is none.
    pub(super) fn position(
        &mut self,
        topic: &TopicName,
        partition: u32,
        reset: OffsetReset,
        end_offset: u64,
    ) -> u64 {
        *self
            .committed
            .entry((topic.clone(), partition))
            .or_insert(match reset {
                OffsetReset::Earliest => 0,
                OffsetReset::Latest => end_offset,
            })
    }

    pub(super) fn commit(&mut self, topic: &TopicName, partition: u32, offset: u64) {
        _ = self.committed.insert((topic.clone(), partition), offset);
    }
}
