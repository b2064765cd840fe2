// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Append-only partition logs.

use bytes::Bytes;
use embedded_kafka_config::TopicName;
use parking_lot::RwLock;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A record as stored in a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Offset within the partition.
    pub offset: u64,
    /// Append time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Serialized key.
    pub key: Option<Bytes>,
    /// Serialized value.
    pub value: Option<Bytes>,
}

/// A record returned to a group member, with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRecord {
    /// Topic the record was read from.
    pub topic: TopicName,
    /// Partition the record was read from.
    pub partition: u32,
    /// The record.
    pub record: StoredRecord,
}

/// Where an appended record landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPosition {
    /// Topic.
    pub topic: TopicName,
    /// Partition.
    pub partition: u32,
    /// Offset.
    pub offset: u64,
}

#[derive(Debug, Default)]
pub(super) struct PartitionLog {
    records: RwLock<Vec<StoredRecord>>,
}

impl PartitionLog {
    pub(super) fn append(&self, key: Option<Bytes>, value: Option<Bytes>) -> u64 {
        let mut records = self.records.write();
        let offset = records.len() as u64;
        records.push(StoredRecord {
            offset,
            timestamp_ms: now_ms(),
            key,
            value,
        });
        offset
    }

    pub(super) fn end_offset(&self) -> u64 {
        self.records.read().len() as u64
    }

    pub(super) fn read(&self, from: u64, max: usize) -> Vec<StoredRecord> {
        let records = self.records.read();
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(records.len());
        records[start..].iter().take(max).cloned().collect()
    }
}

#[derive(Debug)]
pub(super) struct TopicPartitions {
    name: TopicName,
    partitions: Vec<PartitionLog>,
    replication_factor: u16,
    next_partition: AtomicU32,
}

impl TopicPartitions {
    pub(super) fn new(name: TopicName, num_partitions: u32, replication_factor: u16) -> Self {
        Self {
            name,
            partitions: (0..num_partitions).map(|_| PartitionLog::default()).collect(),
            replication_factor,
            next_partition: AtomicU32::new(0),
        }
    }

    pub(super) fn name(&self) -> &TopicName {
        &self.name
    }

    pub(super) fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    pub(super) fn replication_factor(&self) -> u16 {
        self.replication_factor
    }

    pub(super) fn partition(&self, index: u32) -> Option<&PartitionLog> {
        self.partitions.get(index as usize)
    }

    /// Keyed records always land on the same partition; unkeyed records rotate.
    pub(super) fn choose_partition(&self, key: Option<&Bytes>) -> u32 {
        let count = self.partition_count().max(1);
        match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % u64::from(count)) as u32
            }
            None => self.next_partition.fetch_add(1, Ordering::Relaxed) % count,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::{PartitionLog, TopicPartitions};
    use bytes::Bytes;
    use embedded_kafka_config::TopicName;

    #[test]
    fn offsets_are_sequential_and_reads_are_bounded() {
        let log = PartitionLog::default();
        for i in 0..5u8 {
            assert_eq!(log.append(None, Some(Bytes::from(vec![i]))), u64::from(i));
        }
        assert_eq!(log.end_offset(), 5);
        let read = log.read(3, 10);
        assert_eq!(read.iter().map(|r| r.offset).collect::<Vec<_>>(), vec![3, 4]);
        assert!(log.read(9, 10).is_empty());
        assert_eq!(log.read(0, 2).len(), 2);
    }

    #[test]
    fn keyed_records_stick_to_one_partition() {
        let topic = TopicPartitions::new(TopicName::parse("t").expect("name"), 4, 1);
        let key = Bytes::from_static(b"customer-42");
        let first = topic.choose_partition(Some(&key));
        assert!((0..10).all(|_| topic.choose_partition(Some(&key)) == first));

        let rotated: Vec<_> = (0..4).map(|_| topic.choose_partition(None)).collect();
        assert_eq!(rotated, vec![0, 1, 2, 3]);
    }
}
