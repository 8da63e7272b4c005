/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! In-memory message store implementation.
//!
//! Suitable for tests and sessions that do not need to survive a restart.
//! The gapless-history and range-query semantics match the durable
//! [`FileStore`](crate::file::FileStore) exactly.

use crate::traits::MessageStore;
use async_trait::async_trait;
use bytes::Bytes;
use keelfix_core::error::StoreError;
use keelfix_core::types::Direction;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;

/// In-memory message store.
///
/// Messages are kept in one `BTreeMap` per direction for efficient range
/// queries. Not persistent.
#[derive(Debug)]
pub struct MemoryStore {
    /// Messages this side sent, by sequence number.
    sent: RwLock<BTreeMap<u32, Bytes>>,
    /// Messages this side received, by sequence number.
    received: RwLock<BTreeMap<u32, Bytes>>,
    /// Next sender sequence number.
    next_sender_seq: AtomicU32,
    /// Next expected target sequence number.
    next_target_seq: AtomicU32,
    /// Store creation time.
    creation_time: SystemTime,
}

impl MemoryStore {
    /// Creates a new empty memory store with both counters at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sent: RwLock::new(BTreeMap::new()),
            received: RwLock::new(BTreeMap::new()),
            next_sender_seq: AtomicU32::new(1),
            next_target_seq: AtomicU32::new(1),
            creation_time: SystemTime::now(),
        }
    }

    /// Returns the number of stored messages for one direction.
    #[must_use]
    pub fn message_count(&self, direction: Direction) -> usize {
        self.map_for(direction).read().len()
    }

    /// Checks if a message with the given sequence number exists.
    #[must_use]
    pub fn contains(&self, direction: Direction, seq: u32) -> bool {
        self.map_for(direction).read().contains_key(&seq)
    }

    fn map_for(&self, direction: Direction) -> &RwLock<BTreeMap<u32, Bytes>> {
        match direction {
            Direction::Sent => &self.sent,
            Direction::Received => &self.received,
        }
    }

    fn counter_for(&self, direction: Direction) -> &AtomicU32 {
        match direction {
            Direction::Sent => &self.next_sender_seq,
            Direction::Received => &self.next_target_seq,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(
        &self,
        direction: Direction,
        seq: u32,
        message: &[u8],
    ) -> Result<(), StoreError> {
        let mut map = self.map_for(direction).write();
        let last = map.last_key_value().map_or(0, |(k, _)| *k);
        // Gapless unless the counter was administratively jumped forward.
        let expected = (last + 1).max(self.counter_for(direction).load(Ordering::SeqCst));
        if seq != expected {
            return Err(StoreError::SequenceGap {
                direction,
                expected,
                got: seq,
            });
        }
        map.insert(seq, Bytes::copy_from_slice(message));
        Ok(())
    }

    async fn get_range(
        &self,
        direction: Direction,
        begin: u32,
        end: u32,
    ) -> Result<Vec<Bytes>, StoreError> {
        let map = self.map_for(direction).read();
        let last = map.last_key_value().map_or(0, |(k, _)| *k);
        let end = if end == 0 { last } else { end.min(last) };
        if begin > end {
            return Ok(Vec::new());
        }

        let mut result = Vec::with_capacity((end - begin + 1) as usize);
        for seq in begin..=end {
            match map.get(&seq) {
                Some(bytes) => result.push(bytes.clone()),
                None => return Err(StoreError::NotFound { direction, seq }),
            }
        }
        Ok(result)
    }

    fn next_sender_seq(&self) -> u32 {
        self.next_sender_seq.load(Ordering::SeqCst)
    }

    fn next_target_seq(&self) -> u32 {
        self.next_target_seq.load(Ordering::SeqCst)
    }

    fn set_next_sender_seq(&self, seq: u32) -> Result<(), StoreError> {
        self.next_sender_seq.store(seq, Ordering::SeqCst);
        Ok(())
    }

    fn set_next_target_seq(&self, seq: u32) -> Result<(), StoreError> {
        self.next_target_seq.store(seq, Ordering::SeqCst);
        Ok(())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        self.sent.write().clear();
        self.received.write().clear();
        self.next_sender_seq.store(1, Ordering::SeqCst);
        self.next_target_seq.store(1, Ordering::SeqCst);
        Ok(())
    }

    fn creation_time(&self) -> SystemTime {
        self.creation_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_new() {
        let store = MemoryStore::new();
        assert_eq!(store.next_sender_seq(), 1);
        assert_eq!(store.next_target_seq(), 1);
        assert_eq!(store.message_count(Direction::Sent), 0);
    }

    #[tokio::test]
    async fn test_append_and_roundtrip() {
        let store = MemoryStore::new();

        store.append(Direction::Sent, 1, b"message1").await.unwrap();
        store.append(Direction::Sent, 2, b"message2").await.unwrap();

        let range = store.get_range(Direction::Sent, 1, 1).await.unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(&range[0][..], b"message1");
    }

    #[tokio::test]
    async fn test_append_rejects_gap() {
        let store = MemoryStore::new();

        store.append(Direction::Sent, 1, b"msg1").await.unwrap();
        let err = store.append(Direction::Sent, 3, b"msg3").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::SequenceGap {
                direction: Direction::Sent,
                expected: 2,
                got: 3,
            }
        ));
    }

    #[tokio::test]
    async fn test_append_after_counter_jump() {
        let store = MemoryStore::new();

        store.append(Direction::Received, 1, b"msg1").await.unwrap();
        // Sequence reset moved the expectation forward past a gap fill.
        store.set_next_target_seq(10).unwrap();
        store.append(Direction::Received, 10, b"msg10").await.unwrap();
        store.append(Direction::Received, 11, b"msg11").await.unwrap();
    }

    #[tokio::test]
    async fn test_directions_are_independent() {
        let store = MemoryStore::new();

        store.append(Direction::Sent, 1, b"out").await.unwrap();
        store.append(Direction::Received, 1, b"in").await.unwrap();

        assert_eq!(store.message_count(Direction::Sent), 1);
        assert_eq!(store.message_count(Direction::Received), 1);
        assert_eq!(
            &store.get_range(Direction::Sent, 1, 1).await.unwrap()[0][..],
            b"out"
        );
        assert_eq!(
            &store.get_range(Direction::Received, 1, 1).await.unwrap()[0][..],
            b"in"
        );
    }

    #[tokio::test]
    async fn test_get_range_open_ended_and_above() {
        let store = MemoryStore::new();
        store.append(Direction::Sent, 1, b"msg1").await.unwrap();
        store.append(Direction::Sent, 2, b"msg2").await.unwrap();

        // end=0 means everything stored so far.
        let all = store.get_range(Direction::Sent, 1, 0).await.unwrap();
        assert_eq!(all.len(), 2);

        // Range entirely above the last stored message is empty, not an error.
        let above = store.get_range(Direction::Sent, 5, 9).await.unwrap();
        assert!(above.is_empty());
    }

    #[tokio::test]
    async fn test_get_range_hole_is_not_found() {
        let store = MemoryStore::new();
        store.append(Direction::Sent, 1, b"msg1").await.unwrap();
        // Counter jump leaves a hole at 2..=4.
        store.set_next_sender_seq(5).unwrap();
        store.append(Direction::Sent, 5, b"msg5").await.unwrap();

        let err = store.get_range(Direction::Sent, 1, 5).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                direction: Direction::Sent,
                seq: 2,
            }
        ));
    }

    #[tokio::test]
    async fn test_reset() {
        let store = MemoryStore::new();

        store.append(Direction::Sent, 1, b"msg1").await.unwrap();
        store.set_next_sender_seq(10).unwrap();
        store.set_next_target_seq(20).unwrap();

        store.reset().await.unwrap();

        assert_eq!(store.message_count(Direction::Sent), 0);
        assert_eq!(store.next_sender_seq(), 1);
        assert_eq!(store.next_target_seq(), 1);
    }
}
