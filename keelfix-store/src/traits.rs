/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Message store trait definition.
//!
//! A store is the durable record of one session: every sent and received
//! message, keyed by direction and sequence number, plus the two session
//! counters. The session replays stored sent messages to answer resend
//! requests and resumes its counters from the store after a restart.

use async_trait::async_trait;
use bytes::Bytes;
use keelfix_core::error::StoreError;
use keelfix_core::types::Direction;

/// Abstract interface for per-session message storage.
///
/// Implementations must make every mutating operation durable before
/// returning: a crash between accepting a message and persisting it must not
/// be observable as "received" on restart. Callers tolerate bounded blocking
/// latency on mutations.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message to the log for one direction.
    ///
    /// Enforces gapless local history: `seq` must be exactly one greater
    /// than the last stored sequence number for `direction` (or match the
    /// administratively set counter after a sequence jump).
    ///
    /// # Errors
    /// Returns `StoreError::SequenceGap` if the append would create a hole,
    /// or `StoreError::Io` if the write cannot be made durable.
    async fn append(
        &self,
        direction: Direction,
        seq: u32,
        message: &[u8],
    ) -> Result<(), StoreError>;

    /// Retrieves the ordered raw bytes stored in `begin..=end` for one
    /// direction. An `end` of 0 means "through the last stored message".
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if any sequence number in the range
    /// below the current counter was never stored.
    async fn get_range(
        &self,
        direction: Direction,
        begin: u32,
        end: u32,
    ) -> Result<Vec<Bytes>, StoreError>;

    /// Returns the next sequence number this side will assign.
    fn next_sender_seq(&self) -> u32;

    /// Returns the sequence number the peer must send next.
    fn next_target_seq(&self) -> u32;

    /// Administratively overrides the next sender sequence number.
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the counter cannot be persisted.
    fn set_next_sender_seq(&self, seq: u32) -> Result<(), StoreError>;

    /// Administratively overrides the next expected target sequence number.
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the counter cannot be persisted.
    fn set_next_target_seq(&self, seq: u32) -> Result<(), StoreError>;

    /// Clears all stored messages and resets both counters to 1.
    ///
    /// Used for session rollover (new trading day, ResetSeqNumFlag logon).
    ///
    /// # Errors
    /// Returns `StoreError` if the reset cannot be made durable.
    async fn reset(&self) -> Result<(), StoreError>;

    /// Returns the creation time of the store.
    fn creation_time(&self) -> std::time::SystemTime;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStore;

    #[async_trait]
    impl MessageStore for MockStore {
        async fn append(
            &self,
            _direction: Direction,
            _seq: u32,
            _message: &[u8],
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get_range(
            &self,
            _direction: Direction,
            _begin: u32,
            _end: u32,
        ) -> Result<Vec<Bytes>, StoreError> {
            Ok(vec![])
        }

        fn next_sender_seq(&self) -> u32 {
            1
        }

        fn next_target_seq(&self) -> u32 {
            1
        }

        fn set_next_sender_seq(&self, _seq: u32) -> Result<(), StoreError> {
            Ok(())
        }

        fn set_next_target_seq(&self, _seq: u32) -> Result<(), StoreError> {
            Ok(())
        }

        async fn reset(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn creation_time(&self) -> std::time::SystemTime {
            std::time::SystemTime::now()
        }
    }

    #[tokio::test]
    async fn test_store_is_object_safe() {
        let store: Box<dyn MessageStore> = Box::new(MockStore);
        assert_eq!(store.next_sender_seq(), 1);
        assert!(store.append(Direction::Sent, 1, b"msg").await.is_ok());
        assert!(store.reset().await.is_ok());
    }
}
