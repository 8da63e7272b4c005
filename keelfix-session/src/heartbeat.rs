/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Heartbeat and TestRequest management.
//!
//! This module handles FIX session heartbeat logic including:
//! - Sending heartbeats at configured intervals
//! - Sending TestRequest when no messages received
//! - Detecting liveness timeouts

use std::time::{Duration, Instant};

/// Manages heartbeat timing for a FIX session.
///
/// The interval is negotiated at logon (HeartBtInt, tag 108); call
/// [`set_interval`](Self::set_interval) once the peer's value is known.
#[derive(Debug)]
pub struct HeartbeatManager {
    /// Heartbeat interval.
    interval: Duration,
    /// Timeout multiplier: the session is dead after
    /// `interval * timeout_multiplier` without inbound traffic.
    timeout_multiplier: u32,
    /// Time of last message sent.
    last_sent: Instant,
    /// Time of last message received.
    last_received: Instant,
    /// Pending TestRequest ID, if any.
    test_request_pending: Option<String>,
}

impl HeartbeatManager {
    /// Creates a new heartbeat manager with the specified interval.
    #[must_use]
    pub fn new(interval: Duration, timeout_multiplier: u32) -> Self {
        let now = Instant::now();
        Self {
            interval,
            timeout_multiplier,
            last_sent: now,
            last_received: now,
            test_request_pending: None,
        }
    }

    /// Replaces the interval with the value negotiated at logon.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Records that a message was sent.
    #[inline]
    pub fn on_message_sent(&mut self) {
        self.last_sent = Instant::now();
    }

    /// Records that a message was received.
    ///
    /// If a TestRequest is pending and a Heartbeat with the matching TestReqID
    /// arrives, the pending request is cleared. Any other inbound traffic
    /// also proves liveness and clears the pending request.
    pub fn on_message_received(&mut self, is_heartbeat: bool, test_req_id: Option<&str>) {
        self.last_received = Instant::now();

        if self.test_request_pending.is_some() {
            let matches = is_heartbeat
                && test_req_id
                    .is_some_and(|id| self.test_request_pending.as_deref() == Some(id));
            if matches || !is_heartbeat {
                self.test_request_pending = None;
            }
        }
    }

    /// Checks if a heartbeat should be sent.
    ///
    /// A heartbeat should be sent if no message has been sent within the interval.
    #[must_use]
    pub fn should_send_heartbeat(&self) -> bool {
        self.last_sent.elapsed() >= self.interval
    }

    /// Checks if a TestRequest should be sent.
    ///
    /// A TestRequest should be sent if no message has been received within
    /// the interval plus a grace period, and no TestRequest is already pending.
    #[must_use]
    pub fn should_send_test_request(&self) -> bool {
        if self.test_request_pending.is_some() {
            return false;
        }

        // Quarter-interval grace before challenging a quiet peer.
        self.last_received.elapsed() >= self.interval + self.interval / 4
    }

    /// Checks if the session has timed out.
    ///
    /// A timeout occurs when a TestRequest is pending and no inbound traffic
    /// has arrived for `interval * timeout_multiplier`.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        self.test_request_pending.is_some()
            && self.last_received.elapsed() >= self.interval * self.timeout_multiplier
    }

    /// Records that a TestRequest was sent.
    pub fn on_test_request_sent(&mut self, test_req_id: String) {
        self.test_request_pending = Some(test_req_id);
        self.last_sent = Instant::now();
    }

    /// Returns the pending TestRequest ID, if any.
    #[must_use]
    pub fn pending_test_request(&self) -> Option<&str> {
        self.test_request_pending.as_deref()
    }

    /// Returns the time since the last message was received.
    #[must_use]
    pub fn time_since_last_received(&self) -> Duration {
        self.last_received.elapsed()
    }

    /// Returns the heartbeat interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Resets the manager state.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.last_sent = now;
        self.last_received = now;
        self.test_request_pending = None;
    }
}

/// Generates a unique TestReqID.
///
/// Uses the current timestamp in nanoseconds.
#[must_use]
pub fn generate_test_req_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    format!("TEST{}", nanos)
}
