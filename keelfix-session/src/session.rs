/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Per-session protocol engine.
//!
//! [`SessionCore`] is pure protocol logic: it consumes parsed inbound
//! messages and timer ticks and produces [`SessionEvent`]s. It performs no
//! I/O beyond the message store; the owning driver task writes `Transmit`
//! bytes to the wire, runs the application hooks for `Admin`/`FromAdmin`/
//! `FromApp` events, and tears down the transport on `Disconnect`.
//!
//! Processing rules per inbound message:
//! - sequence number equal to expected: persist, advance, dispatch
//! - higher than expected: buffer the message and request a resend for the
//!   missing range (at most one outstanding request per gap)
//! - lower than expected with PossDupFlag: discard silently
//! - lower than expected without PossDupFlag: unrecoverable protocol
//!   violation, the session disconnects

use crate::config::SessionConfig;
use crate::heartbeat::{HeartbeatManager, generate_test_req_id};
use crate::sequence::{SequenceManager, SequenceResult};
use crate::state::SessionStatus;
use bytes::Bytes;
use keelfix_core::error::{SessionError, StoreError};
use keelfix_core::field::tags;
use keelfix_core::message::{MsgType, OutboundMessage, OwnedMessage};
use keelfix_core::types::{Direction, SessionId, Timestamp};
use keelfix_store::MessageStore;
use keelfix_tagvalue::{Decoder, Encoder, mark_poss_dup};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Session reject reason code for a value that is out of range (tag 373).
const REJECT_VALUE_OUT_OF_RANGE: &str = "5";

/// Events produced by the session core for the driver task to act on.
#[derive(Debug)]
pub enum SessionEvent {
    /// An administrative message to run through `to_admin`, finalize, and
    /// transmit.
    Admin(OutboundMessage),
    /// Already-finalized bytes to write directly to the wire (resend replay;
    /// these carry their original sequence numbers).
    Transmit(Bytes),
    /// The logon exchange completed; fire `on_logon`.
    LoggedOn,
    /// The session left the logged-on state; fire `on_logout` (emitted
    /// exactly once per logon, from the disconnect path).
    LoggedOut,
    /// An inbound administrative message for `from_admin`.
    FromAdmin(OwnedMessage),
    /// An inbound application message for `from_app`.
    FromApp(OwnedMessage),
    /// Tear down the transport. Carries the error that forced it, if any.
    Disconnect(Option<SessionError>),
}

/// A message received ahead of the expected sequence number.
#[derive(Debug)]
struct Pending {
    msg: OwnedMessage,
    /// True if the message content was already acted on (a Logon that was
    /// negotiated despite arriving with a gap); only the sequence slot is
    /// still owed.
    consumed: bool,
}

/// The per-session protocol state machine.
pub struct SessionCore {
    config: SessionConfig,
    session_id: SessionId,
    store: Arc<dyn MessageStore>,
    sequences: SequenceManager,
    heartbeat: HeartbeatManager,
    status: SessionStatus,
    /// Out-of-order inbound messages awaiting the gap fill, by seq.
    pending: BTreeMap<u32, Pending>,
    /// The currently outstanding resend request range, if any.
    resend_range: Option<(u32, u32)>,
    logon_deadline: Option<Instant>,
    logout_deadline: Option<Instant>,
    /// Set when a logout handshake completed on this connection.
    logout_completed: bool,
}

impl SessionCore {
    /// Creates a session core, resuming sequence counters from the store.
    #[must_use]
    pub fn new(config: SessionConfig, store: Arc<dyn MessageStore>) -> Self {
        let sequences =
            SequenceManager::with_initial(store.next_sender_seq(), store.next_target_seq());
        let heartbeat =
            HeartbeatManager::new(config.heartbeat_interval, config.timeout_multiplier);
        let session_id = config.session_id();
        Self {
            config,
            session_id,
            store,
            sequences,
            heartbeat,
            status: SessionStatus::Disconnected,
            pending: BTreeMap::new(),
            resend_range: None,
            logon_deadline: None,
            logout_deadline: None,
            logout_completed: false,
        }
    }

    /// Returns the session identity.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns the current connection status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the next sequence number this side will assign.
    #[must_use]
    pub fn next_sender_seq(&self) -> u32 {
        self.sequences.next_sender_seq().value()
    }

    /// Returns the sequence number expected from the peer next.
    #[must_use]
    pub fn next_target_seq(&self) -> u32 {
        self.sequences.next_target_seq().value()
    }

    /// Moves the session to `next`. Every state change funnels through here
    /// so an illegal transition trips in debug builds.
    fn set_status(&mut self, next: SessionStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal session transition: {} -> {}",
            self.status,
            next
        );
        self.status = next;
    }

    /// Binds a freshly accepted connection to the session.
    ///
    /// The session now expects a Logon as the first inbound message, within
    /// the configured logon timeout.
    pub fn on_connected(&mut self) {
        debug!(session = %self.session_id, "connection bound, awaiting logon");
        self.set_status(SessionStatus::LogonPending);
        self.logon_deadline = Some(Instant::now() + self.config.logon_timeout);
        self.heartbeat.reset();
    }

    /// Processes one inbound message.
    ///
    /// # Errors
    /// Returns `SessionError` for unrecoverable protocol violations; the
    /// driver must disconnect the session in response.
    pub async fn on_message(
        &mut self,
        msg: OwnedMessage,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        let mut events = Vec::new();

        let is_heartbeat = *msg.msg_type() == MsgType::Heartbeat;
        let test_req_id = msg.get_field_str(tags::TEST_REQ_ID).map(str::to_owned);
        self.heartbeat
            .on_message_received(is_heartbeat, test_req_id.as_deref());

        match self.status {
            SessionStatus::Disconnected => {
                return Err(SessionError::InvalidState {
                    expected: "connected".to_string(),
                    current: self.status.to_string(),
                });
            }
            SessionStatus::LogonPending if *msg.msg_type() != MsgType::Logon => {
                return Err(SessionError::FirstMessageNotLogon {
                    msg_type: msg.msg_type().to_string(),
                });
            }
            SessionStatus::LogonPending => {
                // Negotiation runs before sequence validation so that a
                // ResetSeqNumFlag logon is judged against the reset counters.
                self.negotiate_logon(&msg, &mut events).await?;
            }
            _ => {}
        }

        let seq = msg.seq_num().ok_or(SessionError::MissingSeqNum)?.value();

        // SequenceReset in reset mode (GapFillFlag absent) is exempt from
        // ordinary sequence validation.
        if *msg.msg_type() == MsgType::SequenceReset && !is_gap_fill(&msg) {
            self.apply_sequence_reset(&msg, seq, &mut events)?;
            self.drain_pending(&mut events).await?;
            return Ok(events);
        }

        match self.sequences.validate_incoming(seq) {
            SequenceResult::Ok => {
                self.process_in_order(msg, seq, &mut events).await?;
                self.drain_pending(&mut events).await?;
            }
            SequenceResult::TooLow { expected, received } => {
                if msg.is_poss_dup() {
                    debug!(session = %self.session_id, seq = received,
                        "discarding possible duplicate");
                } else {
                    return Err(SessionError::SequenceTooLow { expected, received });
                }
            }
            SequenceResult::Gap { expected, received } => {
                warn!(session = %self.session_id, expected, received,
                    "sequence gap detected");
                let consumed = *msg.msg_type() == MsgType::Logon;
                self.pending
                    .entry(received)
                    .or_insert(Pending { msg, consumed });
                if self.resend_range.is_none() {
                    self.resend_range = Some((expected, received - 1));
                    events.push(SessionEvent::Admin(resend_request(expected, received - 1)));
                }
            }
        }

        Ok(events)
    }

    /// Advances time-based state: heartbeats, test requests, and timeouts.
    ///
    /// # Errors
    /// Currently infallible in practice; kept fallible for symmetry with the
    /// message path.
    pub async fn on_timer(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        let mut events = Vec::new();
        let now = Instant::now();

        match self.status {
            SessionStatus::Disconnected => {}
            SessionStatus::LogonPending => {
                if self.logon_deadline.is_some_and(|d| now >= d) {
                    warn!(session = %self.session_id, "no logon within timeout");
                    events.push(SessionEvent::Disconnect(None));
                }
            }
            SessionStatus::LogoutPending => {
                if self.logout_deadline.is_some_and(|d| now >= d) {
                    warn!(session = %self.session_id, "no logout confirmation within timeout");
                    events.push(SessionEvent::Disconnect(None));
                }
            }
            SessionStatus::LoggedOn => {
                if self.heartbeat.is_timed_out() {
                    let elapsed_ms = self.heartbeat.time_since_last_received().as_millis() as u64;
                    warn!(session = %self.session_id, elapsed_ms, "heartbeat timeout");
                    self.set_status(SessionStatus::LogoutPending);
                    events.push(SessionEvent::Admin(
                        OutboundMessage::new(MsgType::Logout)
                            .with_field(tags::TEXT, "heartbeat timeout"),
                    ));
                    events.push(SessionEvent::Disconnect(Some(
                        SessionError::HeartbeatTimeout { elapsed_ms },
                    )));
                } else if self.heartbeat.should_send_test_request() {
                    let id = generate_test_req_id();
                    self.heartbeat.on_test_request_sent(id.clone());
                    events.push(SessionEvent::Admin(
                        OutboundMessage::new(MsgType::TestRequest)
                            .with_field(tags::TEST_REQ_ID, id),
                    ));
                } else if self.heartbeat.should_send_heartbeat() {
                    events.push(SessionEvent::Admin(OutboundMessage::new(MsgType::Heartbeat)));
                }
            }
        }

        Ok(events)
    }

    /// Requests an orderly logout.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidState` unless the session is logged on.
    pub fn initiate_logout(&mut self, text: &str) -> Result<Vec<SessionEvent>, SessionError> {
        if self.status != SessionStatus::LoggedOn {
            return Err(SessionError::InvalidState {
                expected: SessionStatus::LoggedOn.to_string(),
                current: self.status.to_string(),
            });
        }
        self.set_status(SessionStatus::LogoutPending);
        self.logout_deadline = Some(Instant::now() + self.config.logout_timeout);

        let mut msg = OutboundMessage::new(MsgType::Logout);
        if !text.is_empty() {
            msg.set_field(tags::TEXT, text);
        }
        Ok(vec![SessionEvent::Admin(msg)])
    }

    /// Records transport loss and returns the teardown events.
    ///
    /// Emits `LoggedOut` exactly once per completed logon. Applies the
    /// configured reset-on-logout/reset-on-disconnect policy.
    pub async fn on_disconnect(&mut self) -> Vec<SessionEvent> {
        let was = self.status;
        self.set_status(SessionStatus::Disconnected);
        self.pending.clear();
        self.resend_range = None;
        self.logon_deadline = None;
        self.logout_deadline = None;
        self.heartbeat.reset();

        let mut events = Vec::new();
        if matches!(was, SessionStatus::LoggedOn | SessionStatus::LogoutPending) {
            info!(session = %self.session_id, "session disconnected");
            events.push(SessionEvent::LoggedOut);
        }

        let reset = (self.logout_completed && self.config.reset_on_logout)
            || self.config.reset_on_disconnect;
        self.logout_completed = false;
        if reset {
            match self.store.reset().await {
                Ok(()) => self.sequences.reset(),
                Err(e) => {
                    error!(session = %self.session_id, error = %e, "store reset failed")
                }
            }
        }

        events
    }

    /// Sequences, frames, persists, and returns one outbound message.
    ///
    /// Assigns the next sender sequence number, stamps the standard header,
    /// and appends the framed bytes to the store before returning them, so
    /// that a message is never on the wire without being replayable.
    ///
    /// # Errors
    /// Returns `SessionError::Store` if the append or counter persist fails;
    /// the message was not sent and no sequence number was consumed.
    pub async fn finalize_outbound(
        &mut self,
        msg: &OutboundMessage,
    ) -> Result<Bytes, SessionError> {
        let seq = self.sequences.next_sender_seq().value();

        let mut enc = Encoder::new(self.config.begin_string.clone());
        enc.put_str(tags::MSG_TYPE, msg.msg_type().as_str());
        enc.put_uint(tags::MSG_SEQ_NUM, u64::from(seq));
        enc.put_str(tags::SENDER_COMP_ID, self.config.sender_comp_id.as_str());
        enc.put_str(tags::TARGET_COMP_ID, self.config.target_comp_id.as_str());
        if let Some(sub) = &self.config.sender_sub_id {
            enc.put_str(tags::SENDER_SUB_ID, sub);
        }
        if let Some(sub) = &self.config.target_sub_id {
            enc.put_str(tags::TARGET_SUB_ID, sub);
        }
        enc.put_str(tags::SENDING_TIME, &Timestamp::now().format_fix());
        for (tag, value) in msg.fields() {
            enc.put_str(*tag, value);
        }
        let bytes = enc.finish();

        // Persist before transmit.
        self.store.append(Direction::Sent, seq, &bytes).await?;
        self.sequences.allocate_sender_seq();
        self.store
            .set_next_sender_seq(self.sequences.next_sender_seq().value())?;
        self.heartbeat.on_message_sent();

        Ok(bytes.freeze())
    }

    async fn negotiate_logon(
        &mut self,
        msg: &OwnedMessage,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), SessionError> {
        let reset_requested = msg.get_field_str(tags::RESET_SEQ_NUM_FLAG) == Some("Y");
        if reset_requested || self.config.reset_on_logon {
            self.store.reset().await?;
            self.sequences.reset();
            info!(session = %self.session_id, "sequence numbers reset at logon");
        }

        // HeartBtInt is owned by the logon initiator.
        if let Some(secs) = msg
            .get_field_str(tags::HEART_BT_INT)
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.heartbeat.set_interval(Duration::from_secs(secs));
        }

        let mut ack = OutboundMessage::new(MsgType::Logon)
            .with_field(tags::ENCRYPT_METHOD, "0")
            .with_field(
                tags::HEART_BT_INT,
                self.heartbeat.interval().as_secs().to_string(),
            );
        if reset_requested {
            ack.set_field(tags::RESET_SEQ_NUM_FLAG, "Y");
        }
        events.push(SessionEvent::Admin(ack));

        self.set_status(SessionStatus::LoggedOn);
        self.logon_deadline = None;
        events.push(SessionEvent::LoggedOn);
        info!(session = %self.session_id, "logon accepted");
        Ok(())
    }

    /// Handles a message whose sequence number matched the expectation.
    async fn process_in_order(
        &mut self,
        msg: OwnedMessage,
        seq: u32,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), SessionError> {
        self.commit_received(seq, msg.as_bytes()).await?;

        match msg.msg_type().clone() {
            MsgType::TestRequest => {
                let mut hb = OutboundMessage::new(MsgType::Heartbeat);
                if let Some(id) = msg.get_field_str(tags::TEST_REQ_ID) {
                    hb.set_field(tags::TEST_REQ_ID, id);
                }
                events.push(SessionEvent::Admin(hb));
                events.push(SessionEvent::FromAdmin(msg));
            }
            MsgType::ResendRequest => {
                let begin = msg
                    .get_field_str(tags::BEGIN_SEQ_NO)
                    .and_then(|s| s.parse::<u32>().ok());
                let end = msg
                    .get_field_str(tags::END_SEQ_NO)
                    .and_then(|s| s.parse::<u32>().ok());
                match (begin, end) {
                    (Some(begin), Some(end)) => self.replay(begin, end, events).await?,
                    _ => events.push(SessionEvent::Admin(session_reject(
                        seq,
                        "ResendRequest missing BeginSeqNo or EndSeqNo",
                    ))),
                }
                events.push(SessionEvent::FromAdmin(msg));
            }
            MsgType::SequenceReset => {
                // Gap-fill mode: NewSeqNo moves the expectation past the gap.
                self.apply_sequence_reset(&msg, seq, events)?;
                events.push(SessionEvent::FromAdmin(msg));
            }
            MsgType::Logout => {
                self.logout_completed = true;
                if self.status == SessionStatus::LogoutPending {
                    debug!(session = %self.session_id, "logout confirmed by peer");
                } else {
                    // Peer-initiated logout: confirm, then drop.
                    info!(session = %self.session_id, "logout requested by peer");
                    events.push(SessionEvent::Admin(OutboundMessage::new(MsgType::Logout)));
                }
                events.push(SessionEvent::FromAdmin(msg));
                events.push(SessionEvent::Disconnect(None));
            }
            MsgType::Heartbeat | MsgType::Reject | MsgType::Logon => {
                events.push(SessionEvent::FromAdmin(msg));
            }
            MsgType::Other(_) => {
                events.push(SessionEvent::FromApp(msg));
            }
        }
        Ok(())
    }

    /// Applies an inbound SequenceReset (either mode) to the target counter.
    fn apply_sequence_reset(
        &mut self,
        msg: &OwnedMessage,
        seq: u32,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), SessionError> {
        let Some(new_seq) = msg
            .get_field_str(tags::NEW_SEQ_NO)
            .and_then(|s| s.parse::<u32>().ok())
        else {
            events.push(SessionEvent::Admin(session_reject(
                seq,
                "SequenceReset missing NewSeqNo",
            )));
            return Ok(());
        };

        let current = self.sequences.next_target_seq().value();
        if new_seq < current {
            warn!(session = %self.session_id, new_seq, current,
                "sequence reset attempted to move backwards");
            events.push(SessionEvent::Admin(session_reject(
                seq,
                "SequenceReset may not decrease the expected sequence number",
            )));
            return Ok(());
        }

        debug!(session = %self.session_id, from = current, to = new_seq,
            "expected sequence moved forward");
        self.sequences.set_target_seq(new_seq);
        self.store.set_next_target_seq(new_seq)?;
        Ok(())
    }

    /// Drains buffered out-of-order messages that are now in sequence, and
    /// requests a resend for any further gap.
    async fn drain_pending(
        &mut self,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), SessionError> {
        loop {
            let expected = self.sequences.next_target_seq().value();
            if let Some((_, end)) = self.resend_range
                && expected > end
            {
                self.resend_range = None;
            }

            let Some((&first, _)) = self.pending.first_key_value() else {
                break;
            };
            if first < expected {
                // Superseded by a sequence jump.
                self.pending.remove(&first);
                continue;
            }
            if first > expected {
                break;
            }

            let Some(pending) = self.pending.remove(&first) else {
                break;
            };
            if pending.consumed {
                self.commit_received(first, pending.msg.as_bytes()).await?;
            } else {
                self.process_in_order(pending.msg, first, events).await?;
            }
        }

        if self.resend_range.is_none()
            && let Some((&first, _)) = self.pending.first_key_value()
        {
            let expected = self.sequences.next_target_seq().value();
            if first > expected {
                self.resend_range = Some((expected, first - 1));
                events.push(SessionEvent::Admin(resend_request(expected, first - 1)));
            }
        }
        Ok(())
    }

    /// Replays stored sent messages `begin..=end` (`end` 0 means everything).
    ///
    /// Administrative messages in the range collapse into SequenceReset
    /// gap fills; application messages are re-sent with PossDupFlag and
    /// OrigSendingTime injected.
    async fn replay(
        &mut self,
        begin: u32,
        end: u32,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), SessionError> {
        let last_sent = self.sequences.next_sender_seq().value().saturating_sub(1);
        let end = if end == 0 { last_sent } else { end.min(last_sent) };
        if begin > end {
            return Ok(());
        }

        info!(session = %self.session_id, begin, end, "replaying stored messages");
        let stored = self
            .store
            .get_range(Direction::Sent, begin, end)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => SessionError::ResendUnavailable { begin, end },
                other => SessionError::Store(other),
            })?;

        let mut gap_fill_start: Option<u32> = None;
        let mut seq = begin;
        for bytes in &stored {
            if stored_is_admin(bytes)? {
                gap_fill_start.get_or_insert(seq);
            } else {
                if let Some(start) = gap_fill_start.take() {
                    events.push(SessionEvent::Transmit(self.encode_gap_fill(start, seq)));
                }
                let marked = mark_poss_dup(bytes).map_err(|e| {
                    SessionError::Store(StoreError::Corrupted {
                        reason: e.to_string(),
                    })
                })?;
                events.push(SessionEvent::Transmit(marked.freeze()));
            }
            seq += 1;
        }
        if let Some(start) = gap_fill_start {
            events.push(SessionEvent::Transmit(self.encode_gap_fill(start, seq)));
        }
        Ok(())
    }

    /// Builds a SequenceReset-GapFill covering replayed admin seqs
    /// `start..next`.
    fn encode_gap_fill(&self, start: u32, next: u32) -> Bytes {
        let mut enc = Encoder::new(self.config.begin_string.clone());
        enc.put_str(tags::MSG_TYPE, MsgType::SequenceReset.as_str());
        enc.put_uint(tags::MSG_SEQ_NUM, u64::from(start));
        enc.put_str(tags::SENDER_COMP_ID, self.config.sender_comp_id.as_str());
        enc.put_str(tags::TARGET_COMP_ID, self.config.target_comp_id.as_str());
        enc.put_str(tags::SENDING_TIME, &Timestamp::now().format_fix());
        enc.put_bool(tags::POSS_DUP_FLAG, true);
        enc.put_bool(tags::GAP_FILL_FLAG, true);
        enc.put_uint(tags::NEW_SEQ_NO, u64::from(next));
        enc.finish().freeze()
    }

    /// Persists an in-order inbound message and advances the counter.
    async fn commit_received(&mut self, seq: u32, bytes: &[u8]) -> Result<(), SessionError> {
        self.store.append(Direction::Received, seq, bytes).await?;
        self.sequences.increment_target_seq();
        self.store
            .set_next_target_seq(self.sequences.next_target_seq().value())?;
        Ok(())
    }
}

impl std::fmt::Debug for SessionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCore")
            .field("session_id", &self.session_id)
            .field("status", &self.status)
            .field("next_sender_seq", &self.sequences.next_sender_seq())
            .field("next_target_seq", &self.sequences.next_target_seq())
            .finish_non_exhaustive()
    }
}

fn is_gap_fill(msg: &OwnedMessage) -> bool {
    msg.get_field_str(tags::GAP_FILL_FLAG) == Some("Y")
}

fn resend_request(begin: u32, end: u32) -> OutboundMessage {
    OutboundMessage::new(MsgType::ResendRequest)
        .with_field(tags::BEGIN_SEQ_NO, begin.to_string())
        .with_field(tags::END_SEQ_NO, end.to_string())
}

fn session_reject(ref_seq: u32, text: &str) -> OutboundMessage {
    OutboundMessage::new(MsgType::Reject)
        .with_field(tags::REF_SEQ_NUM, ref_seq.to_string())
        .with_field(tags::SESSION_REJECT_REASON, REJECT_VALUE_OUT_OF_RANGE)
        .with_field(tags::TEXT, text)
}

/// Classifies stored bytes as administrative or application traffic.
fn stored_is_admin(bytes: &[u8]) -> Result<bool, SessionError> {
    let mut decoder = Decoder::new(bytes).with_checksum_validation(false);
    let raw = decoder.decode().map_err(|e| {
        SessionError::Store(StoreError::Corrupted {
            reason: e.to_string(),
        })
    })?;
    Ok(raw.msg_type().is_admin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keelfix_core::types::CompId;
    use keelfix_store::MemoryStore;

    fn test_config() -> SessionConfig {
        SessionConfig::new(
            CompId::new("VENUE").unwrap(),
            CompId::new("CLIENT").unwrap(),
            "FIX.4.4",
        )
        .with_heartbeat_interval(Duration::from_secs(30))
    }

    fn session() -> SessionCore {
        SessionCore::new(test_config(), Arc::new(MemoryStore::new()))
    }

    /// Builds an inbound message as the counterparty would frame it.
    fn inbound(msg_type: &str, seq: u32, extra: &[(u32, &str)]) -> OwnedMessage {
        let mut enc = Encoder::new("FIX.4.4");
        enc.put_str(tags::MSG_TYPE, msg_type);
        enc.put_uint(tags::MSG_SEQ_NUM, u64::from(seq));
        enc.put_str(tags::SENDER_COMP_ID, "CLIENT");
        enc.put_str(tags::TARGET_COMP_ID, "VENUE");
        enc.put_str(tags::SENDING_TIME, "20260514-10:00:00.000");
        for (tag, value) in extra {
            enc.put_str(*tag, value);
        }
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        dec.decode().unwrap().to_owned()
    }

    async fn logged_on_session() -> SessionCore {
        let mut core = session();
        core.on_connected();
        let logon = inbound("A", 1, &[(tags::HEART_BT_INT, "30")]);
        core.on_message(logon).await.unwrap();
        core
    }

    fn admin_msg_types(events: &[SessionEvent]) -> Vec<&MsgType> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Admin(m) => Some(m.msg_type()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_logon_exchange() {
        let mut core = session();
        core.on_connected();
        assert_eq!(core.status(), SessionStatus::LogonPending);

        let events = core
            .on_message(inbound("A", 1, &[(tags::HEART_BT_INT, "15")]))
            .await
            .unwrap();

        assert_eq!(core.status(), SessionStatus::LoggedOn);
        assert_eq!(core.next_target_seq(), 2);
        assert!(matches!(events[0], SessionEvent::Admin(ref m) if *m.msg_type() == MsgType::Logon));
        assert!(events.iter().any(|e| matches!(e, SessionEvent::LoggedOn)));
        // HeartBtInt negotiated from the peer's logon.
        assert_eq!(core.heartbeat.interval(), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_first_message_must_be_logon() {
        let mut core = session();
        core.on_connected();

        let err = core
            .on_message(inbound("0", 1, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::FirstMessageNotLogon { .. }));
    }

    #[tokio::test]
    async fn test_logon_with_reset_flag_resets_counters() {
        let mut core = session();
        core.sequences.set_sender_seq(50);
        core.sequences.set_target_seq(50);
        core.store.set_next_sender_seq(50).unwrap();
        core.store.set_next_target_seq(50).unwrap();
        core.on_connected();

        let events = core
            .on_message(inbound(
                "A",
                1,
                &[(tags::HEART_BT_INT, "30"), (tags::RESET_SEQ_NUM_FLAG, "Y")],
            ))
            .await
            .unwrap();

        assert_eq!(core.status(), SessionStatus::LoggedOn);
        assert_eq!(core.next_target_seq(), 2);
        assert_eq!(core.next_sender_seq(), 1);
        // The ack echoes the reset flag.
        let SessionEvent::Admin(ack) = &events[0] else {
            panic!("expected logon ack first");
        };
        assert_eq!(ack.get_field(tags::RESET_SEQ_NUM_FLAG), Some("Y"));
    }

    #[tokio::test]
    async fn test_gap_triggers_single_resend_request() {
        let mut core = logged_on_session().await;
        // Expecting 2; drive the expectation to 5 with traffic 2..=4.
        for seq in 2..=4 {
            core.on_message(inbound("0", seq, &[])).await.unwrap();
        }
        assert_eq!(core.next_target_seq(), 5);

        // Receive 8: exactly one ResendRequest for [5,7].
        let events = core.on_message(inbound("D", 8, &[])).await.unwrap();
        let resends: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Admin(m) if *m.msg_type() == MsgType::ResendRequest => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(resends.len(), 1);
        assert_eq!(resends[0].get_field(tags::BEGIN_SEQ_NO), Some("5"));
        assert_eq!(resends[0].get_field(tags::END_SEQ_NO), Some("7"));
        // The expectation does not move while the gap is open.
        assert_eq!(core.next_target_seq(), 5);

        // A second out-of-order message must not trigger another request.
        let events = core.on_message(inbound("D", 9, &[])).await.unwrap();
        assert!(admin_msg_types(&events).is_empty());
    }

    #[tokio::test]
    async fn test_gap_fill_drains_buffered_messages() {
        let mut core = logged_on_session().await;
        // Buffer 4 while expecting 2.
        core.on_message(inbound("D", 4, &[])).await.unwrap();

        // Peer answers the resend request with a gap fill over 2..=3.
        let events = core
            .on_message(inbound(
                "4",
                2,
                &[(tags::GAP_FILL_FLAG, "Y"), (tags::NEW_SEQ_NO, "4")],
            ))
            .await
            .unwrap();

        // The buffered app message is dispatched and the counter advances.
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::FromApp(m) if m.seq_num() == Some(4.into()))));
        assert_eq!(core.next_target_seq(), 5);
    }

    #[tokio::test]
    async fn test_poss_dup_below_expected_is_discarded() {
        let mut core = logged_on_session().await;
        core.on_message(inbound("0", 2, &[])).await.unwrap();
        assert_eq!(core.next_target_seq(), 3);

        let events = core
            .on_message(inbound("D", 2, &[(tags::POSS_DUP_FLAG, "Y")]))
            .await
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(core.next_target_seq(), 3);
    }

    #[tokio::test]
    async fn test_too_low_without_poss_dup_is_fatal() {
        let mut core = logged_on_session().await;
        core.on_message(inbound("0", 2, &[])).await.unwrap();

        let err = core.on_message(inbound("D", 2, &[])).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::SequenceTooLow {
                expected: 3,
                received: 2,
            }
        ));
    }

    #[tokio::test]
    async fn test_test_request_answered_with_heartbeat() {
        let mut core = logged_on_session().await;

        let events = core
            .on_message(inbound("1", 2, &[(tags::TEST_REQ_ID, "PING7")]))
            .await
            .unwrap();

        let SessionEvent::Admin(hb) = &events[0] else {
            panic!("expected heartbeat reply");
        };
        assert_eq!(*hb.msg_type(), MsgType::Heartbeat);
        assert_eq!(hb.get_field(tags::TEST_REQ_ID), Some("PING7"));
    }

    #[tokio::test]
    async fn test_sequence_reset_backward_is_rejected() {
        let mut core = logged_on_session().await;
        for seq in 2..=5 {
            core.on_message(inbound("0", seq, &[])).await.unwrap();
        }
        assert_eq!(core.next_target_seq(), 6);

        let events = core
            .on_message(inbound("4", 6, &[(tags::NEW_SEQ_NO, "3")]))
            .await
            .unwrap();

        // Answered with a session-level Reject; the counter stands still.
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Admin(m) if *m.msg_type() == MsgType::Reject)));
        assert_eq!(core.next_target_seq(), 6);
    }

    #[tokio::test]
    async fn test_resend_replay_marks_app_and_collapses_admin() {
        let mut core = logged_on_session().await;
        // Send: heartbeat (1), app (2), app (3).
        core.finalize_outbound(&OutboundMessage::new(MsgType::Heartbeat))
            .await
            .unwrap();
        core.finalize_outbound(
            &OutboundMessage::new(MsgType::Other("D".to_string()))
                .with_field(11, "ORDER1"),
        )
        .await
        .unwrap();
        core.finalize_outbound(
            &OutboundMessage::new(MsgType::Other("D".to_string()))
                .with_field(11, "ORDER2"),
        )
        .await
        .unwrap();

        let events = core
            .on_message(inbound(
                "2",
                2,
                &[(tags::BEGIN_SEQ_NO, "1"), (tags::END_SEQ_NO, "0")],
            ))
            .await
            .unwrap();

        let transmits: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Transmit(b) => Some(String::from_utf8_lossy(b).into_owned()),
                _ => None,
            })
            .collect();
        assert_eq!(transmits.len(), 3);
        // Heartbeat at seq 1 collapses into a gap fill pointing at 2.
        assert!(transmits[0].contains("35=4\x01"));
        assert!(transmits[0].contains("123=Y\x01"));
        assert!(transmits[0].contains("36=2\x01"));
        // App messages replayed with the duplicate markers, original seqs.
        assert!(transmits[1].contains("43=Y\x01"));
        assert!(transmits[1].contains("34=2\x01"));
        assert!(transmits[1].contains("11=ORDER1\x01"));
        assert!(transmits[2].contains("34=3\x01"));
    }

    #[tokio::test]
    async fn test_resend_of_unavailable_range_is_fatal() {
        let mut core = logged_on_session().await;
        // Jump the sender counter so seqs 1..=4 were never persisted.
        core.sequences.set_sender_seq(5);
        core.store.set_next_sender_seq(5).unwrap();
        core.finalize_outbound(&OutboundMessage::new(MsgType::Heartbeat))
            .await
            .unwrap();

        let err = core
            .on_message(inbound(
                "2",
                2,
                &[(tags::BEGIN_SEQ_NO, "1"), (tags::END_SEQ_NO, "5")],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ResendUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_peer_initiated_logout_confirmed_then_disconnected() {
        let mut core = logged_on_session().await;

        let events = core.on_message(inbound("5", 2, &[])).await.unwrap();

        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Admin(m) if *m.msg_type() == MsgType::Logout)));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Disconnect(None))));
    }

    #[tokio::test]
    async fn test_initiated_logout_and_confirmation() {
        let mut core = logged_on_session().await;

        let events = core.initiate_logout("end of day").unwrap();
        assert_eq!(core.status(), SessionStatus::LogoutPending);
        assert!(matches!(&events[0],
            SessionEvent::Admin(m) if *m.msg_type() == MsgType::Logout));

        let events = core.on_message(inbound("5", 2, &[])).await.unwrap();
        // Confirmation does not echo another logout.
        assert!(admin_msg_types(&events).is_empty());
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Disconnect(None))));
    }

    #[tokio::test]
    async fn test_logged_out_fires_exactly_once() {
        let mut core = logged_on_session().await;

        let events = core.on_disconnect().await;
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SessionEvent::LoggedOut))
                .count(),
            1
        );

        // A second disconnect is a no-op.
        let events = core.on_disconnect().await;
        assert!(events.is_empty());
        assert_eq!(core.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_finalize_outbound_persists_before_returning() {
        let store = Arc::new(MemoryStore::new());
        let mut core =
            SessionCore::new(test_config(), Arc::clone(&store) as Arc<dyn MessageStore>);
        core.on_connected();
        core.on_message(inbound("A", 1, &[(tags::HEART_BT_INT, "30")]))
            .await
            .unwrap();

        let bytes = core
            .finalize_outbound(
                &OutboundMessage::new(MsgType::Other("D".to_string())).with_field(11, "X1"),
            )
            .await
            .unwrap();

        assert_eq!(core.next_sender_seq(), 2);
        assert_eq!(store.next_sender_seq(), 2);
        let stored = store.get_range(Direction::Sent, 1, 1).await.unwrap();
        assert_eq!(&stored[0][..], &bytes[..]);
        // Header stamped with identity and sequence.
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("49=VENUE\x01"));
        assert!(text.contains("56=CLIENT\x01"));
        assert!(text.contains("34=1\x01"));
    }

    #[tokio::test]
    async fn test_heartbeat_ladder_forces_logout() {
        let config = test_config().with_heartbeat_interval(Duration::from_millis(10));
        let mut core = SessionCore::new(config, Arc::new(MemoryStore::new()));
        core.on_connected();
        core.on_message(inbound("A", 1, &[])).await.unwrap();
        // The peer's logon carried no HeartBtInt; local interval stands.

        tokio::time::sleep(Duration::from_millis(15)).await;
        let events = core.on_timer().await.unwrap();
        assert!(matches!(&events[0],
            SessionEvent::Admin(m) if *m.msg_type() == MsgType::TestRequest));

        tokio::time::sleep(Duration::from_millis(25)).await;
        let events = core.on_timer().await.unwrap();
        assert!(matches!(&events[0],
            SessionEvent::Admin(m) if *m.msg_type() == MsgType::Logout));
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::Disconnect(Some(SessionError::HeartbeatTimeout { .. }))
        )));
        // The ladder passes through LogoutPending on its way down.
        assert_eq!(core.status(), SessionStatus::LogoutPending);

        let events = core.on_disconnect().await;
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SessionEvent::LoggedOut))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_status_walks_the_handshake_states() {
        let mut core = SessionCore::new(test_config(), Arc::new(MemoryStore::new()));
        assert_eq!(core.status(), SessionStatus::Disconnected);

        core.on_connected();
        assert_eq!(core.status(), SessionStatus::LogonPending);

        core.on_message(inbound("A", 1, &[])).await.unwrap();
        assert_eq!(core.status(), SessionStatus::LoggedOn);

        core.initiate_logout("done").unwrap();
        assert_eq!(core.status(), SessionStatus::LogoutPending);

        core.on_disconnect().await;
        assert_eq!(core.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_counters_resume_from_store() {
        let store = Arc::new(MemoryStore::new());
        store.set_next_sender_seq(17).unwrap();
        store.set_next_target_seq(9).unwrap();

        let core = SessionCore::new(test_config(), store);
        assert_eq!(core.next_sender_seq(), 17);
        assert_eq!(core.next_target_seq(), 9);
    }
}
