/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Per-connection driver task.
//!
//! Owns the socket for the lifetime of one counterparty connection: frames
//! inbound bytes, feeds them to the session core, and acts on the events the
//! core emits. All application callbacks for a session run inside this task
//! while the core lock is held, so they are serialized per session.

use crate::application::{Application, RejectReason};
use crate::registry::{SessionHandle, SessionRegistry};
use bytes::BytesMut;
use keelfix_core::field::tags;
use keelfix_core::message::{MsgType, OutboundMessage, OwnedMessage};
use keelfix_core::types::{CompId, SessionId};
use keelfix_session::{SessionCore, SessionEvent};
use keelfix_tagvalue::Decoder as MessageDecoder;
use keelfix_transport::{CodecError, FixCodec};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Decoder as _;
use tracing::{debug, error, info, warn};

/// How long an accepted socket may sit silent before the first complete
/// frame arrives. The session's own logon timeout takes over once the
/// session is identified.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shortest timer tick the driver will use.
const MIN_TICK: Duration = Duration::from_millis(5);

/// Serves one accepted connection to completion.
///
/// Reads the identifying Logon, binds the matching session, and runs the
/// read/write loop until disconnect. Unknown counterparties and duplicate
/// logons are dropped without a session ever being touched.
pub(crate) async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<SessionRegistry>,
    app: Arc<dyn Application>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut codec = FixCodec::new();
    let mut buf = BytesMut::with_capacity(8192);
    let (mut reader, writer) = stream.into_split();

    let first = tokio::select! {
        _ = shutdown_rx.changed() => return,
        framed = tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            read_frame(&mut reader, &mut buf, &mut codec),
        ) => match framed {
            Ok(Ok(Some(frame))) => frame,
            Ok(Ok(None)) => {
                debug!(%peer, "connection closed before logon");
                return;
            }
            Ok(Err(err)) => {
                warn!(%peer, %err, "failed to frame first message");
                return;
            }
            Err(_) => {
                warn!(%peer, "no logon within handshake timeout");
                return;
            }
        },
    };

    let msg = match parse_frame(&first) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(%peer, %err, "unparseable first message");
            return;
        }
    };
    if msg.msg_type() != &MsgType::Logon {
        warn!(%peer, msg_type = msg.msg_type().as_str(), "first message is not a logon");
        return;
    }

    let Some(session_id) = identify(&msg) else {
        warn!(%peer, "logon carries no usable session identity");
        return;
    };
    let Some(handle) = registry.get(&session_id) else {
        warn!(%peer, session = %session_id, "logon for unknown session");
        return;
    };
    let Some(outbound_rx) = handle.try_bind() else {
        warn!(%peer, session = %session_id, "session already bound, dropping duplicate");
        return;
    };

    info!(%peer, session = %session_id, "connection bound");
    drive(
        reader,
        writer,
        buf,
        msg,
        handle.clone(),
        app,
        outbound_rx,
        shutdown_rx,
    )
    .await;
    handle.release();
    info!(%peer, session = %session_id, "connection released");
}

/// Runs the session loop after a successful bind.
#[allow(clippy::too_many_arguments)]
async fn drive(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    mut buf: BytesMut,
    first_msg: OwnedMessage,
    handle: Arc<SessionHandle>,
    app: Arc<dyn Application>,
    mut outbound_rx: mpsc::Receiver<OutboundMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let session_id = handle.session_id().clone();

    let (mut codec, tick) = {
        let mut core = handle.core().lock().await;
        let config = core.config();
        let codec = FixCodec::new()
            .with_max_message_size(config.max_message_size)
            .with_checksum_validation(config.validate_checksum);
        let tick = (config.heartbeat_interval / 4).max(MIN_TICK);

        core.on_connected();
        let events = match core.on_message(first_msg).await {
            Ok(events) => events,
            Err(err) => {
                error!(session = %session_id, %err, "logon rejected");
                drop(core);
                finish(&handle, &app).await;
                return;
            }
        };
        if !dispatch(&mut core, &app, &mut writer, events, &session_id).await {
            drop(core);
            finish(&handle, &app).await;
            return;
        }
        (codec, tick)
    };

    let mut timer = tokio::time::interval(tick);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                let mut core = handle.core().lock().await;
                if core.status().is_logged_on() {
                    match core.initiate_logout("engine shutdown") {
                        Ok(events) => {
                            dispatch(&mut core, &app, &mut writer, events, &session_id).await;
                        }
                        Err(err) => debug!(session = %session_id, %err, "logout skipped"),
                    }
                }
                break;
            }
            frame = read_frame(&mut reader, &mut buf, &mut codec) => {
                match frame {
                    Ok(Some(frame)) => {
                        let msg = match parse_frame(&frame) {
                            Ok(msg) => msg,
                            Err(err) => {
                                warn!(session = %session_id, %err, "dropping unparseable frame");
                                break;
                            }
                        };
                        let mut core = handle.core().lock().await;
                        match core.on_message(msg).await {
                            Ok(events) => {
                                if !dispatch(&mut core, &app, &mut writer, events, &session_id).await {
                                    break;
                                }
                            }
                            Err(err) => {
                                error!(session = %session_id, %err, "session error, disconnecting");
                                forced_logout(&mut core, &app, &mut writer, &err, &session_id).await;
                                break;
                            }
                        }
                    }
                    Ok(None) => {
                        info!(session = %session_id, "peer closed connection");
                        break;
                    }
                    Err(err) => {
                        warn!(session = %session_id, %err, "framing error, disconnecting");
                        break;
                    }
                }
            }
            outbound = outbound_rx.recv() => {
                let Some(msg) = outbound else { break };
                let mut core = handle.core().lock().await;
                if !send_outbound(&mut core, &app, &mut writer, msg, &session_id).await {
                    break;
                }
            }
            _ = timer.tick() => {
                let mut core = handle.core().lock().await;
                match core.on_timer().await {
                    Ok(events) => {
                        if !dispatch(&mut core, &app, &mut writer, events, &session_id).await {
                            break;
                        }
                    }
                    Err(err) => {
                        error!(session = %session_id, %err, "timer error, disconnecting");
                        forced_logout(&mut core, &app, &mut writer, &err, &session_id).await;
                        break;
                    }
                }
            }
        }
    }

    finish(&handle, &app).await;
}

/// Sends a Logout carrying the violation text before the transport drops,
/// so the peer learns why the session ended.
async fn forced_logout(
    core: &mut SessionCore,
    app: &Arc<dyn Application>,
    writer: &mut OwnedWriteHalf,
    err: &keelfix_core::error::SessionError,
    session_id: &SessionId,
) {
    if !core.status().is_logged_on() {
        return;
    }
    match core.initiate_logout(&err.to_string()) {
        Ok(events) => {
            dispatch(core, app, writer, events, session_id).await;
        }
        Err(err) => debug!(session = %session_id, %err, "forced logout skipped"),
    }
}

/// Tears down the session state and fires the logout callback if the
/// session was logged on.
async fn finish(handle: &SessionHandle, app: &Arc<dyn Application>) {
    let session_id = handle.session_id().clone();
    let mut core = handle.core().lock().await;
    for event in core.on_disconnect().await {
        match event {
            SessionEvent::LoggedOut => app.on_logout(&session_id).await,
            SessionEvent::Disconnect(Some(err)) => {
                warn!(session = %session_id, %err, "disconnected with error");
            }
            _ => {}
        }
    }
}

/// Acts on the events one core call produced.
///
/// Returns false when the connection must be torn down.
async fn dispatch(
    core: &mut SessionCore,
    app: &Arc<dyn Application>,
    writer: &mut OwnedWriteHalf,
    events: Vec<SessionEvent>,
    session_id: &SessionId,
) -> bool {
    for event in events {
        match event {
            SessionEvent::Admin(mut msg) => {
                app.to_admin(&mut msg, session_id).await;
                if !finalize_and_write(core, writer, &msg, session_id).await {
                    return false;
                }
            }
            SessionEvent::Transmit(bytes) => {
                if let Err(err) = writer.write_all(&bytes).await {
                    warn!(session = %session_id, %err, "write failed");
                    return false;
                }
            }
            SessionEvent::LoggedOn => app.on_logon(session_id).await,
            SessionEvent::LoggedOut => app.on_logout(session_id).await,
            SessionEvent::FromAdmin(msg) => {
                if let Err(reason) = app.from_admin(&msg, session_id).await {
                    if !write_reject(core, app, writer, &msg, &reason, session_id).await {
                        return false;
                    }
                }
            }
            SessionEvent::FromApp(msg) => {
                if let Err(reason) = app.from_app(&msg, session_id).await {
                    if !write_reject(core, app, writer, &msg, &reason, session_id).await {
                        return false;
                    }
                }
            }
            SessionEvent::Disconnect(err) => {
                if let Some(err) = err {
                    warn!(session = %session_id, %err, "core requested disconnect");
                } else {
                    debug!(session = %session_id, "core requested disconnect");
                }
                return false;
            }
        }
    }
    true
}

/// Sends one application-queued message through the outbound callbacks.
///
/// A veto from `to_app` drops the message without consuming a sequence
/// number; the connection stays up.
async fn send_outbound(
    core: &mut SessionCore,
    app: &Arc<dyn Application>,
    writer: &mut OwnedWriteHalf,
    mut msg: OutboundMessage,
    session_id: &SessionId,
) -> bool {
    if msg.is_admin() {
        app.to_admin(&mut msg, session_id).await;
    } else if let Err(reason) = app.to_app(&mut msg, session_id).await {
        debug!(session = %session_id, %reason, "outbound message vetoed");
        return true;
    }
    finalize_and_write(core, writer, &msg, session_id).await
}

/// Stamps, persists, and transmits one outbound message.
async fn finalize_and_write(
    core: &mut SessionCore,
    writer: &mut OwnedWriteHalf,
    msg: &OutboundMessage,
    session_id: &SessionId,
) -> bool {
    let bytes = match core.finalize_outbound(msg).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(session = %session_id, %err, "failed to finalize outbound message");
            return false;
        }
    };
    if let Err(err) = writer.write_all(&bytes).await {
        warn!(session = %session_id, %err, "write failed");
        return false;
    }
    true
}

/// Sends a session-level Reject for a message the application refused.
async fn write_reject(
    core: &mut SessionCore,
    app: &Arc<dyn Application>,
    writer: &mut OwnedWriteHalf,
    rejected: &OwnedMessage,
    reason: &RejectReason,
    session_id: &SessionId,
) -> bool {
    info!(session = %session_id, %reason, "application rejected inbound message");
    let mut msg = OutboundMessage::new(MsgType::Reject)
        .with_field(tags::SESSION_REJECT_REASON, reason.code.to_string())
        .with_field(tags::TEXT, reason.text.clone());
    if let Some(seq) = rejected.seq_num() {
        msg.set_field(tags::REF_SEQ_NUM, seq.to_string());
    }
    if let Some(tag) = reason.ref_tag {
        msg.set_field(tags::REF_TAG_ID, tag.to_string());
    }
    app.to_admin(&mut msg, session_id).await;
    finalize_and_write(core, writer, &msg, session_id).await
}

/// Reads from the socket until one complete frame is buffered.
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary.
async fn read_frame(
    reader: &mut OwnedReadHalf,
    buf: &mut BytesMut,
    codec: &mut FixCodec,
) -> Result<Option<bytes::Bytes>, CodecError> {
    loop {
        if let Some(frame) = codec.decode(buf)? {
            return Ok(Some(frame));
        }
        let n = reader.read_buf(buf).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(CodecError::Io("connection reset mid-frame".to_string()));
        }
    }
}

/// Parses a complete frame into an owned message.
///
/// The codec already verified the checksum, so parsing skips it.
fn parse_frame(frame: &bytes::Bytes) -> Result<OwnedMessage, keelfix_core::error::DecodeError> {
    MessageDecoder::new(frame)
        .with_checksum_validation(false)
        .decode()
        .map(|raw| raw.to_owned())
}

/// Derives the local session identity from an inbound Logon.
///
/// The counterparty's TargetCompID is this side's SenderCompID, so the comp
/// ids and sub ids swap roles.
fn identify(msg: &OwnedMessage) -> Option<SessionId> {
    let begin_string = msg.begin_string()?;
    let sender = CompId::new(msg.target_comp_id()?)?;
    let target = CompId::new(msg.sender_comp_id()?)?;
    let mut id = SessionId::new(begin_string, sender, target);
    if let Some(sub) = msg.get_field_str(tags::TARGET_SUB_ID) {
        id = id.with_sender_sub_id(sub);
    }
    if let Some(sub) = msg.get_field_str(tags::SENDER_SUB_ID) {
        id = id.with_target_sub_id(sub);
    }
    Some(id)
}
