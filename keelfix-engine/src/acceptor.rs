/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! TCP acceptor.
//!
//! Binds the configured endpoints, accepts connections, and hands each
//! socket to a [`connection`](crate::connection) driver task. Sessions are
//! identified from the inbound Logon, never from the endpoint.

use crate::application::Application;
use crate::connection;
use crate::error::EngineError;
use crate::registry::{SessionHandle, SessionRegistry};
use crate::settings::EngineSettings;
use keelfix_core::types::SessionId;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

/// The engine's accepting side.
///
/// Owns the session registry and the listener tasks. Created once from
/// validated settings; started and stopped explicitly.
pub struct Acceptor {
    settings: EngineSettings,
    registry: Arc<SessionRegistry>,
    application: Arc<dyn Application>,
    shutdown_tx: watch::Sender<bool>,
    started: AtomicBool,
    listeners: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    local_addrs: parking_lot::Mutex<Vec<SocketAddr>>,
}

impl Acceptor {
    /// Builds the acceptor: validates settings, opens the per-session
    /// stores, and fires `on_create` for every configured session. No
    /// sockets are bound until [`start`](Self::start).
    ///
    /// # Errors
    /// Returns `EngineError` if the settings are invalid or a session store
    /// cannot be opened.
    pub async fn new(
        settings: EngineSettings,
        application: Arc<dyn Application>,
    ) -> Result<Self, EngineError> {
        settings.validate()?;
        let registry = Arc::new(SessionRegistry::build(&settings)?);
        for handle in registry.all() {
            application.on_create(handle.session_id()).await;
        }
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            settings,
            registry,
            application,
            shutdown_tx,
            started: AtomicBool::new(false),
            listeners: parking_lot::Mutex::new(Vec::new()),
            local_addrs: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// Binds the endpoints and begins accepting. Idempotent.
    ///
    /// A bind failure on one endpoint is logged and skipped; the call fails
    /// only when no endpoint could be bound.
    ///
    /// # Errors
    /// Returns `EngineError::Bind` for the last failed endpoint if none
    /// bound.
    pub async fn start(&self) -> Result<(), EngineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shutdown_tx.send_replace(false);

        let mut bound = 0usize;
        let mut last_err = None;
        for addr in &self.settings.listen_addrs {
            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    let local = listener.local_addr().map_err(|e| EngineError::Bind {
                        addr: *addr,
                        reason: e.to_string(),
                    })?;
                    info!(%local, "listening");
                    self.local_addrs.lock().push(local);
                    let task = tokio::spawn(accept_loop(
                        listener,
                        self.registry.clone(),
                        self.application.clone(),
                        self.shutdown_tx.subscribe(),
                    ));
                    self.listeners.lock().push(task);
                    bound += 1;
                }
                Err(err) => {
                    error!(%addr, %err, "failed to bind endpoint");
                    last_err = Some(EngineError::Bind {
                        addr: *addr,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if bound == 0 {
            self.started.store(false, Ordering::SeqCst);
            if let Some(err) = last_err {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Stops accepting and signals live connections to log out and close.
    ///
    /// Waits for every listener and connection task to finish, so no
    /// application callback runs after this returns. Idempotent; a stop
    /// before start is a no-op.
    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("acceptor stopping");
        let _ = self.shutdown_tx.send(true);
        let tasks: Vec<JoinHandle<()>> = self.listeners.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        self.local_addrs.lock().clear();
        info!("acceptor stopped");
    }

    /// Returns true if the acceptor is accepting connections.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Looks up a session handle, for sending messages or inspection.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownSession` if the identity is not
    /// configured.
    pub fn session(&self, id: &SessionId) -> Result<Arc<SessionHandle>, EngineError> {
        self.registry.require(id)
    }

    /// Returns handles for every configured session.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<SessionHandle>> {
        self.registry.all()
    }

    /// Returns the addresses actually bound, in bind order. Useful when an
    /// endpoint was configured with port 0.
    #[must_use]
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.local_addrs.lock().clone()
    }
}

impl std::fmt::Debug for Acceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acceptor")
            .field("sessions", &self.registry.len())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

/// Accepts sockets until shutdown, spawning one driver task per socket.
/// On shutdown, drains its connection tasks before returning.
async fn accept_loop(
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    application: Arc<dyn Application>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        if let Err(err) = stream.set_nodelay(true) {
                            warn!(%peer, %err, "failed to set nodelay");
                        }
                        connections.spawn(connection::serve(
                            stream,
                            peer,
                            registry.clone(),
                            application.clone(),
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(err) => {
                        warn!(%err, "accept failed");
                    }
                }
            }
            // Reap finished connections so the set stays small.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
    while connections.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::NoOpApplication;
    use bytes::{Bytes, BytesMut};
    use keelfix_core::field::tags;
    use keelfix_core::types::CompId;
    use keelfix_session::SessionConfig;
    use keelfix_tagvalue::{Decoder, Encoder};
    use keelfix_transport::FixCodec;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_util::codec::Decoder as _;

    fn settings() -> EngineSettings {
        EngineSettings::new()
            .with_listen_addr("127.0.0.1:0".parse().unwrap())
            .with_session(SessionConfig::new(
                CompId::new("VENUE").unwrap(),
                CompId::new("CLIENT").unwrap(),
                "FIX.4.4",
            ))
    }

    fn client_frame(msg_type: &str, seq: u64, extra: &[(u32, &str)]) -> Bytes {
        let mut enc = Encoder::new("FIX.4.4");
        enc.put_str(tags::MSG_TYPE, msg_type);
        enc.put_uint(tags::MSG_SEQ_NUM, seq);
        enc.put_str(tags::SENDER_COMP_ID, "CLIENT");
        enc.put_str(tags::TARGET_COMP_ID, "VENUE");
        enc.put_str(tags::SENDING_TIME, "20260514-12:00:00.000");
        for (tag, value) in extra {
            enc.put_str(*tag, value);
        }
        enc.finish().freeze()
    }

    async fn read_frame(stream: &mut TcpStream, buf: &mut BytesMut) -> Option<Bytes> {
        let mut codec = FixCodec::new();
        loop {
            if let Some(frame) = codec.decode(buf).unwrap() {
                return Some(frame);
            }
            let n = stream.read_buf(buf).await.unwrap();
            if n == 0 {
                return None;
            }
        }
    }

    fn field_of(frame: &Bytes, tag: u32) -> Option<String> {
        let raw = Decoder::new(frame)
            .with_checksum_validation(false)
            .decode()
            .unwrap();
        raw.get_field_str(tag).map(str::to_string)
    }

    fn msg_type_of(frame: &Bytes) -> String {
        let raw = Decoder::new(frame)
            .with_checksum_validation(false)
            .decode()
            .unwrap();
        raw.msg_type().as_str().to_string()
    }

    async fn start_acceptor() -> (Acceptor, SocketAddr) {
        let acceptor = Acceptor::new(settings(), Arc::new(NoOpApplication))
            .await
            .unwrap();
        acceptor.start().await.unwrap();
        let addr = acceptor.local_addrs()[0];
        (acceptor, addr)
    }

    async fn logon(stream: &mut TcpStream, buf: &mut BytesMut) {
        stream
            .write_all(&client_frame("A", 1, &[(tags::HEART_BT_INT, "30")]))
            .await
            .unwrap();
        let ack = read_frame(stream, buf).await.unwrap();
        assert_eq!(msg_type_of(&ack), "A");
        assert_eq!(field_of(&ack, tags::HEART_BT_INT).as_deref(), Some("30"));
        assert_eq!(field_of(&ack, tags::SENDER_COMP_ID).as_deref(), Some("VENUE"));
        assert_eq!(field_of(&ack, tags::TARGET_COMP_ID).as_deref(), Some("CLIENT"));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let acceptor = Acceptor::new(settings(), Arc::new(NoOpApplication))
            .await
            .unwrap();
        assert!(!acceptor.is_started());

        acceptor.start().await.unwrap();
        assert!(acceptor.is_started());
        assert_eq!(acceptor.local_addrs().len(), 1);

        // Second start is a no-op.
        acceptor.start().await.unwrap();
        assert_eq!(acceptor.local_addrs().len(), 1);

        acceptor.stop().await;
        assert!(!acceptor.is_started());
        acceptor.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let result = Acceptor::new(EngineSettings::new(), Arc::new(NoOpApplication)).await;
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn test_session_lookup() {
        let acceptor = Acceptor::new(settings(), Arc::new(NoOpApplication))
            .await
            .unwrap();
        let id = settings().sessions[0].session_id();
        assert!(acceptor.session(&id).is_ok());
        assert_eq!(acceptor.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_logon_and_test_request_exchange() {
        let (acceptor, addr) = start_acceptor().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buf = BytesMut::new();

        logon(&mut stream, &mut buf).await;

        stream
            .write_all(&client_frame("1", 2, &[(tags::TEST_REQ_ID, "ping")]))
            .await
            .unwrap();
        let reply = read_frame(&mut stream, &mut buf).await.unwrap();
        assert_eq!(msg_type_of(&reply), "0");
        assert_eq!(field_of(&reply, tags::TEST_REQ_ID).as_deref(), Some("ping"));

        acceptor.stop().await;
    }

    #[tokio::test]
    async fn test_gap_triggers_resend_request() {
        let (acceptor, addr) = start_acceptor().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buf = BytesMut::new();

        logon(&mut stream, &mut buf).await;

        // Jump from the expected 2 to 5; the engine must ask for 2..4.
        stream
            .write_all(&client_frame("D", 5, &[(11, "order-1")]))
            .await
            .unwrap();
        let reply = read_frame(&mut stream, &mut buf).await.unwrap();
        assert_eq!(msg_type_of(&reply), "2");
        assert_eq!(field_of(&reply, tags::BEGIN_SEQ_NO).as_deref(), Some("2"));
        assert_eq!(field_of(&reply, tags::END_SEQ_NO).as_deref(), Some("4"));

        acceptor.stop().await;
    }

    #[tokio::test]
    async fn test_peer_logout_is_confirmed() {
        let (acceptor, addr) = start_acceptor().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buf = BytesMut::new();

        logon(&mut stream, &mut buf).await;

        stream.write_all(&client_frame("5", 2, &[])).await.unwrap();
        let reply = read_frame(&mut stream, &mut buf).await.unwrap();
        assert_eq!(msg_type_of(&reply), "5");

        // The engine closes the connection after confirming.
        assert!(read_frame(&mut stream, &mut buf).await.is_none());
        acceptor.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_comp_ids_are_dropped() {
        let (acceptor, addr) = start_acceptor().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buf = BytesMut::new();

        let mut enc = Encoder::new("FIX.4.4");
        enc.put_str(tags::MSG_TYPE, "A");
        enc.put_uint(tags::MSG_SEQ_NUM, 1);
        enc.put_str(tags::SENDER_COMP_ID, "STRANGER");
        enc.put_str(tags::TARGET_COMP_ID, "VENUE");
        enc.put_str(tags::HEART_BT_INT, "30");
        stream.write_all(&enc.finish()).await.unwrap();

        // No session, no reply; the socket just closes.
        assert!(read_frame(&mut stream, &mut buf).await.is_none());
        acceptor.stop().await;
    }

    #[tokio::test]
    async fn test_duplicate_logon_is_dropped() {
        let (acceptor, addr) = start_acceptor().await;
        let mut first = TcpStream::connect(addr).await.unwrap();
        let mut buf = BytesMut::new();
        logon(&mut first, &mut buf).await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        let mut buf2 = BytesMut::new();
        second
            .write_all(&client_frame("A", 1, &[(tags::HEART_BT_INT, "30")]))
            .await
            .unwrap();
        assert!(read_frame(&mut second, &mut buf2).await.is_none());

        // The first connection is untouched.
        first
            .write_all(&client_frame("1", 2, &[(tags::TEST_REQ_ID, "alive")]))
            .await
            .unwrap();
        let reply = read_frame(&mut first, &mut buf).await.unwrap();
        assert_eq!(msg_type_of(&reply), "0");

        acceptor.stop().await;
    }

    #[tokio::test]
    async fn test_session_errors_are_isolated() {
        let settings = settings().with_session(SessionConfig::new(
            CompId::new("VENUE").unwrap(),
            CompId::new("OTHER").unwrap(),
            "FIX.4.4",
        ));
        let acceptor = Acceptor::new(settings, Arc::new(NoOpApplication))
            .await
            .unwrap();
        acceptor.start().await.unwrap();
        let addr = acceptor.local_addrs()[0];

        let mut healthy = TcpStream::connect(addr).await.unwrap();
        let mut hbuf = BytesMut::new();
        logon(&mut healthy, &mut hbuf).await;

        let mut failing = TcpStream::connect(addr).await.unwrap();
        let mut fbuf = BytesMut::new();
        let mut enc = Encoder::new("FIX.4.4");
        enc.put_str(tags::MSG_TYPE, "A");
        enc.put_uint(tags::MSG_SEQ_NUM, 1);
        enc.put_str(tags::SENDER_COMP_ID, "OTHER");
        enc.put_str(tags::TARGET_COMP_ID, "VENUE");
        enc.put_str(tags::HEART_BT_INT, "30");
        failing.write_all(&enc.finish()).await.unwrap();
        let ack = read_frame(&mut failing, &mut fbuf).await.unwrap();
        assert_eq!(msg_type_of(&ack), "A");

        // A repeated sequence number without PossDupFlag is fatal for this
        // session only: the engine sends a Logout and closes.
        let mut enc = Encoder::new("FIX.4.4");
        enc.put_str(tags::MSG_TYPE, "1");
        enc.put_uint(tags::MSG_SEQ_NUM, 1);
        enc.put_str(tags::SENDER_COMP_ID, "OTHER");
        enc.put_str(tags::TARGET_COMP_ID, "VENUE");
        enc.put_str(tags::TEST_REQ_ID, "dup");
        failing.write_all(&enc.finish()).await.unwrap();
        let logout = read_frame(&mut failing, &mut fbuf).await.unwrap();
        assert_eq!(msg_type_of(&logout), "5");
        assert!(read_frame(&mut failing, &mut fbuf).await.is_none());

        // The healthy session keeps working.
        healthy
            .write_all(&client_frame("1", 2, &[(tags::TEST_REQ_ID, "still-up")]))
            .await
            .unwrap();
        let reply = read_frame(&mut healthy, &mut hbuf).await.unwrap();
        assert_eq!(msg_type_of(&reply), "0");

        acceptor.stop().await;
    }

    #[tokio::test]
    async fn test_outbound_send_after_logon() {
        let (acceptor, addr) = start_acceptor().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buf = BytesMut::new();
        logon(&mut stream, &mut buf).await;

        let id = settings().sessions[0].session_id();
        let handle = acceptor.session(&id).unwrap();
        let report = keelfix_core::message::OutboundMessage::new("8".parse().unwrap())
            .with_field(37, "exec-1");
        handle.send(report).await.unwrap();

        let frame = read_frame(&mut stream, &mut buf).await.unwrap();
        assert_eq!(msg_type_of(&frame), "8");
        assert_eq!(field_of(&frame, tags::MSG_SEQ_NUM).as_deref(), Some("2"));
        assert_eq!(field_of(&frame, 37).as_deref(), Some("exec-1"));

        acceptor.stop().await;
    }
}
