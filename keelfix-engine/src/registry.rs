/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Session registry.
//!
//! Holds one [`SessionHandle`] per configured counterparty. Handles are
//! created once at startup and live for the lifetime of the engine;
//! connections come and go by binding and releasing them.

use crate::error::EngineError;
use crate::settings::EngineSettings;
use keelfix_core::message::OutboundMessage;
use keelfix_core::types::SessionId;
use keelfix_session::SessionCore;
use keelfix_store::{FileStore, MemoryStore, MessageStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::info;

/// Queue depth for outbound application messages per session.
const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// One configured session and its connection slot.
///
/// The protocol core is guarded by an async mutex because the connection
/// driver and the outbound send path both touch it. The outbound channel
/// sender is present only while a connection is bound.
pub struct SessionHandle {
    session_id: SessionId,
    core: Mutex<SessionCore>,
    outbound_tx: parking_lot::Mutex<Option<mpsc::Sender<OutboundMessage>>>,
    bound: AtomicBool,
}

impl SessionHandle {
    fn new(session_id: SessionId, core: SessionCore) -> Self {
        Self {
            session_id,
            core: Mutex::new(core),
            outbound_tx: parking_lot::Mutex::new(None),
            bound: AtomicBool::new(false),
        }
    }

    /// Returns the session identity.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns the protocol core behind its lock.
    pub(crate) fn core(&self) -> &Mutex<SessionCore> {
        &self.core
    }

    /// Returns true if a connection currently owns this session.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::SeqCst)
    }

    /// Claims the session for a new connection.
    ///
    /// Returns the receiving half of the outbound queue, or `None` if
    /// another connection already holds the session. A live session is
    /// never stolen by a later connection.
    pub(crate) fn try_bind(&self) -> Option<mpsc::Receiver<OutboundMessage>> {
        if self.bound.swap(true, Ordering::SeqCst) {
            return None;
        }
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        *self.outbound_tx.lock() = Some(tx);
        Some(rx)
    }

    /// Releases the session after its connection ends.
    pub(crate) fn release(&self) {
        *self.outbound_tx.lock() = None;
        self.bound.store(false, Ordering::SeqCst);
    }

    /// Queues an application message for transmission on the bound
    /// connection.
    ///
    /// # Errors
    /// Returns `EngineError::NotConnected` if no connection is bound or the
    /// connection is shutting down.
    pub async fn send(&self, msg: OutboundMessage) -> Result<(), EngineError> {
        let tx = self.outbound_tx.lock().clone();
        let Some(tx) = tx else {
            return Err(EngineError::NotConnected {
                id: self.session_id.to_string(),
            });
        };
        tx.send(msg).await.map_err(|_| EngineError::NotConnected {
            id: self.session_id.to_string(),
        })
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("bound", &self.is_bound())
            .finish_non_exhaustive()
    }
}

/// All sessions known to the engine, keyed by identity.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Arc<SessionHandle>>,
}

impl SessionRegistry {
    /// Builds the registry from validated settings, opening one store per
    /// session.
    ///
    /// # Errors
    /// Returns `EngineError::Store` if a file store cannot be opened.
    pub fn build(settings: &EngineSettings) -> Result<Self, EngineError> {
        let mut sessions = HashMap::new();
        for config in &settings.sessions {
            let id = config.session_id();
            let store: Arc<dyn MessageStore> = match &settings.store_dir {
                Some(dir) => {
                    let prefix = dir.join(id.file_prefix());
                    Arc::new(FileStore::open(&prefix)?)
                }
                None => Arc::new(MemoryStore::new()),
            };
            let core = SessionCore::new(config.clone(), store);
            info!(session = %id, "session registered");
            sessions.insert(id.clone(), Arc::new(SessionHandle::new(id, core)));
        }
        Ok(Self { sessions })
    }

    /// Looks up a session by identity.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id).cloned()
    }

    /// Looks up a session, mapping a miss to an error.
    ///
    /// # Errors
    /// Returns `EngineError::UnknownSession` if the identity is not
    /// configured.
    pub fn require(&self, id: &SessionId) -> Result<Arc<SessionHandle>, EngineError> {
        self.get(id).ok_or_else(|| EngineError::UnknownSession {
            id: id.to_string(),
        })
    }

    /// Returns handles for every configured session.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.values().cloned().collect()
    }

    /// Returns the number of configured sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
