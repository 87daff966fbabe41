//! Session store: creation, lookup, expiry, and per-session stream registry.
//!
//! A [`Session`] binds one logical client conversation to a server-assigned
//! opaque id and owns every SSE sink registered under it, so deleting the
//! session closes them all. The [`SessionStore`] is the only shared mutable
//! state in the server; it knows nothing about transport framing.
//!
//! Expiry is enforced twice: lazily on lookup (an expired-but-present record
//! is removed and reported absent) and eagerly by a background sweep that
//! bounds memory growth from abandoned sessions between lookups.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Capacity of each per-stream outbound channel.
const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Identifier of one registered stream within a session.
pub type StreamId = u64;

/// One framed message bound for an SSE sink. The session assigns the event
/// id; the transport decides how to serialize it onto the wire.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Monotonic per-session event id.
    pub event_id: u64,
    /// Serialized JSON-RPC payload.
    pub json: String,
}

/// Milliseconds since the UNIX epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One logical client conversation.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at_ms: u64,
    last_accessed_ms: AtomicU64,
    client_info: Option<Value>,
    streams: StdMutex<HashMap<StreamId, mpsc::Sender<OutboundFrame>>>,
    next_stream_id: AtomicU64,
    next_event_id: AtomicU64,
}

impl Session {
    fn new(client_info: Option<Value>) -> Self {
        let now = now_ms();
        Self {
            // 128-bit random id, hex encoded. Unguessable and unique for
            // the process lifetime.
            id: Uuid::new_v4().simple().to_string(),
            created_at_ms: now,
            last_accessed_ms: AtomicU64::new(now),
            client_info,
            streams: StdMutex::new(HashMap::new()),
            next_stream_id: AtomicU64::new(0),
            next_event_id: AtomicU64::new(0),
        }
    }

    /// Returns the opaque session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the creation timestamp in milliseconds since the epoch.
    #[must_use]
    pub const fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// Returns the client metadata supplied at creation, verbatim.
    #[must_use]
    pub fn client_info(&self) -> Option<&Value> {
        self.client_info.as_ref()
    }

    /// Updates the last-accessed timestamp. Monotonically non-decreasing:
    /// concurrent touches race only between equally-fresh values.
    pub fn touch(&self) {
        self.last_accessed_ms.fetch_max(now_ms(), Ordering::Relaxed);
    }

    /// Returns `true` once the idle timeout has elapsed since last access.
    #[must_use]
    pub fn is_expired(&self, timeout: Duration) -> bool {
        let last = self.last_accessed_ms.load(Ordering::Relaxed);
        now_ms().saturating_sub(last) > timeout.as_millis() as u64
    }

    fn lock_streams(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<StreamId, mpsc::Sender<OutboundFrame>>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new outbound stream and returns its id together with the
    /// receiving half the transport drains into the socket.
    pub fn register_stream(&self) -> (StreamId, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        self.lock_streams().insert(stream_id, tx);
        debug!(session_id = %self.id, stream_id, "stream registered");
        (stream_id, rx)
    }

    /// Removes one stream from the registry, dropping its sender and ending
    /// the receiving stream. Idempotent: both the response side (client
    /// disconnect) and the dispatch side (all replies sent) deregister.
    pub fn deregister_stream(&self, stream_id: StreamId) {
        if self.lock_streams().remove(&stream_id).is_some() {
            debug!(session_id = %self.id, stream_id, "stream deregistered");
        }
    }

    /// Number of currently open streams. A session with zero streams is
    /// still valid until its timeout expires.
    #[must_use]
    pub fn open_streams(&self) -> usize {
        self.lock_streams().len()
    }

    /// Allocates the next per-session SSE event id.
    fn next_event_id(&self) -> u64 {
        self.next_event_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends one serialized message to a specific stream.
    ///
    /// Returns `false` when the stream is gone (deregistered or its receiver
    /// dropped); the caller discards the message rather than writing to a
    /// dead socket.
    pub async fn push_to_stream(&self, stream_id: StreamId, json: String) -> bool {
        let sender = self.lock_streams().get(&stream_id).cloned();
        let Some(sender) = sender else {
            return false;
        };
        let frame = OutboundFrame {
            event_id: self.next_event_id(),
            json,
        };
        sender.send(frame).await.is_ok()
    }

    /// Sends one serialized message to every open stream of this session.
    /// Returns the number of streams that accepted it.
    pub async fn broadcast(&self, json: String) -> usize {
        let senders: Vec<_> = self.lock_streams().values().cloned().collect();
        let mut delivered = 0;
        for sender in senders {
            let frame = OutboundFrame {
                event_id: self.next_event_id(),
                json: json.clone(),
            };
            if sender.send(frame).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Drops every registered sender, terminating all attached SSE streams.
    pub fn close_streams(&self) {
        let drained = {
            let mut streams = self.lock_streams();
            let n = streams.len();
            streams.clear();
            n
        };
        if drained > 0 {
            debug!(session_id = %self.id, closed = drained, "closed session streams");
        }
    }
}

/// Concurrent map of live sessions.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    timeout: Duration,
}

impl SessionStore {
    /// Creates a store with the given idle timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// Returns the configured idle timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates a session and returns it. Total: the only fallible step is
    /// drawing secure randomness for the id, which is process-fatal by
    /// contract.
    pub async fn create(&self, client_info: Option<Value>) -> Arc<Session> {
        let session = Arc::new(Session::new(client_info));
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id().to_string(), Arc::clone(&session));
        info!(session_id = %session.id(), total = sessions.len(), "session created");
        session
    }

    /// Looks up a session, touching it on success.
    ///
    /// An expired-but-present record is deleted as a side effect and
    /// reported absent, so callers can never observe an "expired" state.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        let found = self.sessions.read().await.get(id).cloned();
        let session = found?;
        if session.is_expired(self.timeout) {
            debug!(session_id = %id, "session expired on access");
            self.delete(id).await;
            return None;
        }
        session.touch();
        Some(session)
    }

    /// Returns `true` when the id names a live, unexpired session.
    pub async fn is_valid(&self, id: &str) -> bool {
        self.get(id).await.is_some()
    }

    /// Closes every stream registered under the session and removes it.
    /// Returns whether a record existed.
    pub async fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.close_streams();
                info!(session_id = %id, "session deleted");
                true
            }
            None => false,
        }
    }

    /// Removes every expired session, closing its streams. Returns how many
    /// were removed.
    pub async fn sweep(&self) -> usize {
        let expired: Vec<Arc<Session>> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|s| s.is_expired(self.timeout))
                .cloned()
                .collect()
        };
        if expired.is_empty() {
            return 0;
        }
        let mut removed = 0;
        let mut sessions = self.sessions.write().await;
        for session in expired {
            // Re-check under the write lock: a request may have touched the
            // session between the scan and now.
            if session.is_expired(self.timeout)
                && sessions.remove(session.id()).is_some()
            {
                session.close_streams();
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "swept expired sessions");
        }
        removed
    }

    /// Number of live sessions (expired-but-unswept records included).
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` when no sessions are held.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Spawns the background sweep loop. The task runs until the token is
    /// cancelled; sweep failures cannot occur (the operation is total).
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.sweep().await;
                    }
                    () = shutdown.cancelled() => {
                        debug!("session sweeper stopped");
                        break;
                    }
                }
            }
        })
    }
}
