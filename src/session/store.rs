//! In-memory session storage.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::observability::metrics;
use crate::security::context::SessionAttributes;

/// Session attribute holding the CSRF token issued with the session.
pub const CSRF_SESSION_ATTRIBUTE: &str = "endpoint_guard.csrf_token";

/// Idle time after which a session is dropped, unless configured otherwise.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// A server-side session: an id plus string attributes.
#[derive(Debug)]
pub struct Session {
    id: String,
    attributes: DashMap<String, String>,
    last_access: Mutex<Instant>,
}

impl Session {
    /// Create an empty session (no CSRF token).
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: DashMap::new(),
            last_access: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).map(|value| value.value().clone())
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.attributes.remove(name).map(|(_, value)| value)
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.attribute(CSRF_SESSION_ATTRIBUTE)
    }

    /// Mark the session as used now.
    pub fn touch(&self) {
        *self.lock_last_access() = Instant::now();
    }

    pub fn last_access(&self) -> Instant {
        *self.lock_last_access()
    }

    fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_access()) >= idle_timeout
    }

    fn lock_last_access(&self) -> std::sync::MutexGuard<'_, Instant> {
        self.last_access
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionAttributes for Session {
    fn attribute(&self, name: &str) -> Option<String> {
        Session::attribute(self, name)
    }
}

/// Thread-safe session store keyed by session id.
///
/// Sessions unused for longer than the idle timeout are treated as gone:
/// `get` drops them on sight and `evict_idle` sweeps the rest.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Arc<Session>>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Open a new session with a freshly issued CSRF token.
    pub fn create(&self) -> Arc<Session> {
        let session = Session::new(Uuid::new_v4().to_string());
        session.set_attribute(CSRF_SESSION_ATTRIBUTE, Uuid::new_v4().to_string());
        self.insert(session)
    }

    /// Store an already built session, replacing any session with the same id.
    pub fn insert(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.sessions.insert(session.id.clone(), session.clone());
        metrics::record_active_sessions(self.sessions.len());
        tracing::debug!(session_id = %session.id, "Session opened");
        session
    }

    /// Look up a live session. An idle session is dropped and reported as
    /// missing. Does not refresh the last access time.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.get(id).map(|entry| entry.value().clone())?;
        if session.is_idle(Instant::now(), self.idle_timeout) {
            let removed = self
                .sessions
                .remove_if(id, |_, stored| stored.is_idle(Instant::now(), self.idle_timeout))
                .is_some();
            if removed {
                metrics::record_active_sessions(self.sessions.len());
                tracing::debug!(session_id = %id, "Session expired");
            }
            return None;
        }
        Some(session)
    }

    /// Drop a session. Returns false if it did not exist.
    pub fn invalidate(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            metrics::record_active_sessions(self.sessions.len());
            tracing::debug!(session_id = %id, "Session invalidated");
        }
        removed
    }

    /// Drop every idle session. Returns how many were dropped.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !session.is_idle(now, self.idle_timeout));
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            metrics::record_active_sessions(self.sessions.len());
            tracing::debug!(evicted, remaining = self.sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Run `evict_idle` every `period` until the task is aborted.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period.max(Duration::from_millis(100)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                store.evict_idle();
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
