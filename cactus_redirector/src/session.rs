//! Container sessions.
//!
//! The redirector plays the role of the container's session manager: a
//! session is created on demand (by `request.session(true)`, by the
//! automatic-session flag, or by the `CREATE_SESSION` service), identified by
//! a UUID and tracked by the client through the `JSESSIONID` cookie.
//! Sessions idle for longer than the store's timeout are purged whenever a
//! session is created or joined.

use crate::implicit::attributes::AttributeMap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicI64, Ordering},
};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// A session shared by every request that presents its id.
#[derive(Debug)]
pub struct HttpSession {
    id: String,
    created_at: DateTime<Utc>,
    /// Milliseconds since the epoch of the last create or join.
    last_accessed: AtomicI64,
    attributes: AttributeMap,
    /// True until a later request joins the session.
    is_new: AtomicBool,
    invalidated: AtomicBool,
}

impl HttpSession {
    fn new(id: String) -> Self {
        let created_at = Utc::now();
        Self {
            id,
            created_at,
            last_accessed: AtomicI64::new(created_at.timestamp_millis()),
            attributes: AttributeMap::new(),
            is_new: AtomicBool::new(true),
            invalidated: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_accessed.load(Ordering::SeqCst))
            .unwrap_or(self.created_at)
    }

    fn touch(&self, now: DateTime<Utc>) {
        self.last_accessed
            .store(now.timestamp_millis(), Ordering::SeqCst);
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_accessed_time()).to_std().unwrap_or_default()
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn is_new(&self) -> bool {
        self.is_new.load(Ordering::SeqCst)
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }

    /// Marks the session as dead. The store drops it on the next lookup.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }
}

/// Default idle time after which a session expires.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Live sessions indexed by id.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Arc<HttpSession>>,
    max_inactive: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_max_inactive(DEFAULT_SESSION_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose sessions expire after `max_inactive` without a request.
    /// A zero timeout expires a session as soon as the store is touched again.
    pub fn with_max_inactive(max_inactive: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            max_inactive,
        }
    }

    pub fn max_inactive(&self) -> Duration {
        self.max_inactive
    }

    /// Creates a new session with a fresh UUID v4 id.
    pub fn create(&self) -> Arc<HttpSession> {
        self.purge_expired();
        let session = Arc::new(HttpSession::new(Uuid::new_v4().to_string()));
        info!(session_id = %session.id, "Creating new session");
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Joins an existing session. The joined session is no longer new.
    pub fn join(&self, session_id: &str) -> Option<Arc<HttpSession>> {
        self.purge_expired();
        let session = self.sessions.get(session_id).map(|s| s.clone())?;
        if session.is_invalidated() {
            debug!(session_id = %session_id, "Dropping invalidated session");
            self.sessions.remove(session_id);
            return None;
        }
        session.touch(Utc::now());
        session.is_new.store(false, Ordering::SeqCst);
        Some(session)
    }

    /// Drops invalidated sessions and those idle for at least the timeout.
    /// Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| !s.is_invalidated() && s.idle_for(now) < self.max_inactive);
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            debug!(purged, remaining = self.sessions.len(), "Purged expired sessions");
        }
        purged
    }

    pub fn session_exists(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .map(|s| !s.is_invalidated())
            .unwrap_or(false)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
