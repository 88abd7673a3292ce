//! In-memory session store holding each browser's to-do lists.
//!
//! # Architecture
//!
//! The session store maps opaque session tokens to [`SessionData`]: the
//! session's [`TodoListStore`] plus any pending [`Flash`] messages. Sessions
//! expire after a sliding TTL; every successful access pushes the expiry
//! forward. Nothing is persisted, so all lists vanish when a session expires
//! or the process exits.
//!
//! Sessions are created lazily. A request without a live session works on
//! empty scratch data, and a session is only stored once that data holds a
//! list or a flash message. Read-only visitors never take up capacity.
//!
//! # Token Format
//!
//! Session tokens are 32 bytes of cryptographically secure random data,
//! base64-url encoded without padding, resulting in 43 character tokens.
//!
//! # Thread Safety
//!
//! The [`SessionStore`] uses interior mutability with [`RwLock`].
//! [`SessionStore::access`] resolves the session and runs its closure while
//! holding the write lock, so two requests against the same session are
//! applied one after the other and neither overwrites the other's changes.
//!
//! # Example
//!
//! ```rust
//! use todolists_server::session::{SessionStore, SessionStoreConfig};
//!
//! let store = SessionStore::new(SessionStoreConfig::default());
//!
//! // Looking without changing anything stores nothing.
//! let (token, count) = store.access(None, |data| data.lists.len()).unwrap();
//! assert_eq!((token, count), (None, 0));
//!
//! let (token, created) = store
//!     .access(None, |data| data.lists.create_list("Groceries"))
//!     .unwrap();
//! assert_eq!(created, Ok(0));
//! assert!(token.is_some());
//! assert_eq!(store.len(), 1);
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::flash::Flash;
use crate::store::TodoListStore;

/// Default sliding session TTL (24 hours).
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Longest accepted session TTL (one year).
pub const MAX_TTL_SECS: u64 = 365 * 86_400;

/// Default maximum number of sessions.
pub const DEFAULT_MAX_CAPACITY: usize = 10_000;

/// Size of the random token in bytes.
const TOKEN_BYTES: usize = 32;

/// Expected length of base64-url encoded token (43 characters).
const TOKEN_LENGTH: usize = 43;

/// Errors that can occur during session operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session store has reached maximum capacity.
    #[error("session store at maximum capacity ({max_capacity} sessions)")]
    AtCapacity {
        /// The maximum number of sessions allowed.
        max_capacity: usize,
    },

}

/// Configuration for the session store.
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Maximum number of concurrent sessions.
    pub max_capacity: usize,

    /// Idle time after which a session expires.
    pub ttl: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}

impl SessionStoreConfig {
    /// Creates a new configuration with custom values.
    pub fn new(max_capacity: usize, ttl: Duration) -> Self {
        Self { max_capacity, ttl }
    }
}

/// Everything a session remembers between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    /// The session's lists.
    pub lists: TodoListStore,

    /// Messages to show on the next rendered page.
    pub flash: Flash,
}

impl SessionData {
    /// Returns true if there is nothing worth keeping a session for.
    pub fn is_pristine(&self) -> bool {
        self.lists.is_empty() && self.flash.is_empty()
    }
}

#[derive(Debug)]
struct Session {
    data: SessionData,
    expires_at: Instant,
}

impl Session {
    fn new(data: SessionData, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: expiry_from_now(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    fn touch(&mut self, ttl: Duration) {
        self.expires_at = expiry_from_now(ttl);
    }
}

/// `now + ttl`, with the TTL capped at [`MAX_TTL_SECS`].
fn expiry_from_now(ttl: Duration) -> Instant {
    let now = Instant::now();
    let ttl = ttl.min(Duration::from_secs(MAX_TTL_SECS));
    now.checked_add(ttl).unwrap_or(now)
}

/// Thread-safe in-memory session store.
///
/// Cheap to clone; clones share the same sessions.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    config: SessionStoreConfig,
}

impl SessionStore {
    /// Creates a new session store with the given configuration.
    pub fn new(config: SessionStoreConfig) -> Self {
        debug!(
            max_capacity = config.max_capacity,
            ttl_secs = config.ttl.as_secs(),
            "Creating new session store"
        );
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Runs `f` against the session named by `token` and returns the token
    /// of the session the data now lives in.
    ///
    /// A live session has its expiry refreshed and is updated in place. With
    /// no live session, `f` runs against empty scratch data; if that data is
    /// still pristine afterwards nothing is stored and `None` is returned,
    /// otherwise it is stored as a new session under a fresh token. Lookup,
    /// expiry and creation all happen under one write lock.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AtCapacity`] if a new session is needed but the
    /// store is still full after purging expired sessions. The changes made
    /// by `f` are discarded.
    pub fn access<R>(
        &self,
        token: Option<&str>,
        f: impl FnOnce(&mut SessionData) -> R,
    ) -> Result<(Option<String>, R), SessionError> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(token) = token.filter(|token| token.len() == TOKEN_LENGTH) {
            if let Entry::Occupied(mut entry) = sessions.entry(token.to_string()) {
                if entry.get().is_expired() {
                    entry.remove();
                    trace!("Removed expired session during access");
                } else {
                    let session = entry.get_mut();
                    session.touch(self.config.ttl);
                    let value = f(&mut session.data);
                    return Ok((Some(entry.key().clone()), value));
                }
            }
        }

        let mut data = SessionData::default();
        let value = f(&mut data);
        if data.is_pristine() {
            return Ok((None, value));
        }

        if sessions.len() >= self.config.max_capacity {
            sessions.retain(|_, session| !session.is_expired());
        }

        if sessions.len() >= self.config.max_capacity {
            warn!(
                capacity = sessions.len(),
                max_capacity = self.config.max_capacity,
                "Session store at capacity, rejecting new session"
            );
            return Err(SessionError::AtCapacity {
                max_capacity: self.config.max_capacity,
            });
        }

        let token = generate_session_token();
        sessions.insert(token.clone(), Session::new(data, self.config.ttl));
        trace!(ttl_secs = self.config.ttl.as_secs(), "Created new session");

        Ok((Some(token), value))
    }

    /// Returns a copy of the session's data without refreshing its expiry.
    pub fn snapshot(&self, token: &str) -> Option<SessionData> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(token)
            .filter(|session| !session.is_expired())
            .map(|session| session.data.clone())
    }

    /// Returns the current number of sessions in the store.
    ///
    /// Note: This count may include expired sessions that haven't been
    /// cleaned up yet.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all expired sessions from the store.
    ///
    /// # Returns
    ///
    /// The number of sessions that were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let initial_len = sessions.len();

        sessions.retain(|_, session| !session.is_expired());

        let removed = initial_len - sessions.len();
        if removed > 0 {
            debug!(
                removed_count = removed,
                remaining_count = sessions.len(),
                "Cleaned up expired sessions"
            );
        }

        removed
    }

    /// Spawns a background task that periodically removes expired sessions.
    ///
    /// The task runs until the returned handle is aborted.
    pub fn spawn_cleanup_task(&self, cleanup_interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);

            loop {
                interval.tick().await;
                store.cleanup_expired();
            }
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionStoreConfig::default())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session_count", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Generates a cryptographically secure session token.
fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn short_lived_store(ttl_ms: u64) -> SessionStore {
        SessionStore::new(SessionStoreConfig::new(100, Duration::from_millis(ttl_ms)))
    }

    /// Stores a session holding one list and returns its token.
    fn start_session(store: &SessionStore, list_name: &str) -> String {
        let (token, _) = store
            .access(None, |data| data.lists.create_list(list_name).unwrap())
            .unwrap();
        token.unwrap()
    }

    #[test]
    fn test_generate_session_token_length() {
        assert_eq!(generate_session_token().len(), TOKEN_LENGTH);
    }

    #[test]
    fn test_generate_session_token_uniqueness() {
        let tokens: Vec<String> = (0..1000).map(|_| generate_session_token()).collect();
        let unique: std::collections::HashSet<_> = tokens.iter().collect();
        assert_eq!(tokens.len(), unique.len(), "All tokens should be unique");
    }

    #[test]
    fn test_pristine_access_stores_nothing() {
        let store = SessionStore::default();

        for _ in 0..5 {
            let (token, flash) = store.access(None, |data| data.flash.take()).unwrap();
            assert_eq!(token, None);
            assert!(flash.is_empty());
        }

        assert!(store.is_empty());
    }

    #[test]
    fn test_flash_alone_starts_a_session() {
        let store = SessionStore::default();

        let (token, ()) = store
            .access(None, |data| data.flash.set_error("The specified list was not found."))
            .unwrap();

        let data = store.snapshot(&token.unwrap()).unwrap();
        assert_eq!(
            data.flash.error.as_deref(),
            Some("The specified list was not found.")
        );
    }

    #[test]
    fn test_access_persists_changes() {
        let store = SessionStore::default();
        let token = start_session(&store, "Work");

        let (same, ()) = store
            .access(Some(&token), |data| {
                data.flash.set_success("The list has been created.")
            })
            .unwrap();
        assert_eq!(same.as_deref(), Some(token.as_str()));

        let data = store.snapshot(&token).unwrap();
        assert_eq!(data.lists.len(), 1);
        assert_eq!(data.flash.success.as_deref(), Some("The list has been created."));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::default();
        let first = start_session(&store, "Mine");
        let second = start_session(&store, "Theirs");

        let names = |token: &str| {
            store
                .snapshot(token)
                .unwrap()
                .lists
                .lists()
                .iter()
                .map(|list| list.name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&first), ["Mine"]);
        assert_eq!(names(&second), ["Theirs"]);
    }

    #[test]
    fn test_unknown_token_gets_fresh_data() {
        let store = SessionStore::default();
        start_session(&store, "Existing");

        let unknown = "a".repeat(TOKEN_LENGTH);
        for token in ["short", unknown.as_str()] {
            let (resolved, count) = store.access(Some(token), |data| data.lists.len()).unwrap();
            assert_eq!(resolved, None);
            assert_eq!(count, 0);
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_session_expiration() {
        let store = short_lived_store(10);
        let token = start_session(&store, "Old");

        thread::sleep(Duration::from_millis(20));

        assert!(store.snapshot(&token).is_none());
        let (resolved, count) = store.access(Some(&token), |data| data.lists.len()).unwrap();
        assert_eq!(resolved, None);
        assert_eq!(count, 0);
        assert_eq!(store.len(), 0, "expired session removed on access");
    }

    #[test]
    fn test_expired_session_is_replaced_when_written() {
        let store = short_lived_store(10);
        let token = start_session(&store, "Old");

        thread::sleep(Duration::from_millis(20));

        let (resolved, created) = store
            .access(Some(&token), |data| data.lists.create_list("New"))
            .unwrap();
        assert_eq!(created, Ok(0));
        let resolved = resolved.unwrap();
        assert_ne!(resolved, token);
        assert_eq!(store.snapshot(&resolved).unwrap().lists.lists()[0].name, "New");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_access_slides_expiry() {
        let store = short_lived_store(60);
        let token = start_session(&store, "Busy");

        for _ in 0..4 {
            thread::sleep(Duration::from_millis(25));
            store.access(Some(&token), |_| ()).unwrap();
        }

        assert!(store.snapshot(&token).is_some());
    }

    #[test]
    fn test_oversized_ttl_does_not_overflow() {
        let store = SessionStore::new(SessionStoreConfig::new(10, Duration::MAX));

        let token = start_session(&store, "Forever");
        store.access(Some(&token), |_| ()).unwrap();

        assert!(store.snapshot(&token).is_some());
    }

    #[test]
    fn test_session_store_capacity_limit() {
        let store =
            SessionStore::new(SessionStoreConfig::new(2, Duration::from_secs(300)));

        let first = start_session(&store, "One");
        start_session(&store, "Two");

        assert_eq!(
            store.access(None, |data| data.lists.create_list("Three").unwrap()),
            Err(SessionError::AtCapacity { max_capacity: 2 })
        );
        assert_eq!(store.len(), 2);

        // Existing sessions and read-only visitors are unaffected.
        assert!(store.access(Some(&first), |data| data.lists.len()).is_ok());
        assert_eq!(store.access(None, |data| data.lists.len()), Ok((None, 0)));
    }

    #[test]
    fn test_capacity_reclaims_expired_sessions() {
        let store = SessionStore::new(SessionStoreConfig::new(1, Duration::from_millis(5)));
        start_session(&store, "Stale");

        thread::sleep(Duration::from_millis(20));

        start_session(&store, "Fresh");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_session_store_cleanup_expired() {
        let store = short_lived_store(5);
        start_session(&store, "A");
        start_session(&store, "B");
        assert_eq!(store.len(), 2);

        thread::sleep(Duration::from_millis(20));

        assert_eq!(store.cleanup_expired(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_sessions() {
        let store = short_lived_store(5);
        start_session(&store, "A");

        let handle = store.spawn_cleanup_task(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(store.is_empty());
    }

    #[test]
    fn test_clones_share_sessions() {
        let store = SessionStore::default();
        let clone = store.clone();

        let token = start_session(&store, "Shared");

        assert!(clone.snapshot(&token).is_some());
    }

    #[test]
    fn test_session_store_debug_impl() {
        let store = SessionStore::default();
        start_session(&store, "A");

        let debug_str = format!("{:?}", store);
        assert!(debug_str.contains("SessionStore"));
        assert!(debug_str.contains("session_count"));
    }

    #[test]
    fn test_session_error_display() {
        assert_eq!(
            SessionError::AtCapacity { max_capacity: 100 }.to_string(),
            "session store at maximum capacity (100 sessions)"
        );
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let store = SessionStore::default();
        let token = start_session(&store, "Shared");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let token = token.clone();
                thread::spawn(move || {
                    for j in 0..25 {
                        store
                            .access(Some(&token), |data| {
                                data.lists.add_todo(0, &format!("todo {i}-{j}")).unwrap();
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let data = store.snapshot(&token).unwrap();
        assert_eq!(data.lists.list(0).unwrap().todos_count(), 200);
    }
}
