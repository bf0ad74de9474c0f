//! Provider-side session token state.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use session_engine::Principal;

/// Tokens and identity for the service's active session.
#[derive(Debug, Clone)]
pub struct StoredSession {
    /// JWT access token for authenticated API calls.
    pub access_token: String,
    /// Refresh token issued alongside the access token.
    pub refresh_token: String,
    /// The principal these tokens belong to.
    pub principal: Principal,
    /// Access-token expiry.
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    /// Whether the access token has expired locally.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Shared slot holding the active session, if any.
///
/// Clones share the slot, so the identity provider and the profile
/// store see the same tokens. Written only after the service confirmed
/// a grant; cleared only after it confirmed a logout.
#[derive(Clone, Default)]
pub struct TokenCache {
    inner: Arc<RwLock<Option<StoredSession>>>,
}

impl TokenCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the active session.
    pub fn store(&self, session: StoredSession) {
        *self.inner.write().expect("lock poisoned") = Some(session);
    }

    /// Drops the active session.
    pub fn clear(&self) {
        *self.inner.write().expect("lock poisoned") = None;
    }

    /// Copy of the active session, expired or not.
    pub fn current(&self) -> Option<StoredSession> {
        self.inner.read().expect("lock poisoned").clone()
    }

    /// Access token of an unexpired session.
    pub fn access_token(&self) -> Option<String> {
        self.current()
            .filter(|session| !session.is_expired())
            .map(|session| session.access_token)
    }
}
