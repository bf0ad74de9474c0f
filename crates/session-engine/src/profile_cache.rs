//! In-memory holder for the active principal's profile.

use std::sync::{Arc, RwLock};

use crate::types::UserProfile;

/// Holds at most one profile: the one belonging to the active session's
/// principal, or nothing when signed out.
///
/// Clones share the same slot. The `cache present ⇒ session present`
/// invariant is enforced by the `SessionManager`, which serializes all
/// writes; the cache itself only guards the slot.
#[derive(Clone, Default)]
pub struct ProfileCache {
    inner: Arc<RwLock<Option<UserProfile>>>,
}

impl ProfileCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the cached profile, if any.
    pub fn get(&self) -> Option<UserProfile> {
        self.inner.read().expect("lock poisoned").clone()
    }

    /// Replaces the cached profile.
    pub fn set(&self, profile: UserProfile) {
        *self.inner.write().expect("lock poisoned") = Some(profile);
    }

    /// Empties the cache.
    pub fn clear(&self) {
        *self.inner.write().expect("lock poisoned") = None;
    }
}
