//! Behavior tests for the session engine.
//!
//! Organization:
//!
//! - `login.rs`        - password/credential sign-in, failure idempotence
//! - `provisioning.rs` - account creation, profile writes, partial failure
//! - `sign_out.rs`     - teardown and failed-teardown behavior
//! - `initialize.rs`   - startup restore and background profile load
//! - `concurrency.rs`  - serialization and committed-read guarantees
//!
//! All tests drive the manager through scripted in-memory collaborators.


use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    AuthError, AuthResult, ExternalCredential, IdentityProvider, Principal, PrincipalId,
    ProfileStore, SessionManager, UserProfile,
};

/// Scripted results for one provider operation, consumed in order.
pub(crate) struct Script<T> {
    queue: Mutex<VecDeque<AuthResult<T>>>,
    calls: AtomicUsize,
}

impl<T> Script<T> {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push(&self, result: AuthResult<T>) {
        self.queue.lock().unwrap().push_back(result);
    }

    fn next(&self) -> AuthResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::Unknown("unscripted call".to_string())))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Scripted identity provider.
///
/// Sign-in style calls optionally park on a one-shot gate so tests can
/// observe the manager mid-operation.
pub(crate) struct FakeProvider {
    pub(crate) sign_in: Script<Principal>,
    pub(crate) credential: Script<Principal>,
    pub(crate) sign_up: Script<Principal>,
    pub(crate) sign_out: Script<()>,
    pub(crate) reset: Script<()>,
    restored: Mutex<Option<Principal>>,
    hold_sign_in: Mutex<Option<Arc<Notify>>>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self {
            sign_in: Script::new(),
            credential: Script::new(),
            sign_up: Script::new(),
            sign_out: Script::new(),
            reset: Script::new(),
            restored: Mutex::new(None),
            hold_sign_in: Mutex::new(None),
        }
    }

    pub(crate) fn set_restored(&self, principal: Principal) {
        *self.restored.lock().unwrap() = Some(principal);
    }

    /// Park the next password sign-in until the returned gate is
    /// notified.
    pub(crate) fn hold_next_sign_in(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold_sign_in.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> AuthResult<Principal> {
        let gate = self.hold_sign_in.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.sign_in.next()
    }

    async fn sign_in_with_credential(
        &self,
        _credential: &ExternalCredential,
    ) -> AuthResult<Principal> {
        self.credential.next()
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> AuthResult<Principal> {
        self.sign_up.next()
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.sign_out.next()
    }

    async fn send_password_reset(&self, _email: &str) -> AuthResult<()> {
        self.reset.next()
    }

    async fn current_principal(&self) -> Option<Principal> {
        self.restored.lock().unwrap().clone()
    }
}

/// In-memory profile store with switchable failure modes.
pub(crate) struct MemoryProfileStore {
    profiles: Mutex<HashMap<PrincipalId, UserProfile>>,
    fail_create: AtomicBool,
    fail_fetch: AtomicBool,
    create_calls: AtomicUsize,
    hold_fetch: Mutex<Option<Arc<Notify>>>,
}

impl MemoryProfileStore {
    pub(crate) fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            fail_create: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            create_calls: AtomicUsize::new(0),
            hold_fetch: Mutex::new(None),
        }
    }

    pub(crate) fn seed(&self, principal: impl Into<PrincipalId>, profile: UserProfile) {
        self.profiles.lock().unwrap().insert(principal.into(), profile);
    }

    pub(crate) fn stored(&self, principal: &PrincipalId) -> Option<UserProfile> {
        self.profiles.lock().unwrap().get(principal).cloned()
    }

    pub(crate) fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Park the next fetch until the returned gate is notified.
    pub(crate) fn hold_next_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold_fetch.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn create(&self, principal: &PrincipalId, profile: &UserProfile) -> AuthResult<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AuthError::Network("profile store unavailable".to_string()));
        }
        self.profiles
            .lock()
            .unwrap()
            .insert(principal.clone(), profile.clone());
        Ok(())
    }

    async fn fetch(&self, principal: &PrincipalId) -> AuthResult<Option<UserProfile>> {
        let gate = self.hold_fetch.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AuthError::Network("profile store unavailable".to_string()));
        }
        Ok(self.profiles.lock().unwrap().get(principal).cloned())
    }
}

pub(crate) fn principal(id: &str, email: &str) -> Principal {
    Principal::new(id, email)
}

pub(crate) fn fixture() -> (SessionManager, Arc<FakeProvider>, Arc<MemoryProfileStore>) {
    let provider = Arc::new(FakeProvider::new());
    let store = Arc::new(MemoryProfileStore::new());
    let manager = SessionManager::new(provider.clone(), store.clone());
    (manager, provider, store)
}

/// Let spawned tasks run to their next await point (current-thread
/// runtime).
pub(crate) async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Basic workflow: create an account, observe the provisioned profile,
/// sign out.
#[tokio::test]
async fn basic_workflow() {
    let (manager, provider, _store) = fixture();
    provider.sign_up.push(Ok(principal("u-1", "a@x.com")));
    provider.sign_out.push(Ok(()));

    let created = manager.create_account("a@x.com", "pw123", "Ann").await.unwrap();
    assert_eq!(created.id.as_str(), "u-1");
    assert!(manager.snapshot().authenticated);
    assert_eq!(manager.profile().unwrap().user_name, "Ann");

    manager.sign_out().await.unwrap();
    assert!(!manager.snapshot().authenticated);
    assert!(manager.profile().is_none());
}
