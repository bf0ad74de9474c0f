//! Session ownership and credential dispatch.
//!
//! `SessionManager` owns the committed session and the profile cache,
//! drives the collaborator traits, and serializes every mutation behind
//! a single write gate so concurrent callers only ever observe
//! fully-committed states.

use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::profile_cache::ProfileCache;
use crate::provider::{IdentityProvider, ProfileStore};
use crate::session_fsm::{
    SessionChangedPayload, SessionMachine, SessionMachineInput, SessionMachineState, SessionState,
};
use crate::types::{Credential, ExternalCredential, Principal, PrincipalId, UserProfile};

/// Callback type for session state change notifications.
pub type SessionCallback = Box<dyn Fn(SessionChangedPayload) + Send + Sync>;

/// Snapshot of session state for status reporting.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub authenticated: bool,
    pub state: SessionState,
    pub principal_id: Option<PrincipalId>,
    pub email: Option<String>,
}

/// Session manager: the single owner of the local session.
///
/// Clones share the same underlying state, so one manager can be handed
/// to the UI layer, background tasks, and tests alike.
///
/// # Concurrency
///
/// Mutating operations (login, create, sign-out, provisioning) hold an
/// async write gate across the whole operation, provider call included;
/// a second mutating call queues behind the first. Reads
/// (`current_session`, `profile`, `snapshot`) never block on in-flight
/// operations and only see committed values, because the session slot
/// is written once, after the provider confirmed success. A dropped
/// in-flight operation therefore cannot mutate the session; any
/// transient machine phase it leaves behind is resynchronized from the
/// committed session when the next operation starts.
#[derive(Clone)]
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    /// Serializes session/cache mutation end to end.
    write_gate: Arc<tokio::sync::Mutex<()>>,
    /// Committed session, readable concurrently with in-flight operations.
    session: Arc<RwLock<Option<Principal>>>,
    /// Explicit state machine guarding legal transitions.
    machine: Arc<Mutex<SessionMachine>>,
    cache: ProfileCache,
    /// Optional callback for state change notifications.
    state_callback: Arc<Mutex<Option<SessionCallback>>>,
}

impl SessionManager {
    /// Creates a manager over the given collaborators, signed out.
    pub fn new(provider: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            provider,
            profiles,
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
            session: Arc::new(RwLock::new(None)),
            machine: Arc::new(Mutex::new(SessionMachine::new())),
            cache: ProfileCache::new(),
            state_callback: Arc::new(Mutex::new(None)),
        }
    }

    /// Set a callback to be notified of session state changes.
    pub fn set_state_callback(&self, callback: SessionCallback) {
        *self.state_callback.lock().expect("lock poisoned") = Some(callback);
    }

    /// Restore a session the provider still considers active.
    ///
    /// Call once at startup. The profile load is kicked off in the
    /// background: its failure is logged, never propagated, and it
    /// skips installation if the session changed in the meantime.
    /// Returns whether a session was restored.
    pub async fn initialize(&self) -> bool {
        let _gate = self.write_gate.lock().await;
        self.resync_machine();

        if self.current_session().is_some() {
            return true;
        }

        let Some(principal) = self.provider.current_principal().await else {
            debug!("no prior session to restore");
            return false;
        };

        *self.session.write().expect("lock poisoned") = Some(principal.clone());
        if let Err(error) = self.transition(&SessionMachineInput::SessionRestored) {
            warn!(%error, "session restore transition rejected");
        }
        info!(principal = %principal.id, "restored prior session");

        let manager = self.clone();
        tokio::spawn(async move {
            let _gate = manager.write_gate.lock().await;
            let still_active =
                manager.current_session().map(|p| p.id) == Some(principal.id.clone());
            if !still_active {
                debug!(principal = %principal.id, "session changed before restore profile load");
                return;
            }
            if let Err(error) = manager.refresh_profile_locked(&principal).await {
                warn!(%error, principal = %principal.id, "profile load after session restore failed");
            }
        });

        true
    }

    /// Dispatch a login across the supported credential kinds.
    pub async fn login(&self, credential: Credential) -> AuthResult<Principal> {
        match credential {
            Credential::Password { email, password } => {
                self.login_with_password(&email, &password).await
            }
            Credential::External(credential) => self.login_with_credential(&credential).await,
        }
    }

    /// Sign in with an email/password pair.
    ///
    /// On success the session is committed and the profile cache is
    /// refreshed from the store. On failure a pre-existing session is
    /// left untouched and the provider's typed error is returned.
    pub async fn login_with_password(&self, email: &str, password: &str) -> AuthResult<Principal> {
        let _gate = self.write_gate.lock().await;
        self.begin_attempt()?;
        debug!(email, "attempting password sign-in");

        match self.provider.sign_in_with_password(email, password).await {
            Ok(principal) => {
                self.commit_sign_in(&principal)?;
                if let Err(error) = self.refresh_profile_locked(&principal).await {
                    warn!(%error, principal = %principal.id, "profile load after sign-in failed");
                }
                info!(principal = %principal.id, "password sign-in succeeded");
                Ok(principal)
            }
            Err(error) => {
                self.transition(&SessionMachineInput::LoginFailed)?;
                warn!(%error, "password sign-in failed");
                Err(error)
            }
        }
    }

    /// Sign in with an externally-issued credential.
    ///
    /// One call is one attempt: failure is terminal and the provider is
    /// never re-invoked from here. If the caller determines the failure
    /// means "no account exists yet", [`Self::provision_from_credential`]
    /// is the explicit path to create one.
    pub async fn login_with_credential(
        &self,
        credential: &ExternalCredential,
    ) -> AuthResult<Principal> {
        let _gate = self.write_gate.lock().await;
        self.begin_attempt()?;
        debug!(provider = %credential.kind, "attempting credential sign-in");

        match self.provider.sign_in_with_credential(credential).await {
            Ok(principal) => {
                self.commit_sign_in(&principal)?;
                if let Err(error) = self.refresh_profile_locked(&principal).await {
                    warn!(%error, principal = %principal.id, "profile load after sign-in failed");
                }
                info!(principal = %principal.id, provider = %credential.kind, "credential sign-in succeeded");
                Ok(principal)
            }
            Err(error) => {
                self.transition(&SessionMachineInput::LoginFailed)?;
                warn!(%error, provider = %credential.kind, "credential sign-in failed");
                Err(error)
            }
        }
    }

    /// Create an account with an externally-issued credential and
    /// provision its profile.
    ///
    /// Caller-driven fallback for a credential login that failed
    /// because no account exists. When `display_name` is absent a
    /// handle is derived from the principal id.
    pub async fn provision_from_credential(
        &self,
        credential: &ExternalCredential,
        display_name: Option<&str>,
    ) -> AuthResult<Principal> {
        let _gate = self.write_gate.lock().await;
        self.begin_attempt()?;
        debug!(provider = %credential.kind, "provisioning account from credential");

        let principal = match self.provider.sign_in_with_credential(credential).await {
            Ok(principal) => principal,
            Err(error) => {
                self.transition(&SessionMachineInput::LoginFailed)?;
                warn!(%error, provider = %credential.kind, "credential provisioning failed");
                return Err(error);
            }
        };

        self.commit_sign_in(&principal)?;
        info!(principal = %principal.id, provider = %credential.kind, "account provisioned from credential");

        let display_name = match display_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_display_name(&principal.id),
        };
        self.provision_profile_locked(&principal, &display_name)
            .await?;
        Ok(principal)
    }

    /// Create an account with email/password and provision its profile.
    ///
    /// A profile-store failure after the account was created leaves the
    /// session committed and surfaces as
    /// [`AuthError::ProfileProvisionFailed`]; retry with
    /// [`Self::provision_profile`] rather than creating the account
    /// again.
    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        user_name: &str,
    ) -> AuthResult<Principal> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(AuthError::AccountCreationFailed(
                "display name must not be empty".to_string(),
            ));
        }

        let _gate = self.write_gate.lock().await;
        self.begin_attempt()?;
        debug!(email, "creating account");

        let principal = match self.provider.sign_up(email, password).await {
            Ok(principal) => principal,
            Err(error) => {
                self.transition(&SessionMachineInput::LoginFailed)?;
                warn!(%error, "account creation failed");
                return Err(error);
            }
        };

        self.commit_sign_in(&principal)?;
        info!(principal = %principal.id, "account created");

        self.provision_profile_locked(&principal, user_name).await?;
        Ok(principal)
    }

    /// Write a fresh profile for the active principal.
    ///
    /// Retry path for [`AuthError::ProfileProvisionFailed`].
    pub async fn provision_profile(&self, user_name: &str) -> AuthResult<UserProfile> {
        let _gate = self.write_gate.lock().await;
        let principal = self.current_session().ok_or(AuthError::NotSignedIn)?;

        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(AuthError::ProfileProvisionFailed {
                principal: principal.id,
                detail: "display name must not be empty".to_string(),
            });
        }

        self.provision_profile_locked(&principal, user_name).await
    }

    /// Re-fetch the active principal's profile into the cache.
    pub async fn refresh_profile(&self) -> AuthResult<Option<UserProfile>> {
        let _gate = self.write_gate.lock().await;
        let principal = self.current_session().ok_or(AuthError::NotSignedIn)?;
        self.refresh_profile_locked(&principal).await
    }

    /// End the session.
    ///
    /// Session and cache are cleared only once the provider confirmed
    /// the sign-out; on failure both stay as they were so local state
    /// never disagrees with a provider that still holds the session.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let _gate = self.write_gate.lock().await;
        self.resync_machine();

        if self.current_session().is_none() {
            debug!("sign-out requested with no active session");
            return Ok(());
        }

        self.transition(&SessionMachineInput::SignOutRequested)?;

        match self.provider.sign_out().await {
            Ok(()) => {
                *self.session.write().expect("lock poisoned") = None;
                self.cache.clear();
                self.transition(&SessionMachineInput::SignOutSucceeded)?;
                info!("signed out");
                Ok(())
            }
            Err(error) => {
                self.transition(&SessionMachineInput::SignOutFailed)?;
                warn!(%error, "sign-out failed");
                Err(error)
            }
        }
    }

    /// Ask the provider to send a password-reset message.
    ///
    /// Stateless with respect to the session; no retries.
    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        debug!(email, "requesting password reset");
        self.provider.send_password_reset(email).await
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        SessionState::from(self.machine.lock().expect("lock poisoned").state())
    }

    /// The committed session's principal, if any.
    pub fn current_session(&self) -> Option<Principal> {
        self.session.read().expect("lock poisoned").clone()
    }

    /// The cached profile for the active principal, if loaded.
    pub fn profile(&self) -> Option<UserProfile> {
        self.cache.get()
    }

    /// Readable snapshot of the session for status surfaces.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        let session = self.current_session();
        SessionSnapshot {
            authenticated: session.is_some(),
            state,
            principal_id: session.as_ref().map(|p| p.id.clone()),
            email: session.map(|p| p.email),
        }
    }

    /// Start a login/create attempt: resynchronize a machine left in a
    /// transient phase by an abandoned attempt, then consume the
    /// attempt input.
    fn begin_attempt(&self) -> AuthResult<SessionState> {
        self.resync_machine();
        self.transition(&SessionMachineInput::LoginAttempt)
    }

    /// Rebuild the machine from the committed session if a cancelled
    /// operation left it mid-phase. Only called with the write gate
    /// held.
    fn resync_machine(&self) {
        let mut machine = self.machine.lock().expect("lock poisoned");
        let state = SessionState::from(machine.state());
        if !state.is_transient() {
            return;
        }

        let durable = if self.session.read().expect("lock poisoned").is_some() {
            SessionMachineState::SignedIn
        } else {
            SessionMachineState::SignedOut
        };
        warn!(stale = ?state, resumed = ?durable, "resynchronizing session machine after abandoned attempt");
        *machine = SessionMachine::from_state(durable);
    }

    /// Commit a confirmed sign-in: publish the principal, drop a stale
    /// profile if the principal changed, and record the transition.
    fn commit_sign_in(&self, principal: &Principal) -> AuthResult<SessionState> {
        let mut session = self.session.write().expect("lock poisoned");
        if session.as_ref().map(|p| &p.id) != Some(&principal.id) {
            self.cache.clear();
        }
        *session = Some(principal.clone());
        drop(session);

        self.transition(&SessionMachineInput::LoginSucceeded)
    }

    /// Fetch the principal's profile into the cache. Caller holds the
    /// write gate.
    async fn refresh_profile_locked(
        &self,
        principal: &Principal,
    ) -> AuthResult<Option<UserProfile>> {
        match self.profiles.fetch(&principal.id).await? {
            Some(profile) => {
                self.cache.set(profile.clone());
                Ok(Some(profile))
            }
            None => {
                self.cache.clear();
                Ok(None)
            }
        }
    }

    /// Write and cache a fresh profile for the principal. Caller holds
    /// the write gate and has already committed the session.
    async fn provision_profile_locked(
        &self,
        principal: &Principal,
        user_name: &str,
    ) -> AuthResult<UserProfile> {
        let profile = UserProfile::new(principal.email.clone(), user_name);
        if let Err(error) = self.profiles.create(&principal.id, &profile).await {
            warn!(%error, principal = %principal.id, "profile write failed after account creation");
            return Err(AuthError::ProfileProvisionFailed {
                principal: principal.id.clone(),
                detail: error.to_string(),
            });
        }

        self.cache.set(profile.clone());
        info!(principal = %principal.id, "profile provisioned");
        Ok(profile)
    }

    /// Consume a machine input and notify the callback if the state
    /// changed.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionState> {
        let mut machine = self.machine.lock().expect("lock poisoned");
        let old_state = SessionState::from(machine.state());

        machine.consume(input).map_err(|_| {
            AuthError::InvalidTransition(format!(
                "cannot apply {:?} in state {:?}",
                input,
                machine.state()
            ))
        })?;

        let new_state = SessionState::from(machine.state());
        drop(machine);

        if old_state != new_state {
            debug!(?old_state, ?new_state, "session state transition");
            self.notify_state_change(&new_state);
        }

        Ok(new_state)
    }

    /// Notify the callback of a state change.
    fn notify_state_change(&self, state: &SessionState) {
        let callback = self.state_callback.lock().expect("lock poisoned");
        if let Some(callback) = callback.as_ref() {
            let session = self.current_session();
            callback(SessionChangedPayload {
                state: state.clone(),
                principal_id: session.as_ref().map(|p| p.id.clone()),
                email: session.map(|p| p.email),
            });
        }
    }
}

/// Display name used when a credential sign-up supplies none: a short
/// handle derived from the principal id.
fn default_display_name(principal: &PrincipalId) -> String {
    let prefix: String = principal
        .as_str()
        .to_lowercase()
        .chars()
        .take(6)
        .collect();
    format!("user-{prefix}")
}
