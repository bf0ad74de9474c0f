//! Collaborator contracts the session engine consumes.
//!
//! The engine never talks to a remote authority or a datastore itself;
//! it drives these traits and owns only the local session state.

use crate::error::AuthResult;
use crate::types::{ExternalCredential, Principal, PrincipalId, UserProfile};
use async_trait::async_trait;

/// Remote identity authority performing the actual sign-in, sign-up,
/// sign-out, and password-reset calls.
///
/// Implementations enforce a single active session per client context;
/// a successful sign-in replaces whatever session the provider held
/// before.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate with an email/password pair.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Principal>;

    /// Authenticate with an externally-issued credential.
    ///
    /// One call is one attempt; implementations must not retry
    /// internally.
    async fn sign_in_with_credential(
        &self,
        credential: &ExternalCredential,
    ) -> AuthResult<Principal>;

    /// Create a new account and authenticate as it.
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Principal>;

    /// End the provider-side session.
    async fn sign_out(&self) -> AuthResult<()>;

    /// Send a password-reset message for the given address.
    async fn send_password_reset(&self, email: &str) -> AuthResult<()>;

    /// The principal the provider already considers signed in, if any
    /// (e.g. a session persisted across process restarts).
    async fn current_principal(&self) -> Option<Principal>;
}

/// Datastore holding application-level user profiles keyed by
/// principal id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Persist a newly provisioned profile.
    async fn create(&self, principal: &PrincipalId, profile: &UserProfile) -> AuthResult<()>;

    /// Fetch the profile for a principal.
    ///
    /// Returns `Ok(None)` when no profile has been provisioned yet.
    async fn fetch(&self, principal: &PrincipalId) -> AuthResult<Option<UserProfile>>;
}
