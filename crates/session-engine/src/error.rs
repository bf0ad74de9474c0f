//! Authentication error taxonomy.

use crate::types::PrincipalId;
use thiserror::Error;

/// Authentication error type.
///
/// Every provider/store failure surfaces as one of these kinds; nothing
/// is swallowed. `ProfileProvisionFailed` is the one partial-success
/// state: the account exists and the session is committed, but the
/// profile write failed and can be retried without re-creating the
/// account.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Provider rejected the supplied credentials
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Provider refused to create the account
    #[error("account creation failed: {0}")]
    AccountCreationFailed(String),

    /// Account exists and session is committed, but the profile write failed
    #[error("profile provisioning failed for {principal}: {detail}")]
    ProfileProvisionFailed {
        principal: PrincipalId,
        detail: String,
    },

    /// Provider-side sign-out failed; local session left untouched
    #[error("sign-out failed: {0}")]
    SignOutFailed(String),

    /// Transport-level failure (connectivity, timeout, 5xx)
    #[error("network error: {0}")]
    Network(String),

    /// Operation requires an active session
    #[error("not signed in")]
    NotSignedIn,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Illegal session state machine input
    #[error("invalid session state transition: {0}")]
    InvalidTransition(String),

    /// Anything the provider reported that fits no other kind
    #[error("authentication failed: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Stable machine-readable error code for status surfaces and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials(_) => "invalid_credentials",
            Self::AccountCreationFailed(_) => "account_creation_failed",
            Self::ProfileProvisionFailed { .. } => "profile_provision_failed",
            Self::SignOutFailed(_) => "sign_out_failed",
            Self::Network(_) => "network",
            Self::NotSignedIn => "not_signed_in",
            Self::Config(_) => "config",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Returns true if this error is transient and the caller may retry.
    ///
    /// The core never retries on its own; this only classifies.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
