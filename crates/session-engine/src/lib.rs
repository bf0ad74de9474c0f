//! Session and authentication engine for the Plateful client.
//!
//! This crate owns a single authenticated identity for the process and
//! provides:
//! - Explicit FSM-based session state management
//! - Credential dispatch across password and external-provider sign-in
//! - Profile provisioning on first sign-up, with a retryable partial
//!   state when the profile write fails after the account exists
//! - Collaborator traits for the identity provider and the profile
//!   store, so the engine itself performs no network or storage I/O
//!
//! ## Principles
//!
//! - **The session is mutated only on confirmed success** - a failed
//!   operation leaves whatever session existed before it untouched
//! - **Mutations are serialized** - one write gate, held across the
//!   provider call
//! - **Reads see committed state** - never a half-updated session
//! - **No automatic retries** - every failure is returned typed; retry
//!   is the caller's decision

mod error;
mod profile_cache;
mod provider;
mod session;
mod session_fsm;
mod types;

#[cfg(test)]
mod tests;

pub use error::{AuthError, AuthResult};
pub use profile_cache::ProfileCache;
pub use provider::{IdentityProvider, ProfileStore};
pub use session::{SessionCallback, SessionManager, SessionSnapshot};
pub use session_fsm::session_machine;
pub use session_fsm::{
    SessionChangedPayload, SessionMachine, SessionMachineInput, SessionMachineState, SessionState,
};
pub use types::{
    Credential, ExternalCredential, Principal, PrincipalId, ProviderKind, UserProfile,
};
