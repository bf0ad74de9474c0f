//! Session state machine using rust-fsm.
//!
//! The machine makes every legal session transition explicit instead of
//! deriving state from whether a principal happens to be set.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │    SignedOut    │ (initial)
//! └────────┬────────┘
//!          │ LoginAttempt            SessionRestored
//!          ▼                                │
//! ┌─────────────────┐                       │
//! │    SigningIn    │                       │
//! └────────┬────────┘                       │
//!          │ LoginSucceeded                 │
//!          │ (LoginFailed ──► SignedOut)    │
//!          ▼                                ▼
//! ┌──────────────────────────────────────────────┐
//! │                   SignedIn                   │
//! └───────┬──────────────────────────────┬───────┘
//!         │ LoginAttempt                 │ SignOutRequested
//!         ▼                              ▼
//! ┌─────────────────┐           ┌─────────────────┐
//! │ Reauthenticating│           │   SigningOut    │
//! └───────┬─────────┘           └────────┬────────┘
//!         │ LoginSucceeded/LoginFailed   │ SignOutSucceeded ──► SignedOut
//!         ▼                              │ SignOutFailed ─────► SignedIn
//!      SignedIn
//! ```
//!
//! `Reauthenticating` exists so a login attempted while already signed
//! in can fail without tearing down the existing session: both outcomes
//! of that attempt land back in `SignedIn` (on success the manager
//! swaps the principal, last write wins).

use rust_fsm::*;
use serde::{Deserialize, Serialize};

use crate::types::PrincipalId;

// Generates a module `session_machine` with State/Input enums and the
// StateMachine type alias.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(SignedOut)

    SignedOut => {
        LoginAttempt => SigningIn,
        SessionRestored => SignedIn
    },
    SigningIn => {
        LoginSucceeded => SignedIn,
        LoginFailed => SignedOut
    },
    SignedIn => {
        LoginAttempt => Reauthenticating,
        SignOutRequested => SigningOut
    },
    Reauthenticating => {
        LoginSucceeded => SignedIn,
        LoginFailed => SignedIn
    },
    SigningOut => {
        SignOutSucceeded => SignedOut,
        SignOutFailed => SignedIn
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state for external consumption.
///
/// `SignedOut` and `SignedIn` are the durable states; the rest are
/// in-progress phases of a single serialized operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No authenticated principal.
    SignedOut,
    /// A login/create attempt is in flight from a signed-out state.
    SigningIn,
    /// A login attempt is in flight while a prior session is still held.
    Reauthenticating,
    /// A principal is authenticated.
    SignedIn,
    /// A sign-out is in flight.
    SigningOut,
}

impl SessionState {
    /// Returns true if a principal is currently authenticated
    /// (`SignedIn` only).
    pub fn is_signed_in(&self) -> bool {
        matches!(self, SessionState::SignedIn)
    }

    /// Returns true if the state is an in-progress phase rather than a
    /// durable state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionState::SigningIn | SessionState::Reauthenticating | SessionState::SigningOut
        )
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::SignedOut => SessionState::SignedOut,
            SessionMachineState::SigningIn => SessionState::SigningIn,
            SessionMachineState::Reauthenticating => SessionState::Reauthenticating,
            SessionMachineState::SignedIn => SessionState::SignedIn,
            SessionMachineState::SigningOut => SessionState::SigningOut,
        }
    }
}

/// Payload for session state change notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChangedPayload {
    /// Current session state.
    pub state: SessionState,
    /// Principal id if a session is committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<PrincipalId>,
    /// Principal email if a session is committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
