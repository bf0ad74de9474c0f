//! Hosted identity and profile-store collaborators for the session
//! engine.
//!
//! This crate implements the engine's `IdentityProvider` and
//! `ProfileStore` traits against a Supabase-style hosted service:
//! - Password and external-credential (Google/Apple id-token) grants
//! - Sign-up, logout, and password-recovery endpoints
//! - A `profiles` REST table for application user records
//!
//! Tokens issued by the service live in a shared [`TokenCache`], the
//! provider-side "single active session per client context". The cache
//! is written only after the service confirmed a grant and cleared only
//! after it confirmed a logout, so local token state never disagrees
//! with the service.

mod config;
mod http;
mod profiles;
mod provider;
mod tokens;

pub use config::{SupabaseConfig, DEFAULT_SUPABASE_PUBLISHABLE_KEY, DEFAULT_SUPABASE_URL};
pub use profiles::SupabaseProfileStore;
pub use provider::SupabaseIdentityProvider;
pub use tokens::{StoredSession, TokenCache};
