//! Configuration for the hosted identity service.

use serde::{Deserialize, Serialize};
use session_engine::{AuthError, AuthResult};
use url::Url;

/// Default project URL (can be overridden at compile time via the
/// PLATEFUL_SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("PLATEFUL_SUPABASE_URL") {
    Some(url) => url,
    None => "https://plateful.supabase.co",
};

/// Default publishable API key (public, safe to expose; can be
/// overridden at compile time via PLATEFUL_SUPABASE_PUBLISHABLE_KEY).
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: &str =
    match option_env!("PLATEFUL_SUPABASE_PUBLISHABLE_KEY") {
        Some(key) => key,
        None => "public-anon-key",
    };

/// Identity service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Publishable API key sent as the `apikey` header.
    #[serde(default = "default_publishable_key")]
    pub publishable_key: String,
}

fn default_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_publishable_key() -> String {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string()
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            publishable_key: default_publishable_key(),
        }
    }
}

impl SupabaseConfig {
    /// Config with built-in defaults, then overridden from the
    /// environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(url) = std::env::var("PLATEFUL_SUPABASE_URL") {
            if !url.trim().is_empty() {
                self.url = url;
            }
        }
        if let Ok(key) = std::env::var("PLATEFUL_SUPABASE_PUBLISHABLE_KEY") {
            if !key.trim().is_empty() {
                self.publishable_key = key;
            }
        }
    }

    /// Project URL without a trailing slash, for endpoint building.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Checks the config is usable before any request is made.
    pub fn validate(&self) -> AuthResult<()> {
        Url::parse(&self.url)
            .map_err(|error| AuthError::Config(format!("invalid project url: {error}")))?;
        if self.publishable_key.trim().is_empty() {
            return Err(AuthError::Config("publishable key is empty".to_string()));
        }
        Ok(())
    }
}
