//! Profile store implementation over the hosted REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use session_engine::{AuthError, AuthResult, PrincipalId, ProfileStore, UserProfile};

use crate::config::SupabaseConfig;
use crate::http::{api_error, transport_error};
use crate::tokens::TokenCache;

const PROFILE_TABLE: &str = "profiles";

/// Wire shape of a row in the profiles table.
#[derive(Debug, Serialize, Deserialize)]
struct ProfileRecord {
    id: String,
    email: String,
    user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile_image_url: Option<String>,
}

impl ProfileRecord {
    fn from_profile(principal: &PrincipalId, profile: &UserProfile) -> Self {
        Self {
            id: principal.as_str().to_string(),
            email: profile.email.clone(),
            user_name: profile.user_name.clone(),
            profile_image_url: profile.profile_image_url.clone(),
        }
    }
}

impl From<ProfileRecord> for UserProfile {
    fn from(record: ProfileRecord) -> Self {
        Self {
            email: record.email,
            user_name: record.user_name,
            profile_image_url: record.profile_image_url,
        }
    }
}

/// Profile store backed by the hosted REST API, rows keyed by
/// principal id.
///
/// Shares the provider's [`TokenCache`] so table calls carry the active
/// session's bearer token.
pub struct SupabaseProfileStore {
    http_client: Client,
    config: SupabaseConfig,
    tokens: TokenCache,
}

impl SupabaseProfileStore {
    /// Creates a store after validating the configuration.
    pub fn new(config: SupabaseConfig, tokens: TokenCache) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self {
            http_client: Client::new(),
            config,
            tokens,
        })
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url(), table)
    }

    /// Bearer token of the active session.
    fn bearer(&self) -> AuthResult<String> {
        self.tokens.access_token().ok_or(AuthError::NotSignedIn)
    }
}

#[async_trait]
impl ProfileStore for SupabaseProfileStore {
    async fn create(&self, principal: &PrincipalId, profile: &UserProfile) -> AuthResult<()> {
        let access_token = self.bearer()?;
        let url = self.rest_url(PROFILE_TABLE);
        let record = ProfileRecord::from_profile(principal, profile);

        debug!(principal = %principal, "writing profile record");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.config.publishable_key)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(&record)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "failed to write profile record");
            return Err(api_error(status, &body));
        }

        info!(principal = %principal, "profile record written");
        Ok(())
    }

    async fn fetch(&self, principal: &PrincipalId) -> AuthResult<Option<UserProfile>> {
        let access_token = self.bearer()?;
        let url = format!(
            "{}?id=eq.{}&select=id,email,user_name,profile_image_url&limit=1",
            self.rest_url(PROFILE_TABLE),
            principal
        );

        debug!(principal = %principal, "fetching profile record");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.config.publishable_key)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "failed to fetch profile record");
            return Err(api_error(status, &body));
        }

        let records: Vec<ProfileRecord> = response.json().await.map_err(transport_error)?;
        Ok(records.into_iter().next().map(UserProfile::from))
    }
}
