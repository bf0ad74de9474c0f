//! Identity provider implementation over the hosted auth API.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use session_engine::{AuthError, AuthResult, ExternalCredential, IdentityProvider, Principal};

use crate::config::SupabaseConfig;
use crate::http::{api_error, transport_error};
use crate::tokens::{StoredSession, TokenCache};

/// Grant response returned by the token and signup endpoints.
#[derive(Debug, Deserialize)]
struct TokenGrantResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: GrantUser,
}

#[derive(Debug, Deserialize)]
struct GrantUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Signup response. The session fields are absent when the project
/// requires email confirmation before the first sign-in.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<GrantUser>,
}

/// Identity provider backed by the hosted auth API.
///
/// Holds the service's active session in a [`TokenCache`]; the service
/// enforces a single active session per client context, and the cache
/// mirrors exactly that.
pub struct SupabaseIdentityProvider {
    http_client: Client,
    config: SupabaseConfig,
    tokens: TokenCache,
}

impl SupabaseIdentityProvider {
    /// Creates a provider after validating the configuration.
    pub fn new(config: SupabaseConfig) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self {
            http_client: Client::new(),
            config,
            tokens: TokenCache::new(),
        })
    }

    /// Token cache handle, shared with the profile store.
    pub fn tokens(&self) -> TokenCache {
        self.tokens.clone()
    }

    /// Build an auth endpoint URL.
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.base_url(), path)
    }

    /// One token-grant request; a failed grant maps to
    /// `InvalidCredentials` (rejection) or `Network` (service failure).
    async fn request_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> AuthResult<TokenGrantResponse> {
        let url = self.auth_url(&format!("token?grant_type={grant_type}"));
        debug!(url = %url, grant_type, "requesting token grant");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.config.publishable_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "token grant rejected");
            return Err(grant_error(status, &body));
        }

        response.json().await.map_err(transport_error)
    }

    /// Record a confirmed grant and return its principal.
    fn install_grant(&self, grant: TokenGrantResponse) -> Principal {
        let expires_at = Utc::now() + Duration::seconds(grant.expires_in);
        let principal = Principal::new(grant.user.id, grant.user.email.unwrap_or_default());
        self.tokens.store(StoredSession {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            principal: principal.clone(),
            expires_at,
        });
        principal
    }
}

/// Grant rejections that mean the credentials were not accepted.
fn grant_error(status: StatusCode, body: &str) -> AuthError {
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::UNPROCESSABLE_ENTITY => {
            AuthError::InvalidCredentials(format!("HTTP {status}: {body}"))
        }
        _ => api_error(status, body),
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Principal> {
        let grant = self
            .request_grant(
                "password",
                serde_json::json!({
                    "email": email,
                    "password": password,
                }),
            )
            .await?;

        let principal = self.install_grant(grant);
        info!(principal = %principal.id, "password grant succeeded");
        Ok(principal)
    }

    async fn sign_in_with_credential(
        &self,
        credential: &ExternalCredential,
    ) -> AuthResult<Principal> {
        let mut body = serde_json::json!({
            "provider": credential.kind.as_str(),
            "id_token": credential.id_token,
        });
        if let Some(access_token) = &credential.access_token {
            body["access_token"] = serde_json::json!(access_token);
        }

        let grant = self.request_grant("id_token", body).await?;
        let principal = self.install_grant(grant);
        info!(principal = %principal.id, provider = %credential.kind, "id-token grant succeeded");
        Ok(principal)
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Principal> {
        let url = self.auth_url("signup");
        debug!(url = %url, email, "creating account");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.config.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "sign-up rejected");
            if status.is_server_error() {
                return Err(AuthError::Network(format!("HTTP {status}: {body}")));
            }
            return Err(AuthError::AccountCreationFailed(format!(
                "HTTP {status}: {body}"
            )));
        }

        let data: SignUpResponse = response.json().await.map_err(transport_error)?;
        match (
            data.access_token,
            data.refresh_token,
            data.expires_in,
            data.user,
        ) {
            (Some(access_token), Some(refresh_token), Some(expires_in), Some(user)) => {
                let principal = self.install_grant(TokenGrantResponse {
                    access_token,
                    refresh_token,
                    expires_in,
                    user,
                });
                info!(principal = %principal.id, "account created and session established");
                Ok(principal)
            }
            _ => Err(AuthError::AccountCreationFailed(
                "account requires email confirmation before sign-in".to_string(),
            )),
        }
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let Some(session) = self.tokens.current() else {
            debug!("sign-out with no provider-side session");
            return Ok(());
        };

        let url = self.auth_url("logout");
        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.config.publishable_key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await
            .map_err(|error| AuthError::SignOutFailed(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "sign-out rejected");
            return Err(AuthError::SignOutFailed(format!("HTTP {status}: {body}")));
        }

        // Only a confirmed logout drops the tokens.
        self.tokens.clear();
        info!("provider session closed");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> AuthResult<()> {
        let url = self.auth_url("recover");
        debug!(url = %url, email, "requesting password recovery");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.config.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "password recovery rejected");
            return Err(api_error(status, &body));
        }

        info!(email, "password recovery message sent");
        Ok(())
    }

    async fn current_principal(&self) -> Option<Principal> {
        self.tokens
            .current()
            .filter(|session| !session.is_expired())
            .map(|session| session.principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SupabaseIdentityProvider {
        SupabaseIdentityProvider::new(SupabaseConfig {
            url: "https://test.supabase.co".to_string(),
            publishable_key: "test-key".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn auth_url_building() {
        let provider = provider();
        assert_eq!(
            provider.auth_url("token?grant_type=password"),
            "https://test.supabase.co/auth/v1/token?grant_type=password"
        );
        assert_eq!(
            provider.auth_url("logout"),
            "https://test.supabase.co/auth/v1/logout"
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = SupabaseIdentityProvider::new(SupabaseConfig {
            url: "not a url".to_string(),
            publishable_key: "k".to_string(),
        });
        assert_eq!(result.err().unwrap().code(), "config");
    }

    #[test]
    fn grant_rejections_map_to_invalid_credentials() {
        assert_eq!(
            grant_error(StatusCode::BAD_REQUEST, "invalid grant").code(),
            "invalid_credentials"
        );
        assert_eq!(
            grant_error(StatusCode::UNPROCESSABLE_ENTITY, "bad token").code(),
            "invalid_credentials"
        );
        assert_eq!(
            grant_error(StatusCode::SERVICE_UNAVAILABLE, "down").code(),
            "network"
        );
    }

    #[test]
    fn grant_response_parses() {
        let grant: TokenGrantResponse = serde_json::from_str(
            r#"{
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3600,
                "user": { "id": "u-1", "email": "a@x.com" }
            }"#,
        )
        .unwrap();
        assert_eq!(grant.expires_in, 3600);
        assert_eq!(grant.user.id, "u-1");
        assert_eq!(grant.user.email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn sign_up_response_without_session_parses() {
        let data: SignUpResponse = serde_json::from_str(
            r#"{ "user": { "id": "u-1" } }"#,
        )
        .unwrap();
        assert!(data.access_token.is_none());
        assert_eq!(data.user.unwrap().id, "u-1");
    }

    #[test]
    fn install_grant_records_the_session() {
        let provider = provider();
        let principal = provider.install_grant(TokenGrantResponse {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_in: 3600,
            user: GrantUser {
                id: "u-1".to_string(),
                email: Some("a@x.com".to_string()),
            },
        });

        assert_eq!(principal.id.as_str(), "u-1");
        let stored = provider.tokens().current().unwrap();
        assert_eq!(stored.access_token, "at");
        assert!(!stored.is_expired());
    }

    #[tokio::test]
    async fn current_principal_answers_from_unexpired_tokens() {
        let provider = provider();
        assert!(provider.current_principal().await.is_none());

        provider.install_grant(TokenGrantResponse {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_in: 3600,
            user: GrantUser {
                id: "u-1".to_string(),
                email: Some("a@x.com".to_string()),
            },
        });
        assert_eq!(
            provider.current_principal().await.unwrap().id.as_str(),
            "u-1"
        );

        // An expired grant no longer counts as an active session.
        provider.install_grant(TokenGrantResponse {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_in: -1,
            user: GrantUser {
                id: "u-1".to_string(),
                email: None,
            },
        });
        assert!(provider.current_principal().await.is_none());
    }
}
