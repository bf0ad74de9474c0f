//! Core types for the session engine.

use serde::{Deserialize, Serialize};

/// Unique identifier for an authenticated principal, issued by the
/// identity provider (UUID-shaped string).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    /// Creates a principal ID from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the principal ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An authenticated identity as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Provider-issued unique identifier.
    pub id: PrincipalId,
    /// Email address associated with the principal.
    pub email: String,
}

impl Principal {
    /// Creates a principal from its provider-issued id and email.
    pub fn new(id: impl Into<PrincipalId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// External identity provider a credential was issued by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Apple,
}

impl ProviderKind {
    /// Wire name of the provider (matches the hosted auth API's
    /// `provider` parameter).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Apple => "apple",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An externally-issued credential (Google or Apple sign-in tokens).
#[derive(Clone, Debug)]
pub struct ExternalCredential {
    /// Issuing provider.
    pub kind: ProviderKind,
    /// Identity token issued by the provider.
    pub id_token: String,
    /// Access token, where the provider issues one alongside the
    /// identity token (Google does, Apple does not).
    pub access_token: Option<String>,
}

impl ExternalCredential {
    /// Credential from a Google sign-in token pair.
    pub fn google(id_token: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Google,
            id_token: id_token.into(),
            access_token: Some(access_token.into()),
        }
    }

    /// Credential from an Apple identity token.
    pub fn apple(id_token: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Apple,
            id_token: id_token.into(),
            access_token: None,
        }
    }
}

/// Caller-supplied material used to authenticate, consumed once per
/// login attempt.
#[derive(Clone, Debug)]
pub enum Credential {
    /// Email/password pair.
    Password { email: String, password: String },
    /// Externally-issued token credential.
    External(ExternalCredential),
}

/// Application-level user record, distinct from the provider's
/// principal record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Email address, 1:1 with the owning principal.
    pub email: String,
    /// Display name, never empty.
    pub user_name: String,
    /// Avatar URL, if the user has set one.
    pub profile_image_url: Option<String>,
}

impl UserProfile {
    /// Creates a profile with no avatar.
    pub fn new(email: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            user_name: user_name.into(),
            profile_image_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_id_display_and_conversions() {
        let id = PrincipalId::from("user-123");
        assert_eq!(id.as_str(), "user-123");
        assert_eq!(id.to_string(), "user-123");
        assert_eq!(PrincipalId::from_string("user-123"), id);
    }

    #[test]
    fn provider_kind_wire_names() {
        assert_eq!(ProviderKind::Google.as_str(), "google");
        assert_eq!(ProviderKind::Apple.as_str(), "apple");
    }

    #[test]
    fn google_credential_carries_both_tokens() {
        let credential = ExternalCredential::google("id-tok", "access-tok");
        assert_eq!(credential.kind, ProviderKind::Google);
        assert_eq!(credential.id_token, "id-tok");
        assert_eq!(credential.access_token.as_deref(), Some("access-tok"));
    }

    #[test]
    fn apple_credential_has_no_access_token() {
        let credential = ExternalCredential::apple("identity-tok");
        assert_eq!(credential.kind, ProviderKind::Apple);
        assert!(credential.access_token.is_none());
    }

    #[test]
    fn profile_starts_without_avatar() {
        let profile = UserProfile::new("a@x.com", "Ann");
        assert_eq!(profile.email, "a@x.com");
        assert_eq!(profile.user_name, "Ann");
        assert!(profile.profile_image_url.is_none());
    }
}
