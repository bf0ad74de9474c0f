//! Shared HTTP error classification for the hosted API clients.

use reqwest::StatusCode;
use session_engine::AuthError;

/// Classifies a transport-level failure: connectivity and timeouts are
/// the retryable `Network` kind, anything else is `Unknown`.
pub(crate) fn transport_error(error: reqwest::Error) -> AuthError {
    if error.is_connect() || error.is_timeout() {
        AuthError::Network(error.to_string())
    } else {
        AuthError::Unknown(error.to_string())
    }
}

/// Classifies a non-success response where no operation-specific kind
/// applies: 5xx is the service misbehaving (`Network`), the rest is
/// `Unknown`.
pub(crate) fn api_error(status: StatusCode, body: &str) -> AuthError {
    if status.is_server_error() {
        AuthError::Network(format!("HTTP {status}: {body}"))
    } else {
        AuthError::Unknown(format!("HTTP {status}: {body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_network() {
        let error = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(error.code(), "network");
    }

    #[test]
    fn client_errors_are_unknown() {
        let error = api_error(StatusCode::CONFLICT, "duplicate");
        assert_eq!(error.code(), "unknown");
        assert!(error.to_string().contains("409"));
    }
}
