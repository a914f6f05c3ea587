use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Failures surfaced by client operations (key set, token exchange, admin calls).
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("failed to parse provider response: {0}")]
    Parse(String),
    /// Message returned by the identity provider, passed through untouched.
    #[error("{0}")]
    Provider(String),
    #[error("no signing key registered for kid '{0}'")]
    KeyNotFound(String),
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("authentication challenge required: {0}")]
    ChallengeRequired(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Verification(#[from] VerifyError),
}

impl IdentityError {
    /// Provider message when the remote service rejected the request.
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            IdentityError::Provider(message) => Some(message),
            _ => None,
        }
    }
}

/// Token verification failures. Gates run in a fixed order and the first
/// failing gate determines the variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("key resolution failed: {0}")]
    KeyResolutionFailed(String),
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),
    #[error("token expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("token not valid before {0}")]
    NotYetValid(DateTime<Utc>),
    #[error("token audience does not match client id")]
    AudienceMismatch,
    #[error("token issuer '{0}' is not trusted")]
    IssuerMismatch(String),
}

impl VerifyError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::Malformed(_) => "malformed",
            VerifyError::KeyResolutionFailed(_) => "key_resolution_failed",
            VerifyError::SignatureInvalid(_) => "signature_invalid",
            VerifyError::Expired(_) => "expired",
            VerifyError::NotYetValid(_) => "not_yet_valid",
            VerifyError::AudienceMismatch => "audience_mismatch",
            VerifyError::IssuerMismatch(_) => "issuer_mismatch",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        let code = match &self {
            VerifyError::Malformed(_) => "AUTH_TOKEN",
            VerifyError::KeyResolutionFailed(_) => "AUTH_KEY",
            VerifyError::SignatureInvalid(_) => "AUTH_SIGNATURE",
            VerifyError::Expired(_) | VerifyError::NotYetValid(_) => "AUTH_EXPIRED",
            VerifyError::AudienceMismatch | VerifyError::IssuerMismatch(_) => "AUTH_CLAIMS",
        };

        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            IdentityError::Verification(err) => return err.clone().into_response(),
            IdentityError::Network(_) | IdentityError::Parse(_) => {
                (StatusCode::BAD_GATEWAY, "IDP_UNAVAILABLE")
            }
            IdentityError::Provider(_) | IdentityError::ChallengeRequired(_) => {
                (StatusCode::BAD_GATEWAY, "IDP_REJECTED")
            }
            IdentityError::KeyNotFound(_) => (StatusCode::UNAUTHORIZED, "AUTH_KEY"),
            IdentityError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IDP_CONFIG"),
            IdentityError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
        };

        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Why a request carrying no usable identity was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error(transparent)]
    Verification(#[from] VerifyError),
}

impl IntoResponse for RejectionError {
    fn into_response(self) -> Response {
        match self {
            RejectionError::Verification(err) => err.into_response(),
            other => {
                let body = ErrorBody {
                    code: "AUTH_HEADER",
                    message: other.to_string(),
                };
                (StatusCode::UNAUTHORIZED, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_message_verbatim() {
        let err = IdentityError::Provider("User does not exist.".to_string());
        assert_eq!(err.to_string(), "User does not exist.");
        assert_eq!(err.provider_message(), Some("User does not exist."));
    }

    #[test]
    fn verification_errors_map_to_unauthorized() {
        let response = IdentityError::from(VerifyError::AudienceMismatch).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn network_errors_map_to_bad_gateway() {
        let response = IdentityError::Network("timed out".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn missing_header_maps_to_unauthorized() {
        let response = RejectionError::MissingAuthorization.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
