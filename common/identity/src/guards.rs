use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::extractors::VerifiedIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    Forbidden { required: Vec<String> },
}

impl GuardError {
    pub fn into_status(self) -> (StatusCode, String) {
        match self {
            GuardError::Forbidden { required } => (
                StatusCode::FORBIDDEN,
                if required.is_empty() {
                    "Insufficient group membership".to_string()
                } else {
                    format!(
                        "Insufficient group membership. Required one of: {}",
                        required.join(", ")
                    )
                },
            ),
        }
    }
}

impl From<GuardError> for (StatusCode, String) {
    fn from(value: GuardError) -> Self {
        value.into_status()
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        self.into_status().into_response()
    }
}

/// Require membership in at least one of `allowed` (`cognito:groups`).
/// An empty list admits every verified identity.
pub fn ensure_group(identity: &VerifiedIdentity, allowed: &[&str]) -> Result<(), GuardError> {
    if allowed.is_empty() {
        return Ok(());
    }

    if allowed.iter().any(|group| identity.in_group(group)) {
        Ok(())
    } else {
        Err(GuardError::Forbidden {
            required: allowed.iter().map(|value| value.to_string()).collect(),
        })
    }
}
