use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue};

use crate::claims::VerifiedClaims;
use crate::error::RejectionError;
use crate::verifier::TokenVerifier;

/// Verified bearer token taken from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub claims: VerifiedClaims,
    pub token: String,
}

impl VerifiedIdentity {
    pub fn subject(&self) -> &str {
        &self.claims.subject
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.claims.in_group(group)
    }

    pub fn into_claims(self) -> VerifiedClaims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for VerifiedIdentity
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = RejectionError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<TokenVerifier>::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(RejectionError::MissingAuthorization)?;

        let token = parse_bearer(header_value)?;
        let claims = verifier.verify(&token)?;

        Ok(Self { claims, token })
    }
}

fn parse_bearer(value: &HeaderValue) -> Result<String, RejectionError> {
    let raw = value
        .to_str()
        .map_err(|_| RejectionError::InvalidAuthorization)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(RejectionError::InvalidAuthorization)?
        .trim();

    if token.is_empty() {
        return Err(RejectionError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}
