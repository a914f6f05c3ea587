use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::crypto;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::claims::{UnverifiedClaims, VerifiedClaims};
use crate::config::{ClientConfig, SigningAlgorithm};
use crate::error::VerifyError;
use crate::key_set::KeySetCache;

/// Runtime configuration for token verification.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Expected audience (the app client id).
    pub audience: String,
    /// Expected issuer; `None` skips the issuer check.
    pub issuer: Option<String>,
    /// Allowable clock skew in seconds when validating exp/nbf/iat.
    pub leeway_seconds: u32,
    pub allowed_algorithms: Vec<SigningAlgorithm>,
}

impl VerifierConfig {
    /// RS256 only, no issuer check, zero leeway.
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            issuer: None,
            leeway_seconds: 0,
            allowed_algorithms: vec![SigningAlgorithm::RS256],
        }
    }

    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            audience: config.client_id.clone(),
            issuer: Some(config.issuer()),
            leeway_seconds: config.leeway_seconds,
            allowed_algorithms: config.allowed_algorithms.clone(),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn with_allowed_algorithms(mut self, algorithms: Vec<SigningAlgorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }
}

/// Verifies provider-issued tokens against the cached signing keys.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    config: VerifierConfig,
    keys: Arc<KeySetCache>,
}

impl TokenVerifier {
    pub fn new(config: VerifierConfig, keys: Arc<KeySetCache>) -> Self {
        Self { config, keys }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn keys(&self) -> &Arc<KeySetCache> {
        &self.keys
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, VerifyError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify as of `now`. Gates run in order and the first failure wins:
    /// parse, algorithm allow-list, key resolution, signature, claims.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedClaims, VerifyError> {
        let parsed = ParsedToken::parse(token)?;
        let algorithm = self.check_algorithm(&parsed.header.alg)?;

        let kid = parsed
            .header
            .kid
            .as_deref()
            .ok_or_else(|| VerifyError::KeyResolutionFailed("token header has no kid".into()))?;
        let key = self
            .keys
            .lookup(kid)
            .map_err(|err| VerifyError::KeyResolutionFailed(err.to_string()))?;

        if let Some(pinned) = key.algorithm() {
            if pinned != algorithm {
                return Err(VerifyError::SignatureInvalid(format!(
                    "key '{kid}' is pinned to {pinned}, token declares {algorithm}"
                )));
            }
        }

        let valid = crypto::verify(
            parsed.signature,
            parsed.signing_input.as_bytes(),
            key.decoding_key(),
            algorithm.as_jwt(),
        )
        .map_err(|err| VerifyError::SignatureInvalid(err.to_string()))?;
        if !valid {
            return Err(VerifyError::SignatureInvalid(
                "signature does not match token contents".into(),
            ));
        }

        self.validate_claims(&parsed.claims, now)?;

        debug!(kid, sub = %parsed.claims.subject, "verified token");
        Ok(parsed.claims.into_verified())
    }

    fn check_algorithm(&self, declared: &str) -> Result<SigningAlgorithm, VerifyError> {
        SigningAlgorithm::from_name(declared)
            .filter(|algorithm| self.config.allowed_algorithms.contains(algorithm))
            .ok_or_else(|| {
                VerifyError::SignatureInvalid(format!("algorithm '{declared}' is not allowed"))
            })
    }

    fn validate_claims(&self, claims: &UnverifiedClaims, now: DateTime<Utc>) -> Result<(), VerifyError> {
        let leeway = Duration::seconds(i64::from(self.config.leeway_seconds));

        // Saturate at the end of representable time instead of overflowing.
        let deadline = claims
            .expires_at
            .checked_add_signed(leeway)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if now >= deadline {
            return Err(VerifyError::Expired(claims.expires_at));
        }

        let horizon = now
            .checked_add_signed(leeway)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        if let Some(not_before) = claims.not_before {
            if not_before > horizon {
                return Err(VerifyError::NotYetValid(not_before));
            }
        }

        if let Some(issued_at) = claims.issued_at {
            if issued_at > horizon {
                return Err(VerifyError::NotYetValid(issued_at));
            }
        }

        if !claims
            .effective_audience()
            .contains(&self.config.audience.as_str())
        {
            return Err(VerifyError::AudienceMismatch);
        }

        if let Some(expected) = &self.config.issuer {
            if claims.issuer.as_deref() != Some(expected.as_str()) {
                return Err(VerifyError::IssuerMismatch(
                    claims.issuer.clone().unwrap_or_else(|| "<missing>".into()),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Structurally decoded token; nothing in here is trusted yet.
struct ParsedToken<'a> {
    header: RawHeader,
    claims: UnverifiedClaims,
    signing_input: &'a str,
    signature: &'a str,
}

impl<'a> ParsedToken<'a> {
    fn parse(token: &'a str) -> Result<Self, VerifyError> {
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| VerifyError::Malformed("expected three segments".into()))?;
        let (header_segment, payload_segment) = signing_input
            .split_once('.')
            .ok_or_else(|| VerifyError::Malformed("expected three segments".into()))?;

        if header_segment.is_empty() || payload_segment.is_empty() || payload_segment.contains('.') {
            return Err(VerifyError::Malformed("expected three segments".into()));
        }

        let header: RawHeader = serde_json::from_slice(&decode_segment("header", header_segment)?)
            .map_err(|err| VerifyError::Malformed(format!("invalid header: {err}")))?;
        let payload: Value = serde_json::from_slice(&decode_segment("payload", payload_segment)?)
            .map_err(|err| VerifyError::Malformed(format!("invalid payload: {err}")))?;
        decode_segment("signature", signature)?;

        Ok(Self {
            header,
            claims: UnverifiedClaims::try_from(payload)?,
            signing_input,
            signature,
        })
    }
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>, VerifyError> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|err| VerifyError::Malformed(format!("{name} is not base64url: {err}")))
}
