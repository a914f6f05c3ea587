use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VerifyError;

/// Claims of a token that passed every verification gate. Only the verifier
/// can construct this.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct VerifiedClaims {
    pub subject: String,
    pub audience: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    /// `id` or `access` for Cognito-issued tokens.
    pub token_use: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub groups: Vec<String>,
    /// Complete claim set as received.
    pub raw: Value,
}

impl VerifiedClaims {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|value| value == group)
    }

    /// Look up any claim by name.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }
}

/// Payload decoded from a token whose signature has not been checked yet.
#[derive(Debug, Clone)]
pub(crate) struct UnverifiedClaims {
    pub subject: String,
    pub audience: Vec<String>,
    pub client_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    pub token_use: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub groups: Vec<String>,
    pub raw: Value,
}

impl UnverifiedClaims {
    /// Audience the token is addressed to. Cognito access tokens carry the
    /// app client in `client_id` instead of `aud`.
    pub fn effective_audience(&self) -> Vec<&str> {
        if self.audience.is_empty() && self.token_use.as_deref() == Some("access") {
            return self.client_id.as_deref().into_iter().collect();
        }
        self.audience.iter().map(String::as_str).collect()
    }

    pub fn into_verified(self) -> VerifiedClaims {
        VerifiedClaims {
            subject: self.subject,
            audience: self.audience,
            expires_at: self.expires_at,
            issued_at: self.issued_at,
            not_before: self.not_before,
            issuer: self.issuer,
            token_use: self.token_use,
            username: self.username,
            email: self.email,
            groups: self.groups,
            raw: self.raw,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    nbf: Option<i64>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<AudienceRepr>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    token_use: Option<String>,
    #[serde(default, rename = "cognito:username")]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "cognito:groups")]
    groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AudienceRepr {
    Single(String),
    Many(Vec<String>),
}

impl TryFrom<Value> for UnverifiedClaims {
    type Error = VerifyError;

    fn try_from(value: Value) -> Result<Self, VerifyError> {
        if !value.is_object() {
            return Err(VerifyError::Malformed("payload is not a JSON object".into()));
        }
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| VerifyError::Malformed(format!("invalid claims: {err}")))?;

        let audience = match repr.aud {
            Some(AudienceRepr::Single(item)) => vec![item],
            Some(AudienceRepr::Many(items)) => items,
            None => Vec::new(),
        };

        Ok(Self {
            subject: repr.sub,
            audience,
            client_id: repr.client_id,
            expires_at: timestamp("exp", repr.exp)?,
            issued_at: repr.iat.map(|iat| timestamp("iat", iat)).transpose()?,
            not_before: repr.nbf.map(|nbf| timestamp("nbf", nbf)).transpose()?,
            issuer: repr.iss,
            token_use: repr.token_use,
            username: repr.username,
            email: repr.email,
            groups: repr.groups,
            raw: value,
        })
    }
}

fn timestamp(claim: &'static str, seconds: i64) -> Result<DateTime<Utc>, VerifyError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| VerifyError::Malformed(format!("claim '{claim}' out of range: {seconds}")))
}
