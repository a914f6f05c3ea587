use std::time::Duration;

use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::SigningAlgorithm;
use crate::error::{IdentityError, IdentityResult};
use crate::key_set::{SigningKey, SigningKeySet};

/// Fetches the published key set over HTTP.
#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
    allowed: Vec<SigningAlgorithm>,
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> IdentityResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| IdentityError::Config(err.to_string()))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            allowed: vec![SigningAlgorithm::RS256],
        }
    }

    /// Restrict which JWK `alg` values are accepted into the set.
    pub fn with_allowed_algorithms(mut self, allowed: Vec<SigningAlgorithm>) -> Self {
        self.allowed = allowed;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> IdentityResult<SigningKeySet> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| IdentityError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Network(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| IdentityError::Network(err.to_string()))?;

        parse_key_set(&body, &self.allowed)
    }
}

/// Parse a JWKS document, keeping only RSA signing keys usable with `allowed`.
pub fn parse_key_set(body: &[u8], allowed: &[SigningAlgorithm]) -> IdentityResult<SigningKeySet> {
    let document: JwksDocument =
        serde_json::from_slice(body).map_err(|err| IdentityError::Parse(err.to_string()))?;

    let mut keys = Vec::with_capacity(document.keys.len());
    for entry in document.keys.into_iter() {
        let Some(kid) = entry.kid else {
            warn!("skipping JWKS entry without kid");
            continue;
        };

        let kty = entry.kty.unwrap_or_else(|| "RSA".to_string());
        if kty != "RSA" {
            debug!(kid = %kid, kty = %kty, "skipping non-RSA JWKS entry");
            continue;
        }

        if entry.key_use.as_deref().is_some_and(|value| value != "sig") {
            debug!(kid = %kid, "skipping JWKS entry not meant for signatures");
            continue;
        }

        let algorithm = match entry.alg {
            Some(alg) => match SigningAlgorithm::from_name(&alg) {
                Some(algorithm) if allowed.contains(&algorithm) => Some(algorithm),
                _ => {
                    warn!(kid = %kid, alg = %alg, "skipping JWKS entry with disallowed alg");
                    continue;
                }
            },
            None => None,
        };

        let (modulus, exponent) = match (entry.n, entry.e) {
            (Some(n), Some(e)) => (n, e),
            _ => {
                return Err(IdentityError::Parse(format!(
                    "JWKS key '{kid}' missing required RSA components"
                )))
            }
        };

        let key = DecodingKey::from_rsa_components(&modulus, &exponent).map_err(|err| {
            IdentityError::Parse(format!("failed to parse JWKS key '{kid}': {err}"))
        })?;

        keys.push(SigningKey::new(kid, algorithm, key));
    }

    Ok(SigningKeySet::new(keys))
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<JwkEntry>,
}

#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: Option<String>,
    alg: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    n: Option<String>,
    e: Option<String>,
}
