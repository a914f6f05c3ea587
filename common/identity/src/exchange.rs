use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::error::{IdentityError, IdentityResult};

/// Raw, unverified tokens returned by the provider.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenBundle {
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
}

impl fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBundle")
            .field("id_token", &redact(&self.id_token))
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    tokens: TokenBundle,
}

/// OAuth2 authorization-code exchange against the pool's token endpoint.
#[derive(Clone)]
pub struct TokenExchangeClient {
    client: Client,
    endpoint: String,
    client_id: String,
    redirect_uri: String,
    authorization: Option<String>,
}

impl TokenExchangeClient {
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        client_secret: Option<&str>,
        timeout: Duration,
    ) -> IdentityResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| IdentityError::Config(err.to_string()))?;
        let client_id = client_id.into();
        let authorization = client_secret.map(|secret| basic_authorization(&client_id, secret));

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            client_id,
            redirect_uri: redirect_uri.into(),
            authorization,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exchange an authorization code for tokens. Never retried.
    pub async fn exchange(&self, code: &str, scopes: &[&str]) -> IdentityResult<TokenBundle> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.clone()),
        ];
        if !scopes.is_empty() {
            form.push(("scope", scopes.join(" ")));
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .form(&form);
        if let Some(authorization) = &self.authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request
            .send()
            .await
            .map_err(|err| IdentityError::Network(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| IdentityError::Network(err.to_string()))?;

        let parsed = serde_json::from_str::<TokenResponse>(&body);
        // An empty `error` string carries no rejection.
        if let Some(error) = parsed
            .as_ref()
            .ok()
            .and_then(|response| response.error.as_deref())
            .filter(|error| !error.trim().is_empty())
        {
            warn!(endpoint = %self.endpoint, %status, error = %error, "token endpoint rejected code");
            return Err(IdentityError::Provider(error.to_string()));
        }

        if !status.is_success() {
            warn!(endpoint = %self.endpoint, %status, "token endpoint returned error status");
            let message = body.trim();
            return Err(IdentityError::Provider(if message.is_empty() {
                status.to_string()
            } else {
                message.to_string()
            }));
        }

        parsed
            .map(|response| response.tokens)
            .map_err(|err| IdentityError::Parse(err.to_string()))
    }
}

impl fmt::Debug for TokenExchangeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchangeClient")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("basic_auth", &self.authorization.is_some())
            .finish()
    }
}

/// `Basic base64(client_id:client_secret)`.
pub fn basic_authorization(client_id: &str, client_secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{client_id}:{client_secret}")))
}
