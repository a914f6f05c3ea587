use std::env;
use std::fmt;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::Deserialize;

use crate::error::{IdentityError, IdentityResult};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 60;

/// Asymmetric signature algorithms a token may declare. HMAC and `none`
/// are not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum SigningAlgorithm {
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
}

impl SigningAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RS256" => Some(Self::RS256),
            "RS384" => Some(Self::RS384),
            "RS512" => Some(Self::RS512),
            "PS256" => Some(Self::PS256),
            "PS384" => Some(Self::PS384),
            "PS512" => Some(Self::PS512),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
        }
    }

    pub(crate) fn as_jwt(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::RS512 => Algorithm::RS512,
            Self::PS256 => Algorithm::PS256,
            Self::PS384 => Algorithm::PS384,
            Self::PS512 => Algorithm::PS512,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static access credentials for admin calls.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Immutable configuration for a [`CognitoClient`](crate::CognitoClient).
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub region: String,
    pub pool_id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Hosted UI domain prefix; hosted URLs and the token endpoint are only
    /// derived when this is set.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub redirect_uri: String,
    /// Carried for configuration compatibility; hosted URLs always return to
    /// `redirect_uri`.
    #[serde(default)]
    pub logout_redirect_uri: Option<String>,
    #[serde(default)]
    pub aws_credentials: Option<StaticCredentials>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Allowable clock skew in seconds when validating exp/nbf/iat.
    #[serde(default)]
    pub leeway_seconds: u32,
    #[serde(default = "default_algorithms")]
    pub allowed_algorithms: Vec<SigningAlgorithm>,
    /// Minimum spacing between key set fetch attempts.
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub admin_endpoint: Option<String>,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_refresh_interval_seconds() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECONDS
}

fn default_algorithms() -> Vec<SigningAlgorithm> {
    vec![SigningAlgorithm::RS256]
}

impl ClientConfig {
    pub fn new(
        region: impl Into<String>,
        pool_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            pool_id: pool_id.into(),
            client_id: client_id.into(),
            client_secret: None,
            domain: None,
            redirect_uri: String::new(),
            logout_redirect_uri: None,
            aws_credentials: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            leeway_seconds: 0,
            allowed_algorithms: default_algorithms(),
            refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL_SECONDS,
            jwks_url: None,
            token_endpoint: None,
            admin_endpoint: None,
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = normalize_optional(&secret.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = normalize_optional(&domain.into());
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    pub fn with_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.logout_redirect_uri = normalize_optional(&uri.into());
        self
    }

    pub fn with_static_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.aws_credentials = Some(StaticCredentials {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        });
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn with_allowed_algorithms(mut self, algorithms: Vec<SigningAlgorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    pub fn with_refresh_interval(mut self, seconds: u64) -> Self {
        self.refresh_interval_seconds = seconds;
        self
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = Some(url.into());
        self
    }

    pub fn with_admin_endpoint(mut self, url: impl Into<String>) -> Self {
        self.admin_endpoint = Some(url.into());
        self
    }

    /// Parse a JSON configuration document.
    pub fn from_json(raw: &str) -> IdentityResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| IdentityError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `COGNITO_*` / `AWS_*` environment variables.
    pub fn from_env() -> IdentityResult<Self> {
        let mut config = Self::new(
            required_env("COGNITO_REGION")?,
            required_env("COGNITO_POOL_ID")?,
            required_env("COGNITO_CLIENT_ID")?,
        );

        config.client_secret = optional_env("COGNITO_CLIENT_SECRET");
        config.domain = optional_env("COGNITO_DOMAIN");
        config.redirect_uri = optional_env("COGNITO_REDIRECT_URI").unwrap_or_default();
        config.logout_redirect_uri = optional_env("COGNITO_LOGOUT_REDIRECT_URI");
        config.jwks_url = optional_env("COGNITO_JWKS_URL");
        config.token_endpoint = optional_env("COGNITO_TOKEN_ENDPOINT");
        config.admin_endpoint = optional_env("COGNITO_ADMIN_ENDPOINT");

        match (
            optional_env("AWS_ACCESS_KEY_ID"),
            optional_env("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => {
                config.aws_credentials = Some(StaticCredentials {
                    access_key_id,
                    secret_access_key,
                });
            }
            (None, None) => {}
            _ => {
                return Err(IdentityError::Config(
                    "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together".into(),
                ))
            }
        }

        if let Some(timeout) = parsed_env::<u64>("COGNITO_HTTP_TIMEOUT_SECS")? {
            config.timeout_seconds = timeout;
        }
        if let Some(leeway) = parsed_env::<u32>("COGNITO_JWT_LEEWAY_SECS")? {
            config.leeway_seconds = leeway;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IdentityResult<()> {
        for (name, value) in [
            ("region", &self.region),
            ("pool id", &self.pool_id),
            ("client id", &self.client_id),
        ] {
            if value.trim().is_empty() {
                return Err(IdentityError::Config(format!("{name} must not be empty")));
            }
        }
        if self.allowed_algorithms.is_empty() {
            return Err(IdentityError::Config(
                "at least one signing algorithm must be allowed".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(IdentityError::Config("timeout must be positive".into()));
        }
        if self.refresh_interval_seconds == 0 {
            return Err(IdentityError::Config(
                "refresh interval must be positive".into(),
            ));
        }
        if let Some(credentials) = &self.aws_credentials {
            if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
                return Err(IdentityError::Config(
                    "static credentials require both access key id and secret".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Issuer the user pool stamps into its tokens.
    pub fn issuer(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, self.pool_id
        )
    }

    /// Published key set location for the user pool.
    pub fn jwks_url(&self) -> String {
        match &self.jwks_url {
            Some(url) => url.clone(),
            None => format!("{}/.well-known/jwks.json", self.issuer()),
        }
    }

    /// Client secret, ignoring blank values.
    pub fn secret(&self) -> Option<&str> {
        self.client_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("region", &self.region)
            .field("pool_id", &self.pool_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("domain", &self.domain)
            .field("redirect_uri", &self.redirect_uri)
            .field("logout_redirect_uri", &self.logout_redirect_uri)
            .field("aws_credentials", &self.aws_credentials)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("leeway_seconds", &self.leeway_seconds)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("refresh_interval_seconds", &self.refresh_interval_seconds)
            .field("jwks_url", &self.jwks_url)
            .field("token_endpoint", &self.token_endpoint)
            .field("admin_endpoint", &self.admin_endpoint)
            .finish()
    }
}

fn required_env(key: &str) -> IdentityResult<String> {
    optional_env(key).ok_or_else(|| IdentityError::Config(format!("{key} must be set")))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| normalize_optional(&value))
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> IdentityResult<Option<T>> {
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| IdentityError::Config(format!("{key} has invalid value '{raw}'"))),
        None => Ok(None),
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
