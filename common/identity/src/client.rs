use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use common_observability::IdentityMetrics;
use tracing::{debug, warn};

use crate::admin::{CognitoAdmin, Credentials, IdentityAdmin};
use crate::claims::VerifiedClaims;
use crate::config::ClientConfig;
use crate::error::{IdentityError, IdentityResult, VerifyError};
use crate::exchange::{TokenBundle, TokenExchangeClient};
use crate::jwks::JwksFetcher;
use crate::key_set::{KeySetCache, RefreshOutcome};
use crate::urls::HostedUrls;
use crate::verifier::{TokenVerifier, VerifierConfig};

/// Client for one user pool and app client. Constructed once from
/// configuration and read-only afterwards, apart from key set refreshes.
#[derive(Clone)]
pub struct CognitoClient {
    config: ClientConfig,
    urls: Option<HostedUrls>,
    verifier: TokenVerifier,
    exchange: Option<TokenExchangeClient>,
    admin: Arc<dyn IdentityAdmin>,
    metrics: Option<IdentityMetrics>,
}

impl CognitoClient {
    /// Build a client and fetch the pool's signing keys. A failed key fetch
    /// does not fail construction; it is logged and reported by
    /// [`key_set_error`](Self::key_set_error).
    pub async fn new(config: ClientConfig) -> IdentityResult<Self> {
        Self::builder(config).build().await
    }

    pub fn builder(config: ClientConfig) -> CognitoClientBuilder {
        CognitoClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn hosted_urls(&self) -> Option<&HostedUrls> {
        self.urls.as_ref()
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn key_set(&self) -> &Arc<KeySetCache> {
        self.verifier.keys()
    }

    pub fn admin(&self) -> &dyn IdentityAdmin {
        self.admin.as_ref()
    }

    pub fn metrics(&self) -> Option<&IdentityMetrics> {
        self.metrics.as_ref()
    }

    /// Last key set fetch failure, if the most recent attempt failed.
    pub fn key_set_error(&self) -> Option<String> {
        self.key_set().last_error()
    }

    /// Re-fetch the signing keys, subject to the configured minimum interval.
    pub async fn refresh_key_set(&self) -> IdentityResult<RefreshOutcome> {
        let outcome = self.key_set().refresh().await;
        if let Some(metrics) = &self.metrics {
            let label = match &outcome {
                Ok(RefreshOutcome::Refreshed(_)) => "refreshed",
                Ok(RefreshOutcome::Empty) => "empty",
                Ok(RefreshOutcome::Throttled) => "throttled",
                Ok(RefreshOutcome::Skipped) => "skipped",
                Err(_) => "failed",
            };
            metrics.record_key_set_refresh(label);
        }
        outcome
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, VerifyError> {
        let result = self.verifier.verify(token);
        if let Err(err) = &result {
            debug!(kind = err.kind(), error = %err, "rejected token");
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_verification(match &result {
                Ok(_) => "verified",
                Err(err) => err.kind(),
            });
        }
        result
    }

    /// Exchange an authorization code for raw tokens. Requires a hosted UI
    /// domain or an explicit token endpoint.
    pub async fn exchange_code(&self, code: &str, scopes: &[&str]) -> IdentityResult<TokenBundle> {
        let exchange = self.exchange.as_ref().ok_or_else(|| {
            IdentityError::Config("no token endpoint: configure a domain or token endpoint".into())
        })?;

        let result = exchange.exchange(code, scopes).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_token_exchange(match &result {
                Ok(_) => "ok",
                Err(IdentityError::Provider(_)) => "provider_error",
                Err(IdentityError::Parse(_)) => "parse_error",
                Err(_) => "network_error",
            });
        }
        result
    }

    /// Exchange a code and verify the returned identity token.
    pub async fn exchange_and_verify(
        &self,
        code: &str,
        scopes: &[&str],
    ) -> IdentityResult<(TokenBundle, VerifiedClaims)> {
        let tokens = self.exchange_code(code, scopes).await?;
        let claims = self.verify(&tokens.id_token)?;
        Ok((tokens, claims))
    }

    /// Authenticate with username and password and return the verified
    /// subject identifier from the identity token.
    pub async fn authenticate(&self, credentials: &Credentials) -> IdentityResult<String> {
        let tokens = self.admin.authenticate_with_password(credentials).await?;
        let claims = self.verify(&tokens.id_token)?;
        Ok(claims.subject)
    }
}

impl fmt::Debug for CognitoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CognitoClient")
            .field("config", &self.config)
            .field("urls", &self.urls)
            .field("verifier", &self.verifier)
            .field("exchange", &self.exchange)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

pub struct CognitoClientBuilder {
    config: ClientConfig,
    admin: Option<Arc<dyn IdentityAdmin>>,
    metrics: Option<IdentityMetrics>,
}

impl CognitoClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            admin: None,
            metrics: None,
        }
    }

    /// Use a custom admin implementation instead of the SDK-backed one.
    pub fn with_admin(mut self, admin: Arc<dyn IdentityAdmin>) -> Self {
        self.admin = Some(admin);
        self
    }

    pub fn with_metrics(mut self, metrics: IdentityMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn build(self) -> IdentityResult<CognitoClient> {
        let config = self.config;
        config.validate()?;

        let urls = HostedUrls::derive(&config);
        let fetcher = JwksFetcher::new(config.jwks_url(), config.timeout())?
            .with_allowed_algorithms(config.allowed_algorithms.clone());
        let keys = Arc::new(KeySetCache::new(
            fetcher,
            Duration::from_secs(config.refresh_interval_seconds),
        ));
        let verifier = TokenVerifier::new(VerifierConfig::from_client_config(&config), keys);

        let token_endpoint = config
            .token_endpoint
            .clone()
            .or_else(|| urls.as_ref().map(|urls| urls.token_endpoint.clone()));
        let exchange = token_endpoint
            .map(|endpoint| {
                TokenExchangeClient::new(
                    endpoint,
                    config.client_id.clone(),
                    config.redirect_uri.clone(),
                    config.secret(),
                    config.timeout(),
                )
            })
            .transpose()?;

        let admin = match self.admin {
            Some(admin) => admin,
            None => Arc::new(CognitoAdmin::from_config(&config).await),
        };

        let client = CognitoClient {
            config,
            urls,
            verifier,
            exchange,
            admin,
            metrics: self.metrics,
        };

        if let Err(err) = client.refresh_key_set().await {
            warn!(error = %err, "continuing without signing keys; token verification will fail until a refresh succeeds");
        }

        Ok(client)
    }
}
