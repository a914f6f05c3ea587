use serde::Serialize;

use crate::config::ClientConfig;

/// Hosted UI and OAuth2 endpoints derived from the pool domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostedUrls {
    pub base_url: String,
    pub login_url: String,
    pub logout_url: String,
    pub signup_url: String,
    pub token_endpoint: String,
}

impl HostedUrls {
    /// Returns `None` when no hosted UI domain is configured.
    pub fn derive(config: &ClientConfig) -> Option<Self> {
        let domain = config
            .domain
            .as_deref()
            .filter(|domain| !domain.trim().is_empty())?;
        let base_url = format!("https://{domain}.auth.{}.amazoncognito.com", config.region);

        Some(Self {
            login_url: hosted_page(&base_url, "login", &config.client_id, &config.redirect_uri),
            signup_url: hosted_page(&base_url, "signup", &config.client_id, &config.redirect_uri),
            logout_url: hosted_page(&base_url, "logout", &config.client_id, &config.redirect_uri),
            token_endpoint: format!("{base_url}/oauth2/token"),
            base_url,
        })
    }
}

fn hosted_page(base_url: &str, page: &str, client_id: &str, redirect_uri: &str) -> String {
    format!("{base_url}/{page}?response_type=code&client_id={client_id}&redirect_uri={redirect_uri}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("us-east-1", "us-east-1_pool", "abc123")
            .with_domain("acme")
            .with_redirect_uri("https://app.example.com/cb")
    }

    #[test]
    fn login_url_is_byte_exact() {
        let urls = HostedUrls::derive(&config()).expect("domain configured");
        assert_eq!(
            urls.login_url,
            "https://acme.auth.us-east-1.amazoncognito.com/login?response_type=code&client_id=abc123&redirect_uri=https://app.example.com/cb"
        );
        assert_eq!(
            urls.signup_url,
            "https://acme.auth.us-east-1.amazoncognito.com/signup?response_type=code&client_id=abc123&redirect_uri=https://app.example.com/cb"
        );
        assert_eq!(
            urls.token_endpoint,
            "https://acme.auth.us-east-1.amazoncognito.com/oauth2/token"
        );
    }

    #[test]
    fn logout_returns_to_redirect_uri() {
        let urls = HostedUrls::derive(&config().with_logout_redirect_uri("https://app.example.com/bye"))
            .expect("domain configured");
        assert_eq!(
            urls.logout_url,
            "https://acme.auth.us-east-1.amazoncognito.com/logout?response_type=code&client_id=abc123&redirect_uri=https://app.example.com/cb"
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(HostedUrls::derive(&config()), HostedUrls::derive(&config()));
    }

    #[test]
    fn no_domain_means_no_urls() {
        let config = ClientConfig::new("us-east-1", "pool", "abc123");
        assert!(HostedUrls::derive(&config).is_none());

        let blank = ClientConfig::from_json(r#"{"region":"r","poolId":"p","clientId":"c","domain":""}"#)
            .expect("config parses");
        assert!(HostedUrls::derive(&blank).is_none());
    }
}
