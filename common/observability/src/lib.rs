use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for identity-provider client activity, registered on a private
/// registry so embedding services can expose or merge them as they see fit.
#[derive(Clone)]
pub struct IdentityMetrics {
    pub registry: Registry,
    pub token_verifications_total: IntCounterVec,
    pub key_set_refresh_total: IntCounterVec,
    pub token_exchange_total: IntCounterVec,
}

impl IdentityMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let token_verifications_total = IntCounterVec::new(
            Opts::new(
                "identity_token_verifications_total",
                "Token verification attempts by outcome",
            ),
            &["outcome"],
        )?;
        let key_set_refresh_total = IntCounterVec::new(
            Opts::new(
                "identity_key_set_refresh_total",
                "Signing key set refresh attempts by result",
            ),
            &["result"],
        )?;
        let token_exchange_total = IntCounterVec::new(
            Opts::new(
                "identity_token_exchange_total",
                "Authorization code exchanges by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(token_verifications_total.clone()))?;
        registry.register(Box::new(key_set_refresh_total.clone()))?;
        registry.register(Box::new(token_exchange_total.clone()))?;

        Ok(Self {
            registry,
            token_verifications_total,
            key_set_refresh_total,
            token_exchange_total,
        })
    }

    pub fn record_verification(&self, outcome: &str) {
        self.token_verifications_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_key_set_refresh(&self, result: &str) {
        self.key_set_refresh_total.with_label_values(&[result]).inc();
    }

    pub fn record_token_exchange(&self, result: &str) {
        self.token_exchange_total.with_label_values(&[result]).inc();
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_labelled_by_outcome() {
        let metrics = IdentityMetrics::new().expect("metrics register");
        metrics.record_verification("verified");
        metrics.record_verification("verified");
        metrics.record_verification("expired");

        assert_eq!(
            metrics
                .token_verifications_total
                .with_label_values(&["verified"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .token_verifications_total
                .with_label_values(&["expired"])
                .get(),
            1
        );
    }

    #[test]
    fn render_exposes_registered_families() {
        let metrics = IdentityMetrics::new().expect("metrics register");
        metrics.record_key_set_refresh("refreshed");
        metrics.record_token_exchange("provider_error");

        let rendered = metrics.render().expect("render");
        assert!(rendered.contains("identity_key_set_refresh_total{result=\"refreshed\"} 1"));
        assert!(rendered.contains("identity_token_exchange_total{result=\"provider_error\"} 1"));
    }

    #[test]
    fn instances_do_not_share_registries() {
        let first = IdentityMetrics::new().expect("metrics register");
        let second = IdentityMetrics::new().expect("metrics register");
        first.record_verification("verified");
        assert_eq!(
            second
                .token_verifications_total
                .with_label_values(&["verified"])
                .get(),
            0
        );
    }
}
