//! Prometheus metrics for the login flow
//!
//! Exposed via the `/metrics` endpoint for Prometheus scraping.

use prometheus::{
    register_counter_vec_with_registry, register_int_counter_with_registry, CounterVec, Encoder,
    IntCounter, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// Chooser page requests (GET and POST)
pub static LOGIN_REQUESTS_TOTAL: std::sync::LazyLock<IntCounter> = std::sync::LazyLock::new(|| {
    register_int_counter_with_registry!(
        "login_requests_total",
        "Total number of login page requests",
        REGISTRY.clone()
    )
    .expect("Failed to register LOGIN_REQUESTS_TOTAL")
});

/// Browser redirects to an identity provider
pub static PROVIDER_REDIRECTS_TOTAL: std::sync::LazyLock<CounterVec> =
    std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "provider_redirects_total",
            "Total number of redirects to an identity provider",
            &["provider"],
            REGISTRY.clone()
        )
        .expect("Failed to register PROVIDER_REDIRECTS_TOTAL")
    });

/// Finished callbacks by outcome
pub static AUTHENTICATIONS_TOTAL: std::sync::LazyLock<CounterVec> =
    std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "authentications_total",
            "Total number of completed authentication attempts",
            &["provider", "outcome"],
            REGISTRY.clone()
        )
        .expect("Failed to register AUTHENTICATIONS_TOTAL")
    });

/// Outcome label of one authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Denied,
    Failed,
    Timeout,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Denied => "denied",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

pub fn record_login_request() {
    LOGIN_REQUESTS_TOTAL.inc();
}

pub fn record_provider_redirect(provider: &str) {
    PROVIDER_REDIRECTS_TOTAL.with_label_values(&[provider]).inc();
}

pub fn record_authentication(provider: &str, outcome: Outcome) {
    AUTHENTICATIONS_TOTAL
        .with_label_values(&[provider, outcome.as_str()])
        .inc();
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|_| prometheus::Error::Msg("Invalid UTF-8".to_string()))
}
