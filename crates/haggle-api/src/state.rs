//! # Application State
//!
//! Shared state for the Axum application: the negotiation engine, the
//! snapshot gateway over it, the courier position registry, and the
//! optional Prometheus handle.

use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;

use haggle_negotiation::{
    InMemoryCourierLocator, NegotiationConfig, NegotiationEngine, SyncGateway,
};

/// Application configuration.
///
/// Every option falls back to an environment variable, then a default.
#[derive(Debug, Clone, Parser)]
#[command(name = "haggle-api", version, about = "Delivery bid-negotiation API")]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds a delivery with no bids stays open before expiring.
    #[arg(long, env = "HAGGLE_TIMEOUT_SECS", default_value_t = 120)]
    pub timeout_secs: u64,

    /// Poll interval suggested to clients, in seconds.
    #[arg(long, env = "HAGGLE_POLL_INTERVAL_SECS", default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Emit logs as JSON lines.
    #[arg(long, env = "HAGGLE_LOG_JSON")]
    pub log_json: bool,
}

impl AppConfig {
    /// The engine settings carried by this configuration.
    pub fn negotiation(&self) -> NegotiationConfig {
        NegotiationConfig {
            timeout_secs: self.timeout_secs,
            poll_interval_secs: self.poll_interval_secs,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let negotiation = NegotiationConfig::default();
        Self {
            port: 8080,
            timeout_secs: negotiation.timeout_secs,
            poll_interval_secs: negotiation.poll_interval_secs,
            log_json: false,
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<NegotiationEngine>,
    pub gateway: SyncGateway,
    pub locator: Arc<InMemoryCourierLocator>,
    pub prometheus: Option<PrometheusHandle>,
    pub config: AppConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .field("prometheus", &self.prometheus.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// State with a default engine built from `config`.
    pub fn with_config(config: AppConfig) -> Self {
        let engine = NegotiationEngine::new(config.negotiation());
        Self::with_engine(config, engine)
    }

    /// State around a preconfigured engine (custom clock, store or observer).
    pub fn with_engine(config: AppConfig, engine: NegotiationEngine) -> Self {
        let engine = Arc::new(engine);
        let locator = Arc::new(InMemoryCourierLocator::new());
        let gateway = SyncGateway::new(Arc::clone(&engine), locator.clone());
        Self {
            engine,
            gateway,
            locator,
            prometheus: None,
            config,
        }
    }

    /// Attach the installed Prometheus recorder so `/metrics` can render it.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
