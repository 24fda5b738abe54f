// crates/observability/src/lib.rs

use hisho_core::{CommandResult, HishoError, HishoResult};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub mod metrics;

pub use metrics::{MetricType, Metrics};

/// Counters for the assistant plus a Prometheus view of per-intent outcomes.
pub struct MetricsCollector {
    enabled: bool,
    metrics: Arc<Metrics>,
    registry: Registry,
    commands: Option<IntCounterVec>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> Self {
        let registry = Registry::new();
        let commands = if enabled {
            match Self::register_commands(&registry) {
                Ok(counter) => Some(counter),
                Err(e) => {
                    warn!(error = %e, "Prometheus counters unavailable");
                    None
                }
            }
        } else {
            None
        };

        info!(enabled, "Metrics collector ready");
        Self {
            enabled,
            metrics: Arc::new(Metrics::new()),
            registry,
            commands,
            start_time: Instant::now(),
        }
    }

    fn register_commands(registry: &Registry) -> prometheus::Result<IntCounterVec> {
        let counter = IntCounterVec::new(
            Opts::new("hisho_commands_total", "Processed commands by intent and outcome"),
            &["intent", "outcome"],
        )?;
        registry.register(Box::new(counter.clone()))?;
        Ok(counter)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&self, metric: MetricType, value: f64) {
        if self.enabled {
            self.metrics.record(metric, value);
        }
    }

    pub fn increment(&self, metric: MetricType) {
        if self.enabled {
            self.metrics.increment(metric);
        }
    }

    pub fn get(&self, metric: MetricType) -> Option<f64> {
        self.metrics.get(metric)
    }

    /// Counts one finished command.
    pub fn record_command(&self, result: &CommandResult) {
        if !self.enabled {
            return;
        }
        let outcome = if result.is_success() {
            self.metrics.increment(MetricType::CommandsSucceeded);
            "success"
        } else {
            self.metrics.increment(MetricType::CommandsFailed);
            "failure"
        };
        if let Some(commands) = &self.commands {
            commands
                .with_label_values(&[result.kind().as_str(), outcome])
                .inc();
        }
    }

    pub fn render_prometheus(&self) -> HishoResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| HishoError::Unknown(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| HishoError::Unknown(format!("Metrics are not UTF-8: {}", e)))
    }

    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            metrics: self.metrics.get_summary(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub uptime_seconds: u64,
    pub version: String,
    pub metrics: MetricsSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub utterances: u64,
    pub commands_succeeded: u64,
    pub commands_failed: u64,
    pub confirmations_requested: u64,
    pub cancellations: u64,
    pub remote_classifications: u64,
    pub wake_words_detected: u64,
    pub listener_timeouts: u64,
}
