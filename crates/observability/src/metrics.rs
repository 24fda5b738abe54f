// crates/observability/src/metrics.rs

use crate::MetricsSummary;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Utterances,
    CommandsSucceeded,
    CommandsFailed,
    ConfirmationsRequested,
    Cancellations,
    RemoteClassifications,
    WakeWordsDetected,
    ListenerTimeouts,
}

#[derive(Default)]
pub struct Metrics {
    values: RwLock<HashMap<MetricType, f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, metric: MetricType, value: f64) {
        self.values.write().insert(metric, value);
    }

    pub fn add(&self, metric: MetricType, value: f64) {
        *self.values.write().entry(metric).or_insert(0.0) += value;
    }

    pub fn increment(&self, metric: MetricType) {
        self.add(metric, 1.0);
    }

    pub fn get(&self, metric: MetricType) -> Option<f64> {
        self.values.read().get(&metric).copied()
    }

    pub fn get_summary(&self) -> MetricsSummary {
        let values = self.values.read();
        let count = |metric: MetricType| values.get(&metric).copied().unwrap_or_default() as u64;

        MetricsSummary {
            utterances: count(MetricType::Utterances),
            commands_succeeded: count(MetricType::CommandsSucceeded),
            commands_failed: count(MetricType::CommandsFailed),
            confirmations_requested: count(MetricType::ConfirmationsRequested),
            cancellations: count(MetricType::Cancellations),
            remote_classifications: count(MetricType::RemoteClassifications),
            wake_words_detected: count(MetricType::WakeWordsDetected),
            listener_timeouts: count(MetricType::ListenerTimeouts),
        }
    }
}
