//! Metric reporting to the master.

use tracing::debug;

/// Ships execution metrics to the master's metric store.
///
/// Values are serialized primitives (JSON bytes); the key names them.
/// Implementations must be safe for concurrent `send` across executors.
pub trait MetricMessageSender: Send + Sync {
    fn send(&self, metric_type: &str, task_id: &str, metric_key: &str, value: Vec<u8>);
}

/// Logs metrics instead of shipping them; for local runs.
#[derive(Debug, Default)]
pub struct LoggingMetricSender;

impl MetricMessageSender for LoggingMetricSender {
    fn send(&self, metric_type: &str, task_id: &str, metric_key: &str, value: Vec<u8>) {
        debug!(
            metric_type = %metric_type,
            task_id = %task_id,
            metric_key = %metric_key,
            value = %String::from_utf8_lossy(&value),
            "metric"
        );
    }
}
