use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Distribute,
    ServerLoad,
    Rebalance,
    ServerAdded,
    ServerRemoved,
    AlgorithmChanged,
    HealthChanged,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Distribute => "distribute",
            Operation::ServerLoad => "server-load",
            Operation::Rebalance => "rebalance",
            Operation::ServerAdded => "server-added",
            Operation::ServerRemoved => "server-removed",
            Operation::AlgorithmChanged => "algorithm-changed",
            Operation::HealthChanged => "health-changed",
        };
        write!(f, "{}", label)
    }
}

/// One record per mutating balancer operation. `timestamp` is the balancer's
/// simulated clock in seconds; latency is wall-clock time spent in the operation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: f64,
    pub operation: Operation,
    pub algorithm: String,
    pub server_loads: Vec<u64>,
    pub average_load: f64,
    pub load_variance: f64,
    pub operation_latency_ms: f64,
}

impl MetricsSnapshot {
    pub fn capture(
        timestamp: f64,
        operation: Operation,
        algorithm: &str,
        server_loads: Vec<u64>,
        operation_latency_ms: f64,
    ) -> Self {
        Self {
            timestamp,
            operation,
            algorithm: algorithm.to_string(),
            average_load: average_load(&server_loads),
            load_variance: load_variance(&server_loads),
            server_loads,
            operation_latency_ms,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlgorithmSummary {
    pub algorithm: String,
    pub samples: usize,
    pub avg_load_variance: f64,
    pub avg_latency_ms: f64,
}

pub trait MetricsSink: Send {
    fn record(&mut self, snapshot: MetricsSnapshot);
}

#[derive(Default)]
pub struct NoMetrics;

impl MetricsSink for NoMetrics {
    fn record(&mut self, _snapshot: MetricsSnapshot) {}
}

#[derive(Clone, Default)]
pub struct MetricsRecorder {
    snapshots: Arc<Mutex<Vec<MetricsSnapshot>>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }

    pub fn snapshots(&self) -> Vec<MetricsSnapshot> {
        self.snapshots.lock().clone()
    }

    pub fn latest(&self) -> Option<MetricsSnapshot> {
        self.snapshots.lock().last().cloned()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.snapshots
            .lock()
            .iter()
            .filter(|snapshot| snapshot.operation == operation)
            .count()
    }

    pub fn summary_by_algorithm(&self) -> Vec<AlgorithmSummary> {
        let snapshots = self.snapshots.lock();
        let mut grouped: BTreeMap<&str, (usize, f64, f64)> = BTreeMap::new();
        for snapshot in snapshots.iter() {
            let entry = grouped
                .entry(snapshot.algorithm.as_str())
                .or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += snapshot.load_variance;
            entry.2 += snapshot.operation_latency_ms;
        }

        grouped
            .into_iter()
            .map(|(algorithm, (samples, variance, latency))| AlgorithmSummary {
                algorithm: algorithm.to_string(),
                samples,
                avg_load_variance: variance / samples as f64,
                avg_latency_ms: latency / samples as f64,
            })
            .collect()
    }
}

impl MetricsSink for MetricsRecorder {
    fn record(&mut self, snapshot: MetricsSnapshot) {
        self.snapshots.lock().push(snapshot);
    }
}

pub fn average_load(loads: &[u64]) -> f64 {
    if loads.is_empty() {
        return 0.0;
    }
    loads.iter().map(|&load| load as f64).sum::<f64>() / loads.len() as f64
}

pub fn load_variance(loads: &[u64]) -> f64 {
    if loads.is_empty() {
        return 0.0;
    }
    let mean = average_load(loads);
    loads
        .iter()
        .map(|&load| {
            let diff = load as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / loads.len() as f64
}
