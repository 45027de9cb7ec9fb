//! Request, latency and score statistics for the scoring service.

use crate::types::response::FraudLabel;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is dropped
const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Metrics collector for the scoring endpoint
pub struct ServiceMetrics {
    /// Total `/predict` requests seen
    pub requests_total: AtomicU64,
    /// Successful predictions labelled fraud
    pub fraud_predictions: AtomicU64,
    /// Successful predictions labelled not fraud
    pub legit_predictions: AtomicU64,
    /// Rejected requests by error kind
    rejections: RwLock<HashMap<String, u64>>,
    /// End-to-end scoring latency (microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Fraud probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            fraud_predictions: AtomicU64::new(0),
            legit_predictions: AtomicU64::new(0),
            rejections: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Count an incoming request
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, latency: Duration, label: FraudLabel, probability: f64) {
        match label {
            FraudLabel::Fraud => self.fraud_predictions.fetch_add(1, Ordering::Relaxed),
            FraudLabel::NotFraud => self.legit_predictions.fetch_add(1, Ordering::Relaxed),
        };

        if let Ok(mut samples) = self.latencies.write() {
            samples.push(latency.as_micros() as u64);
            if samples.len() > MAX_LATENCY_SAMPLES {
                samples.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }

        let bucket = (probability * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a rejected request
    pub fn record_rejection(&self, kind: &str) {
        if let Ok(mut by_kind) = self.rejections.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Latency percentiles over the retained samples
    pub fn get_latency_stats(&self) -> LatencyStats {
        let mut sorted = match self.latencies.read() {
            Ok(samples) if !samples.is_empty() => samples.clone(),
            _ => return LatencyStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Requests per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_total.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or_default()
    }

    pub fn get_rejections(&self) -> HashMap<String, u64> {
        self.rejections
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Point-in-time view for the `/metrics` endpoint
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests_total: self.requests_total.load(Ordering::Relaxed),
            fraud_predictions: self.fraud_predictions.load(Ordering::Relaxed),
            legit_predictions: self.legit_predictions.load(Ordering::Relaxed),
            rejections: self.get_rejections(),
            throughput_rps: self.get_throughput(),
            latency: self.get_latency_stats(),
            score_distribution: self.get_score_distribution(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let scored = snapshot.fraud_predictions + snapshot.legit_predictions;
        let fraud_rate = if scored > 0 {
            (snapshot.fraud_predictions as f64 / scored as f64) * 100.0
        } else {
            0.0
        };
        let rejected: u64 = snapshot.rejections.values().sum();

        info!(
            requests = snapshot.requests_total,
            scored,
            rejected,
            fraud_rate = format!("{:.1}%", fraud_rate),
            throughput = format!("{:.1} req/s", snapshot.throughput_rps),
            "Scoring summary"
        );
        info!(
            mean_us = snapshot.latency.mean_us,
            p50_us = snapshot.latency.p50_us,
            p95_us = snapshot.latency.p95_us,
            p99_us = snapshot.latency.p99_us,
            max_us = snapshot.latency.max_us,
            "Scoring latency"
        );
        for (kind, count) in &snapshot.rejections {
            info!(kind = %kind, count, "Rejected requests");
        }

        let total: u64 = snapshot.score_distribution.iter().sum();
        if total > 0 {
            for (i, &count) in snapshot.score_distribution.iter().enumerate() {
                let pct = (count as f64 / total as f64) * 100.0;
                let bar = "█".repeat(((pct / 5.0) as usize).min(20));
                info!(
                    "  p {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    pct,
                    bar
                );
            }
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable metrics view
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests_total: u64,
    pub fraud_predictions: u64,
    pub legit_predictions: u64,
    pub rejections: HashMap<String, u64>,
    pub throughput_rps: f64,
    pub latency: LatencyStats,
    pub score_distribution: [u64; 10],
}

/// Logs a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_request();
        metrics.record_request();
        metrics.record_request();
        metrics.record_prediction(Duration::from_micros(100), FraudLabel::NotFraud, 0.05);
        metrics.record_prediction(Duration::from_micros(300), FraudLabel::Fraud, 0.97);
        metrics.record_rejection("missing_field");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 3);
        assert_eq!(snapshot.fraud_predictions, 1);
        assert_eq!(snapshot.legit_predictions, 1);
        assert_eq!(snapshot.rejections.get("missing_field"), Some(&1));
        assert_eq!(snapshot.score_distribution[0], 1);
        assert_eq!(snapshot.score_distribution[9], 1);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ServiceMetrics::new();
        for us in 1..=100 {
            metrics.record_prediction(Duration::from_micros(us), FraudLabel::NotFraud, 0.1);
        }

        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.mean_us, 50);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p99_us, 100);
        assert_eq!(stats.max_us, 100);
    }

    #[test]
    fn test_empty_latency_stats() {
        let stats = ServiceMetrics::new().get_latency_stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.max_us, 0);
    }

    #[test]
    fn test_probability_one_lands_in_last_bucket() {
        let metrics = ServiceMetrics::new();
        metrics.record_prediction(Duration::from_micros(1), FraudLabel::Fraud, 1.0);
        assert_eq!(metrics.get_score_distribution()[9], 1);
    }
}
