//! Metrics collection.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.
//!
//! # Metrics
//! - `transport_attempts_total` (counter): attempts by outcome
//! - `transport_attempt_duration_seconds` (histogram): per-attempt latency
//! - `transport_connections_marked_dead_total` (counter): by node
//! - `transport_connections_resurrected_total` (counter): by node, forced
//! - `transport_pool_connections` (gauge): live/dead pool members
//! - `transport_sniffs_total` (counter): sniffs by outcome
//! - `transport_sniffed_nodes` (gauge): members after the last sniff

use std::time::Duration;

pub fn record_attempt(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("transport_attempts_total", "outcome" => outcome).increment(1);
    metrics::histogram!("transport_attempt_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

pub fn record_marked_dead(node: &str) {
    metrics::counter!("transport_connections_marked_dead_total", "node" => node.to_string())
        .increment(1);
}

pub fn record_resurrected(node: &str, forced: bool) {
    metrics::counter!(
        "transport_connections_resurrected_total",
        "node" => node.to_string(),
        "forced" => if forced { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_pool_size(live: usize, dead: usize) {
    metrics::gauge!("transport_pool_connections", "state" => "live").set(live as f64);
    metrics::gauge!("transport_pool_connections", "state" => "dead").set(dead as f64);
}

pub fn record_sniff(outcome: &'static str, nodes: usize) {
    metrics::counter!("transport_sniffs_total", "outcome" => outcome).increment(1);
    if outcome == "success" {
        metrics::gauge!("transport_sniffed_nodes").set(nodes as f64);
    }
}

/// Recorder that keeps the last value of every gauge, for tests.
#[cfg(test)]
pub(crate) mod capture {
    use metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    type Values = Arc<Mutex<HashMap<String, f64>>>;

    #[derive(Debug, Default, Clone)]
    pub struct GaugeCapture {
        values: Values,
    }

    impl GaugeCapture {
        /// Gauge value by `name{label=value,...}`.
        pub fn get(&self, id: &str) -> Option<f64> {
            self.values.lock().get(id).copied()
        }
    }

    struct CapturedGauge {
        id: String,
        values: Values,
    }

    impl GaugeFn for CapturedGauge {
        fn increment(&self, value: f64) {
            *self.values.lock().entry(self.id.clone()).or_default() += value;
        }

        fn decrement(&self, value: f64) {
            *self.values.lock().entry(self.id.clone()).or_default() -= value;
        }

        fn set(&self, value: f64) {
            self.values.lock().insert(self.id.clone(), value);
        }
    }

    impl Recorder for GaugeCapture {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            let labels: Vec<String> = key
                .labels()
                .map(|l| format!("{}={}", l.key(), l.value()))
                .collect();
            let id = if labels.is_empty() {
                key.name().to_string()
            } else {
                format!("{}{{{}}}", key.name(), labels.join(","))
            };
            Gauge::from_arc(Arc::new(CapturedGauge {
                id,
                values: self.values.clone(),
            }))
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }
}
