//! Thread-safe metrics sink (C1).
//!
//! All counters are plain atomics so any component can hold a cheap `Arc<MetricsSink>`
//! and update it without contention beyond the atomic itself. The failure-reason
//! histogram and per-plugin counters need a map, so those live behind a `Mutex` --
//! writes are rare relative to the atomic counters and never block a hot path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Point-in-time snapshot of all metrics. Safe to mutate freely; it shares nothing
/// with the sink it was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub devices_connected_total: u64,
    pub devices_disconnected_total: u64,
    pub sessions_started_total: u64,
    pub sessions_stopped_total: u64,
    pub sessions_failed_total: u64,
    pub port_allocation_failures_total: u64,
    pub session_failure_reasons: HashMap<String, u64>,
    pub plugin_unhealthy_total: HashMap<String, u64>,
    pub plugin_restart_total: HashMap<String, u64>,
}

impl MetricsSnapshot {
    /// `started / (started + failed)` as a percentage; 100% when the denominator is
    /// zero (no attempts yet is not a failure).
    pub fn session_start_success_rate(&self) -> f64 {
        let denom = self.sessions_started_total + self.sessions_failed_total;
        if denom == 0 {
            100.0
        } else {
            (self.sessions_started_total as f64 / denom as f64) * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct Histograms {
    session_failure_reasons: HashMap<String, u64>,
    plugin_unhealthy_total: HashMap<String, u64>,
    plugin_restart_total: HashMap<String, u64>,
}

/// Thread-safe counters and failure-reason histograms, shared across the control
/// plane as a single `Arc<MetricsSink>`.
#[derive(Debug, Default)]
pub struct MetricsSink {
    devices_connected_total: AtomicU64,
    devices_disconnected_total: AtomicU64,
    sessions_started_total: AtomicU64,
    sessions_stopped_total: AtomicU64,
    sessions_failed_total: AtomicU64,
    port_allocation_failures_total: AtomicU64,
    histograms: Mutex<Histograms>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_device_connected(&self) {
        self.devices_connected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_device_disconnected(&self) {
        self.devices_disconnected_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.sessions_started_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_stopped(&self) {
        self.sessions_stopped_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed session start under `reason` (e.g. `"NoPortsAvailable"`,
    /// `"LaunchFailed"`).
    pub fn record_session_failed(&self, reason: &str) {
        self.sessions_failed_total.fetch_add(1, Ordering::Relaxed);
        let mut h = self.histograms.lock().expect("metrics mutex poisoned");
        *h.session_failure_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn record_port_allocation_failure(&self) {
        self.port_allocation_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_plugin_unhealthy(&self, plugin_id: &str) {
        let mut h = self.histograms.lock().expect("metrics mutex poisoned");
        *h.plugin_unhealthy_total.entry(plugin_id.to_string()).or_insert(0) += 1;
    }

    pub fn record_plugin_restart(&self, plugin_id: &str) {
        let mut h = self.histograms.lock().expect("metrics mutex poisoned");
        *h.plugin_restart_total.entry(plugin_id.to_string()).or_insert(0) += 1;
    }

    /// Returns an independent copy; mutating it never affects this sink.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let h = self.histograms.lock().expect("metrics mutex poisoned");
        MetricsSnapshot {
            devices_connected_total: self.devices_connected_total.load(Ordering::Relaxed),
            devices_disconnected_total: self.devices_disconnected_total.load(Ordering::Relaxed),
            sessions_started_total: self.sessions_started_total.load(Ordering::Relaxed),
            sessions_stopped_total: self.sessions_stopped_total.load(Ordering::Relaxed),
            sessions_failed_total: self.sessions_failed_total.load(Ordering::Relaxed),
            port_allocation_failures_total: self
                .port_allocation_failures_total
                .load(Ordering::Relaxed),
            session_failure_reasons: h.session_failure_reasons.clone(),
            plugin_unhealthy_total: h.plugin_unhealthy_total.clone(),
            plugin_restart_total: h.plugin_restart_total.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn success_rate_is_100_with_no_attempts() {
        let m = MetricsSink::new();
        assert_eq!(m.snapshot().session_start_success_rate(), 100.0);
    }

    #[test]
    fn success_rate_reflects_started_vs_failed() {
        let m = MetricsSink::new();
        m.record_session_started();
        m.record_session_started();
        m.record_session_started();
        m.record_session_failed("NoPortsAvailable");
        let rate = m.snapshot().session_start_success_rate();
        assert!((rate - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failure_histogram_buckets_by_reason() {
        let m = MetricsSink::new();
        m.record_session_failed("NoPortsAvailable");
        m.record_session_failed("NoPortsAvailable");
        m.record_session_failed("LaunchFailed");
        let snap = m.snapshot();
        assert_eq!(snap.session_failure_reasons["NoPortsAvailable"], 2);
        assert_eq!(snap.session_failure_reasons["LaunchFailed"], 1);
    }

    #[test]
    fn snapshot_is_independent_of_sink() {
        let m = MetricsSink::new();
        m.record_device_connected();
        let mut snap = m.snapshot();
        snap.devices_connected_total = 999;
        assert_eq!(m.snapshot().devices_connected_total, 1);
    }

    #[test]
    fn concurrent_writers_are_safe() {
        let m = Arc::new(MetricsSink::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = m.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    m.record_device_connected();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.snapshot().devices_connected_total, 8000);
    }
}
