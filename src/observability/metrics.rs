//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define pipeline metrics (concurrency, rejections, latency, totals)
//! - Render Prometheus-compatible text for `GET /metrics`
//! - Track per-pool backpressure and job failures
//!
//! # Metrics
//! - `workgate_concurrent_requests` (gauge): requests currently admitted
//! - `workgate_rejected_requests` (counter): admission-limit rejections
//! - `workgate_request_avg_duration_millis` (gauge): cumulative duration / count
//! - `workgate_total_requests` (counter): requests observed
//! - `workgate_deadline_exceeded` (counter): per-request deadline hits
//! - `workgate_backpressure_rejections{pool}` (counter): full pool queues
//! - `workgate_job_failures{pool}` (counter): jobs that produced a failure
//!
//! # Design Decisions
//! - One registry object built at startup and shared by `Arc`; the recorder
//!   is never installed globally
//! - Counters are single-field atomics; two reads may be momentarily
//!   inconsistent with each other

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use metrics::{Counter, Gauge, Key, KeyName, Label, Level, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::worker::PoolKind;

const CONCURRENT: &str = "workgate_concurrent_requests";
const REJECTED: &str = "workgate_rejected_requests";
const AVG_DURATION: &str = "workgate_request_avg_duration_millis";
const TOTAL: &str = "workgate_total_requests";
const DEADLINE_EXCEEDED: &str = "workgate_deadline_exceeded";
const BACKPRESSURE: &str = "workgate_backpressure_rejections";
const JOB_FAILURES: &str = "workgate_job_failures";

/// Point-in-time copy of the headline counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub concurrent: i64,
    pub rejected: u64,
    pub total: u64,
    pub avg_duration_ms: f64,
    pub deadline_exceeded: u64,
}

/// Explicit metrics registry for the request pipeline.
pub struct PipelineMetrics {
    _recorder: PrometheusRecorder,
    handle: PrometheusHandle,

    concurrent_gauge: Gauge,
    rejected_counter: Counter,
    avg_duration_gauge: Gauge,
    total_counter: Counter,
    deadline_counter: Counter,
    backpressure_counters: [Counter; 3],
    failure_counters: [Counter; 3],

    concurrent: AtomicI64,
    rejected: AtomicU64,
    total: AtomicU64,
    duration_micros: AtomicU64,
    deadline_exceeded: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        describe_gauge(&recorder, CONCURRENT, "Current concurrent HTTP requests");
        describe_counter(&recorder, REJECTED, "Rejected HTTP requests due to concurrency limit");
        describe_gauge(&recorder, AVG_DURATION, "Average HTTP request duration in ms");
        describe_counter(&recorder, TOTAL, "Total HTTP requests observed");
        describe_counter(&recorder, DEADLINE_EXCEEDED, "Requests that exceeded their deadline");
        describe_counter(&recorder, BACKPRESSURE, "Jobs rejected because a pool queue was full");
        describe_counter(&recorder, JOB_FAILURES, "Jobs that completed with a failure");

        let concurrent_gauge = recorder.register_gauge(&Key::from_static_name(CONCURRENT), &metadata());
        let rejected_counter = recorder.register_counter(&Key::from_static_name(REJECTED), &metadata());
        let avg_duration_gauge = recorder.register_gauge(&Key::from_static_name(AVG_DURATION), &metadata());
        let total_counter = recorder.register_counter(&Key::from_static_name(TOTAL), &metadata());
        let deadline_counter =
            recorder.register_counter(&Key::from_static_name(DEADLINE_EXCEEDED), &metadata());
        let backpressure_counters = PoolKind::ALL.map(|kind| pool_counter(&recorder, BACKPRESSURE, kind));
        let failure_counters = PoolKind::ALL.map(|kind| pool_counter(&recorder, JOB_FAILURES, kind));

        // Render every series from the first scrape, not only after first use.
        concurrent_gauge.set(0.0);
        avg_duration_gauge.set(0.0);
        rejected_counter.increment(0);
        total_counter.increment(0);
        deadline_counter.increment(0);

        Self {
            _recorder: recorder,
            handle,
            concurrent_gauge,
            rejected_counter,
            avg_duration_gauge,
            total_counter,
            deadline_counter,
            backpressure_counters,
            failure_counters,
            concurrent: AtomicI64::new(0),
            rejected: AtomicU64::new(0),
            total: AtomicU64::new(0),
            duration_micros: AtomicU64::new(0),
            deadline_exceeded: AtomicU64::new(0),
        }
    }

    pub fn request_admitted(&self) {
        self.concurrent.fetch_add(1, Ordering::Relaxed);
        self.concurrent_gauge.increment(1.0);
    }

    pub fn request_released(&self) {
        self.concurrent.fetch_sub(1, Ordering::Relaxed);
        self.concurrent_gauge.decrement(1.0);
    }

    pub fn admission_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.rejected_counter.increment(1);
    }

    pub fn deadline_exceeded(&self) {
        self.deadline_exceeded.fetch_add(1, Ordering::Relaxed);
        self.deadline_counter.increment(1);
    }

    pub fn backpressure(&self, pool: PoolKind) {
        self.backpressure_counters[pool.index()].increment(1);
    }

    pub fn job_failed(&self, pool: PoolKind) {
        self.failure_counters[pool.index()].increment(1);
    }

    /// Record one finished request and refresh the average.
    pub fn observe_request(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let sum = self.duration_micros.fetch_add(micros, Ordering::Relaxed).saturating_add(micros);
        let count = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        self.total_counter.increment(1);
        self.avg_duration_gauge.set(average_millis(sum, count));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        MetricsSnapshot {
            concurrent: self.concurrent.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            total,
            avg_duration_ms: average_millis(self.duration_micros.load(Ordering::Relaxed), total),
            deadline_exceeded: self.deadline_exceeded.load(Ordering::Relaxed),
        }
    }

    /// Prometheus text exposition of every series.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn average_millis(sum_micros: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum_micros as f64 / count as f64 / 1_000.0
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

fn describe_counter(recorder: &PrometheusRecorder, name: &'static str, help: &'static str) {
    recorder.describe_counter(KeyName::from(name), None, SharedString::from(help));
}

fn describe_gauge(recorder: &PrometheusRecorder, name: &'static str, help: &'static str) {
    let unit = (name == AVG_DURATION).then_some(Unit::Milliseconds);
    recorder.describe_gauge(KeyName::from(name), unit, SharedString::from(help));
}

fn pool_counter(recorder: &PrometheusRecorder, name: &'static str, pool: PoolKind) -> Counter {
    let key = Key::from_parts(name, vec![Label::new("pool", pool.as_str())]);
    let counter = recorder.register_counter(&key, &metadata());
    counter.increment(0);
    counter
}
