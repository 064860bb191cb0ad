use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use crate::jobs::NormalizedStatus;

/// Metric name prefix for all orchestrator metrics
const PREFIX: &str = "aef";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 60.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Orchestration Metrics
    pub static ref ORCHESTRATION_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_orchestration_calls_total"), "Orchestration calls by outcome"),
        &["call_type", "outcome"]
    ).expect("Failed to create orchestration_calls_total metric");

    pub static ref AUDIT_ROWS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_audit_rows_total"), "Rows appended to the control table"),
        &["job_status"]
    ).expect("Failed to create audit_rows_total metric");

    // Pipeline Metrics
    pub static ref PIPELINE_TRIGGERS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_pipeline_triggers_total"), "Pipeline trigger calls by outcome"),
        &["outcome"]
    ).expect("Failed to create pipeline_triggers_total metric");

    // Scheduling Metrics
    pub static ref RECONCILE_EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_reconcile_events_total"), "Change-feed events by kind and outcome"),
        &["change", "outcome"]
    ).expect("Failed to create reconcile_events_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ORCHESTRATION_CALLS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(AUDIT_ROWS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_TRIGGERS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RECONCILE_EVENTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record one orchestration call; `outcome` is a status or an error kind.
pub fn record_orchestration_call(call_type: &str, outcome: &str) {
    ORCHESTRATION_CALLS_TOTAL
        .with_label_values(&[call_type, outcome])
        .inc();
}

pub fn record_audit_row(status: NormalizedStatus) {
    AUDIT_ROWS_TOTAL.with_label_values(&[status.as_str()]).inc();
}

pub fn record_pipeline_trigger(outcome: &str) {
    PIPELINE_TRIGGERS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_reconcile_event(change: &str, outcome: &str) {
    RECONCILE_EVENTS_TOTAL
        .with_label_values(&[change, outcome])
        .inc();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // RSS is reported in kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
