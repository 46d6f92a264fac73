//! Metrics and observability utilities
//!
//! Prometheus metrics for HTTP traffic, the upload pipeline and the
//! contract query layer.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ContractDesk metrics
pub const METRICS_PREFIX: &str = "contractdesk";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for file uploads; large documents take a while to reach the bucket
pub const UPLOAD_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00, 30.00, 60.00];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Uploaded files by outcome and failing stage"
    );

    describe_counter!(
        format!("{}_upload_bytes_total", METRICS_PREFIX),
        Unit::Bytes,
        "Bytes of successfully stored files"
    );

    describe_histogram!(
        format!("{}_upload_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Per-file upload latency in seconds"
    );

    describe_counter!(
        format!("{}_blob_compensations_total", METRICS_PREFIX),
        Unit::Count,
        "Blobs deleted after their metadata insert failed"
    );

    describe_counter!(
        format!("{}_signed_url_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Documents returned without a signed URL"
    );

    describe_counter!(
        format!("{}_degraded_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Queries answered with an empty result after a backend error"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one processed upload file. `stage` is set for failures.
pub fn record_upload(duration_secs: f64, bytes: usize, stage: Option<&str>) {
    let outcome = if stage.is_some() { "failed" } else { "stored" };

    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "outcome" => outcome,
        "stage" => stage.unwrap_or("none").to_string()
    )
    .increment(1);

    if stage.is_none() {
        counter!(format!("{}_upload_bytes_total", METRICS_PREFIX)).increment(bytes as u64);
    }

    histogram!(
        format!("{}_upload_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome
    )
    .record(duration_secs);
}

/// Record a compensating blob delete and whether it succeeded
pub fn record_compensation(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        format!("{}_blob_compensations_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);
}

pub fn record_signed_url_failure() {
    counter!(format!("{}_signed_url_failures_total", METRICS_PREFIX)).increment(1);
}

/// Record a query that fell back to an empty result
pub fn record_degraded_query(query: &'static str) {
    counter!(
        format!("{}_degraded_queries_total", METRICS_PREFIX),
        "query" => query
    )
    .increment(1);
}
