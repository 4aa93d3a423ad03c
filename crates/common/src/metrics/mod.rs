//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming under the `ideabox` prefix.

use crate::db::models::IdeaStatus;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all IdeaBox metrics
pub const METRICS_PREFIX: &str = "ideabox";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s, large uploads
    5.000,  // 5s
    10.00,  // 10s
];

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
        format!("{}_ideas_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Total ideas submitted"
    );

    describe_counter!(
        format!("{}_status_changes_total", METRICS_PREFIX),
        Unit::Count,
        "Idea status changes by target status"
    );

    describe_counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        Unit::Count,
        "Notification attempts by kind and outcome"
    );

    describe_counter!(
        format!("{}_attachment_cleanup_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Attachment files that could not be removed"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    route: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, route: &str) -> Self {
        Self {
            start: Instant::now(),
            route: route.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "route" => self.route.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "route" => self.route,
            "status" => status.to_string()
        )
        .record(duration);
    }
}

pub fn record_submission(attachments: usize) {
    counter!(
        format!("{}_ideas_submitted_total", METRICS_PREFIX),
        "with_attachments" => (attachments > 0).to_string()
    )
    .increment(1);
}

pub fn record_status_change(status: IdeaStatus) {
    counter!(
        format!("{}_status_changes_total", METRICS_PREFIX),
        "status" => status.as_str()
    )
    .increment(1);
}

/// `kind` is one of `new_idea`, `author_confirmation`, `status_change`;
/// `outcome` is one of `sent`, `skipped`, `failed`
pub fn record_notification(kind: &'static str, outcome: &'static str) {
    counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_cleanup_failure() {
    counter!(format!("{}_attachment_cleanup_failures_total", METRICS_PREFIX)).increment(1);
}
