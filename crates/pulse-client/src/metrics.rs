//! Subscription metrics.
//!
//! Uses the `metrics` crate for instrumentation. Installing a recorder or
//! exporter is left to the application.

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const SUBSCRIBE_ATTEMPTS_TOTAL: &str = "pulse_client_subscribe_attempts_total";
    pub const SUBSCRIBE_SUCCESS_TOTAL: &str = "pulse_client_subscribe_success_total";
    pub const SUBSCRIBE_ERRORS_TOTAL: &str = "pulse_client_subscribe_errors_total";
    pub const RECONNECT_REQUESTS_TOTAL: &str = "pulse_client_reconnect_requests_total";
    pub const WAIT_TIMEOUTS_TOTAL: &str = "pulse_client_wait_timeouts_total";
    pub const WAITERS_PENDING: &str = "pulse_client_waiters_pending";
}

/// Describe all subscription metrics to the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::SUBSCRIBE_ATTEMPTS_TOTAL,
        "Total number of subscribe requests started"
    );
    metrics::describe_counter!(
        names::SUBSCRIBE_SUCCESS_TOTAL,
        "Total number of successful subscribe replies"
    );
    metrics::describe_counter!(
        names::SUBSCRIBE_ERRORS_TOTAL,
        "Total number of subscribe replies rejected by the server"
    );
    metrics::describe_counter!(
        names::RECONNECT_REQUESTS_TOTAL,
        "Total number of reconnects requested by subscriptions"
    );
    metrics::describe_counter!(
        names::WAIT_TIMEOUTS_TOTAL,
        "Total number of operations that timed out waiting for a subscription"
    );
    metrics::describe_gauge!(
        names::WAITERS_PENDING,
        "Current number of operations waiting for a subscription"
    );
}

/// Record the start of a subscribe request.
pub fn record_subscribe_attempt() {
    counter!(names::SUBSCRIBE_ATTEMPTS_TOTAL).increment(1);
}

/// Record a successful subscribe reply.
pub fn record_subscribe_success(resubscribe: bool) {
    counter!(names::SUBSCRIBE_SUCCESS_TOTAL, "resubscribe" => resubscribe.to_string())
        .increment(1);
}

/// Record a subscribe reply error.
pub fn record_subscribe_error(code: u32) {
    counter!(names::SUBSCRIBE_ERRORS_TOTAL, "code" => code.to_string()).increment(1);
}

/// Record a reconnect request.
pub fn record_reconnect_request(reason: &'static str) {
    counter!(names::RECONNECT_REQUESTS_TOTAL, "reason" => reason).increment(1);
}

/// Record a wait that hit its deadline.
pub fn record_wait_timeout() {
    counter!(names::WAIT_TIMEOUTS_TOTAL).increment(1);
}

/// Adjust the pending waiter gauge.
pub fn add_pending_waiters(delta: f64) {
    gauge!(names::WAITERS_PENDING).increment(delta);
}
