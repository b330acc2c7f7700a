//! Metric recording functions

use std::time::Duration;

use crate::errors::WrapperError;

use super::{labels, names};

/// Record one top-level wrapper call
pub fn record_wrapper_request(
    wrapper_type: &str,
    wrapper: &str,
    error: Option<&WrapperError>,
    duration: Duration,
) {
    metrics::counter!(
        names::WRAPPER_REQUESTS_TOTAL,
        labels::keys::WRAPPER_TYPE => wrapper_type.to_string(),
        labels::keys::WRAPPER => wrapper.to_string()
    )
    .increment(1);

    // Failures are timed too
    metrics::histogram!(
        names::WRAPPER_REQUEST_DURATION,
        labels::keys::WRAPPER_TYPE => wrapper_type.to_string(),
        labels::keys::WRAPPER => wrapper.to_string()
    )
    .record(duration.as_secs_f64());

    if let Some(error) = error {
        metrics::counter!(
            names::WRAPPER_ERRORS_TOTAL,
            labels::keys::WRAPPER => wrapper.to_string(),
            labels::keys::ERROR_TYPE => labels::wrapper_error_label(error).to_string()
        )
        .increment(1);
    }
}

/// Record one call made on a pool instance
pub fn record_instance_attempt(pool: &str, instance: &str, success: bool) {
    metrics::counter!(
        names::INSTANCE_ATTEMPTS_TOTAL,
        labels::keys::POOL => pool.to_string(),
        labels::keys::INSTANCE => instance.to_string(),
        labels::keys::OUTCOME => labels::outcome_label(success).to_string()
    )
    .increment(1);
}

/// Update pool health gauges
pub fn set_pool_health(pool: &str, healthy: bool, health_ratio: f64) {
    metrics::gauge!(
        names::POOL_HEALTHY,
        labels::keys::POOL => pool.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });

    metrics::gauge!(
        names::POOL_HEALTH_RATIO,
        labels::keys::POOL => pool.to_string()
    )
    .set(health_ratio);
}

/// Record a failed fallback execution
pub fn record_fallback_failure(wrapper: &str, target: &str) {
    metrics::counter!(
        names::FALLBACK_FAILURES_TOTAL,
        labels::keys::WRAPPER => wrapper.to_string(),
        labels::keys::TARGET => target.to_string()
    )
    .increment(1);
}
