//! Metrics module for the wrapper layer
//!
//! This module provides optional metrics emission for monitoring wrappers,
//! pool instances and fallback execution. Enable with the `metrics` feature flag.
//!
//! # Example
//!
//! ```ignore
//! use llm_wrappers::metrics::describe_metrics;
//! use metrics_exporter_prometheus::PrometheusBuilder;
//!
//! // User sets up their preferred exporter
//! PrometheusBuilder::new()
//!     .with_http_listener(([127, 0, 0, 1], 9090))
//!     .install()
//!     .expect("prometheus setup");
//!
//! // Describe metrics (optional, improves Prometheus discovery)
//! describe_metrics();
//! ```

pub mod labels;
mod recorder;

pub use recorder::*;

/// Metric name constants
pub mod names {
    /// Total number of wrapper `generate` calls
    pub const WRAPPER_REQUESTS_TOTAL: &str = "llm_wrapper_requests_total";
    /// Wrapper call duration in seconds
    pub const WRAPPER_REQUEST_DURATION: &str = "llm_wrapper_request_duration_seconds";
    /// Total number of failed wrapper calls by error type
    pub const WRAPPER_ERRORS_TOTAL: &str = "llm_wrapper_errors_total";
    /// Total number of pool instance attempts by outcome
    pub const INSTANCE_ATTEMPTS_TOTAL: &str = "llm_pool_instance_attempts_total";
    /// Pool health status (1=healthy, 0=unhealthy)
    pub const POOL_HEALTHY: &str = "llm_pool_healthy";
    /// Share of healthy instances in a pool
    pub const POOL_HEALTH_RATIO: &str = "llm_pool_health_ratio";
    /// Total number of failed fallback executions
    pub const FALLBACK_FAILURES_TOTAL: &str = "llm_task_group_fallback_failures_total";
}

/// Describe all metrics with their units and descriptions.
/// Call this after setting up your metrics exporter for better discovery.
pub fn describe_metrics() {
    use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

    describe_counter!(
        names::WRAPPER_REQUESTS_TOTAL,
        Unit::Count,
        "Total number of wrapper generate calls"
    );
    describe_histogram!(
        names::WRAPPER_REQUEST_DURATION,
        Unit::Seconds,
        "Wrapper call duration in seconds"
    );
    describe_counter!(
        names::WRAPPER_ERRORS_TOTAL,
        Unit::Count,
        "Total number of failed wrapper calls by error type"
    );
    describe_counter!(
        names::INSTANCE_ATTEMPTS_TOTAL,
        Unit::Count,
        "Total number of pool instance attempts by outcome"
    );
    describe_gauge!(
        names::POOL_HEALTHY,
        Unit::Count,
        "Pool health status (1=healthy, 0=unhealthy)"
    );
    describe_gauge!(
        names::POOL_HEALTH_RATIO,
        Unit::Percent,
        "Share of healthy instances in a pool"
    );
    describe_counter!(
        names::FALLBACK_FAILURES_TOTAL,
        Unit::Count,
        "Total number of failed fallback executions"
    );
}
