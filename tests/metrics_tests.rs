//! Tests for the metrics module.
//!
//! These tests verify the label generation and other metrics utilities.
//! Note: Actual metric recording tests require a metrics recorder to be installed.

#[cfg(feature = "metrics")]
mod metrics_tests {
    use std::time::Duration;

    use llm_wrappers::metrics::labels::{keys, outcome_label, wrapper_error_label};
    use llm_wrappers::metrics::{record_instance_attempt, record_wrapper_request, set_pool_health};
    use llm_wrappers::WrapperError;

    #[test]
    fn test_wrapper_error_labels() {
        assert_eq!(wrapper_error_label(&WrapperError::polling_pool("x")), "polling_pool");
        assert_eq!(wrapper_error_label(&WrapperError::task_group("x")), "task_group");
        assert_eq!(wrapper_error_label(&WrapperError::client_creation("x")), "client_creation");
        assert_eq!(
            wrapper_error_label(&WrapperError::unsupported_model_type("x", vec![])),
            "unsupported_model_type"
        );
        assert_eq!(wrapper_error_label(&WrapperError::factory("x")), "factory");
        assert_eq!(wrapper_error_label(&WrapperError::config("x")), "config");
        assert_eq!(wrapper_error_label(&WrapperError::execution("x")), "execution");
    }

    #[test]
    fn test_outcome_label() {
        assert_eq!(outcome_label(true), "success");
        assert_eq!(outcome_label(false), "failure");
    }

    #[test]
    fn test_label_keys() {
        assert_eq!(keys::WRAPPER_TYPE, "wrapper_type");
        assert_eq!(keys::POOL, "pool");
        assert_eq!(keys::INSTANCE, "instance");
        assert_eq!(keys::ERROR_TYPE, "error_type");
    }

    #[test]
    fn test_recording_without_recorder_does_not_panic() {
        llm_wrappers::describe_metrics();
        record_wrapper_request("polling_pool", "w", Some(&WrapperError::polling_pool("x")), Duration::from_millis(5));
        record_wrapper_request("task_group", "t", None, Duration::from_millis(5));
        record_instance_attempt("p", "a", true);
        set_pool_health("p", true, 0.6);
    }
}
