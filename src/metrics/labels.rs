//! Label helpers for consistent metric labeling

use crate::errors::WrapperError;

/// Standard label keys
pub mod keys {
    /// Wrapper kind label key
    pub const WRAPPER_TYPE: &str = "wrapper_type";
    /// Wrapper name label key
    pub const WRAPPER: &str = "wrapper";
    /// Pool name label key
    pub const POOL: &str = "pool";
    /// Instance id label key
    pub const INSTANCE: &str = "instance";
    /// Attempt outcome label key
    pub const OUTCOME: &str = "outcome";
    /// Task group target label key
    pub const TARGET: &str = "target";
    /// Error type label key
    pub const ERROR_TYPE: &str = "error_type";
}

/// Convert WrapperError to error type label string
pub fn wrapper_error_label(error: &WrapperError) -> &'static str {
    match error {
        WrapperError::ClientCreation { .. } => "client_creation",
        WrapperError::UnsupportedModelType { .. } => "unsupported_model_type",
        WrapperError::PollingPool { .. } => "polling_pool",
        WrapperError::TaskGroup { .. } => "task_group",
        WrapperError::Factory { .. } => "factory",
        WrapperError::Config { .. } => "config",
        WrapperError::Execution { .. } => "execution",
    }
}

/// Label value for an instance attempt outcome
pub fn outcome_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
