use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use serde_json::Value;

/// Errors raised by provider clients, transports and pool collaborators
#[derive(Debug)]
pub enum LlmError {
    /// Error from the HTTP client
    RequestError(reqwest::Error),
    /// Error from the API provider
    ApiError(String),
    /// Rate limiting error
    RateLimit(String),
    /// Parsing error
    ParseError(String),
    /// Provider is disabled
    ProviderDisabled(String),
    /// Configuration error
    ConfigError(String),
    /// The call did not finish within its deadline
    Timeout(String),
    /// A collaborator (pool, counter service, ...) could not be reached
    Unavailable(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::RequestError(err) => write!(f, "Request error: {}", err),
            LlmError::ApiError(msg) => write!(f, "API error: {}", msg),
            LlmError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            LlmError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            LlmError::ProviderDisabled(provider) => write!(f, "Provider disabled: {}", provider),
            LlmError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            LlmError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            LlmError::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
        }
    }
}

impl Error for LlmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LlmError::RequestError(err) => Some(err),
            _ => None,
        }
    }
}

/// Convert reqwest errors to LlmError
impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::RequestError(err)
    }
}

/// Convert serde_json errors to LlmError
impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::ParseError(err.to_string())
    }
}

/// Convert std::io::Error to LlmError
impl From<std::io::Error> for LlmError {
    fn from(err: std::io::Error) -> Self {
        LlmError::ConfigError(err.to_string())
    }
}

/// Convert toml parsing errors to LlmError
impl From<toml::de::Error> for LlmError {
    fn from(err: toml::de::Error) -> Self {
        LlmError::ConfigError(err.to_string())
    }
}

/// Result type alias for provider-level operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Structured context attached to every wrapper error
pub type ErrorDetails = BTreeMap<String, Value>;

type BoxedSource = Box<dyn Error + Send + Sync + 'static>;

/// Errors that cross the wrapper and factory boundaries.
///
/// Callers of a wrapper only ever see one of these variants. Each carries a
/// human-readable message plus a `details` map (wrapper type, wrapper name,
/// instance or model ids) for logging and diagnostics.
#[derive(Debug)]
pub enum WrapperError {
    /// A provider client could not be built from its configuration
    ClientCreation { message: String, details: ErrorDetails },
    /// The configured `model_type` has no registered client constructor
    UnsupportedModelType { model_type: String, supported_types: Vec<String> },
    /// Every attempt of a polling pool call failed
    PollingPool { message: String, details: ErrorDetails, source: Option<BoxedSource> },
    /// A task group call failed, possibly after cross-group fallback
    TaskGroup { message: String, details: ErrorDetails, source: Option<BoxedSource> },
    /// Wrapper construction or registration failed in the factory
    Factory { message: String, details: ErrorDetails },
    /// A wrapper definition is malformed
    Config { message: String, details: ErrorDetails },
    /// A wrapper failed outside the pool/task-group specific paths
    Execution { message: String, details: ErrorDetails, source: Option<BoxedSource> },
}

impl WrapperError {
    pub fn client_creation(message: impl Into<String>) -> Self {
        WrapperError::ClientCreation { message: message.into(), details: ErrorDetails::new() }
    }

    pub fn unsupported_model_type(model_type: impl Into<String>, mut supported_types: Vec<String>) -> Self {
        supported_types.sort();
        WrapperError::UnsupportedModelType { model_type: model_type.into(), supported_types }
    }

    pub fn polling_pool(message: impl Into<String>) -> Self {
        WrapperError::PollingPool { message: message.into(), details: ErrorDetails::new(), source: None }
    }

    pub fn task_group(message: impl Into<String>) -> Self {
        WrapperError::TaskGroup { message: message.into(), details: ErrorDetails::new(), source: None }
    }

    pub fn factory(message: impl Into<String>) -> Self {
        WrapperError::Factory { message: message.into(), details: ErrorDetails::new() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        WrapperError::Config { message: message.into(), details: ErrorDetails::new() }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        WrapperError::Execution { message: message.into(), details: ErrorDetails::new(), source: None }
    }

    /// Adds a key to the structured details map.
    ///
    /// `UnsupportedModelType` has a fixed shape and ignores extra details.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some(details) = self.details_mut() {
            details.insert(key.into(), value.into());
        }
        self
    }

    /// Attaches the underlying cause. Only the variants that wrap a failed
    /// call keep a source; the others drop it.
    pub fn with_source<E>(mut self, err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        match &mut self {
            WrapperError::PollingPool { source, .. }
            | WrapperError::TaskGroup { source, .. }
            | WrapperError::Execution { source, .. } => *source = Some(Box::new(err)),
            _ => {}
        }
        self
    }

    /// Public name of the error, as documented for callers
    pub fn kind_name(&self) -> &'static str {
        match self {
            WrapperError::ClientCreation { .. } => "ClientCreationError",
            WrapperError::UnsupportedModelType { .. } => "UnsupportedModelTypeError",
            WrapperError::PollingPool { .. } => "PollingPoolWrapperError",
            WrapperError::TaskGroup { .. } => "TaskGroupWrapperError",
            WrapperError::Factory { .. } => "WrapperFactoryError",
            WrapperError::Config { .. } => "WrapperConfigError",
            WrapperError::Execution { .. } => "WrapperExecutionError",
        }
    }

    pub fn message(&self) -> String {
        match self {
            WrapperError::ClientCreation { message, .. }
            | WrapperError::PollingPool { message, .. }
            | WrapperError::TaskGroup { message, .. }
            | WrapperError::Factory { message, .. }
            | WrapperError::Config { message, .. }
            | WrapperError::Execution { message, .. } => message.clone(),
            WrapperError::UnsupportedModelType { model_type, supported_types } => format!(
                "Unsupported model type '{}' (supported: {})",
                model_type,
                supported_types.join(", ")
            ),
        }
    }

    /// Structured details for this error
    pub fn details(&self) -> ErrorDetails {
        match self {
            WrapperError::UnsupportedModelType { model_type, supported_types } => {
                let mut details = ErrorDetails::new();
                details.insert("model_type".to_string(), Value::from(model_type.clone()));
                details.insert("supported_types".to_string(), Value::from(supported_types.clone()));
                details
            }
            WrapperError::ClientCreation { details, .. }
            | WrapperError::PollingPool { details, .. }
            | WrapperError::TaskGroup { details, .. }
            | WrapperError::Factory { details, .. }
            | WrapperError::Config { details, .. }
            | WrapperError::Execution { details, .. } => details.clone(),
        }
    }

    fn details_mut(&mut self) -> Option<&mut ErrorDetails> {
        match self {
            WrapperError::UnsupportedModelType { .. } => None,
            WrapperError::ClientCreation { details, .. }
            | WrapperError::PollingPool { details, .. }
            | WrapperError::TaskGroup { details, .. }
            | WrapperError::Factory { details, .. }
            | WrapperError::Config { details, .. }
            | WrapperError::Execution { details, .. } => Some(details),
        }
    }
}

impl fmt::Display for WrapperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind_name(), self.message())
    }
}

impl Error for WrapperError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WrapperError::PollingPool { source, .. }
            | WrapperError::TaskGroup { source, .. }
            | WrapperError::Execution { source, .. } => {
                source.as_deref().map(|err| err as &(dyn Error + 'static))
            }
            _ => None,
        }
    }
}

/// Result type alias for wrapper and factory operations
pub type WrapperResult<T> = Result<T, WrapperError>;
