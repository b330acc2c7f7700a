use std::time::Duration;

// Wrappers
pub const DEFAULT_MAX_INSTANCE_ATTEMPTS: usize = 2;
pub const FALLBACK_HISTORY_LIMIT: usize = 100;
pub const ROTATION_HISTORY_LIMIT: usize = 1000;
pub const STREAM_CHUNK_CHARS: usize = 10;
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

// Client cache
pub const DEFAULT_CLIENT_CACHE_SIZE: usize = 100;

// Transport
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// Instance defaults applied when a pool instance leaves a field unset
pub const DEFAULT_INSTANCE_MODEL_TYPE: &str = "openai";
pub const DEFAULT_INSTANCE_MODEL_NAME: &str = "gpt-3.5-turbo";
pub const DEFAULT_INSTANCE_TEMPERATURE: f32 = 0.7;

// Token estimation
pub const TOKEN_ESTIMATE_PROVIDER: &str = "openai";
pub const TOKEN_ESTIMATE_MODEL: &str = "gpt-3.5-turbo";
pub const MIN_PROMPT_TOKENS: u32 = 10;
