//! HTTP transports injected into provider clients.
//!
//! A transport is a configured `reqwest::Client` (timeout, auth and extra
//! headers) plus the endpoint metadata a provider client needs. Transports are
//! cached by their full configuration so clients for the same endpoint share a
//! connection pool.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::debug;
use reqwest::{header, Client};
use url::Url;

use crate::constants;
use crate::errors::{LlmError, LlmResult};

const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Inputs for building a transport
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Seconds; defaults to 30
    pub timeout: Option<f64>,
    /// Defaults to 3
    pub max_retries: Option<u32>,
    pub headers: HashMap<String, String>,
}

impl TransportOptions {
    fn cache_key(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.api_key.hash(&mut hasher);
        let mut headers: Vec<_> = self.headers.iter().collect();
        headers.sort();
        headers.hash(&mut hasher);
        format!(
            "{}|{}|{}|{:?}|{:?}|{:x}",
            self.provider,
            self.model,
            self.base_url.as_deref().unwrap_or_default(),
            self.timeout,
            self.max_retries,
            hasher.finish()
        )
    }
}

/// A configured HTTP client bound to one provider endpoint
#[derive(Debug)]
pub struct HttpTransport {
    provider: String,
    model: String,
    base_url: Option<Url>,
    timeout: Duration,
    max_retries: u32,
    headers: HashMap<String, String>,
    client: Client,
}

impl HttpTransport {
    /// Build a transport, validating the base URL and timeout
    pub fn new(options: &TransportOptions) -> LlmResult<Self> {
        let timeout_secs = options.timeout.unwrap_or(constants::DEFAULT_TIMEOUT_SECS);
        let timeout = Duration::try_from_secs_f64(timeout_secs).map_err(|e| {
            LlmError::ConfigError(format!("Invalid timeout {} for {}: {}", timeout_secs, options.provider, e))
        })?;

        let base_url = match options.base_url.as_deref() {
            Some(raw) if !raw.is_empty() => Some(Url::parse(raw).map_err(|e| {
                LlmError::ConfigError(format!("Invalid base_url '{}' for {}: {}", raw, options.provider, e))
            })?),
            _ => None,
        };

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(build_headers(options)?)
            .build()?;

        Ok(Self {
            provider: options.provider.clone(),
            model: options.model.clone(),
            base_url,
            timeout,
            max_retries: options.max_retries.unwrap_or(constants::DEFAULT_MAX_RETRIES),
            headers: options.headers.clone(),
            client,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Custom headers sent with every request, besides auth
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

/// Build auth and custom headers for a provider
fn build_headers(options: &TransportOptions) -> LlmResult<header::HeaderMap> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

    if let Some(api_key) = options.api_key.as_deref().filter(|key| !key.is_empty()) {
        let invalid = |e: header::InvalidHeaderValue| {
            LlmError::ConfigError(format!("Invalid API key format for {}: {}", options.provider, e))
        };
        match options.provider.as_str() {
            "anthropic" | "claude" => {
                headers.insert("x-api-key", header::HeaderValue::from_str(api_key).map_err(invalid)?);
                headers.insert("anthropic-version", header::HeaderValue::from_static(ANTHROPIC_API_VERSION));
            }
            "gemini" => {
                headers.insert("x-goog-api-key", header::HeaderValue::from_str(api_key).map_err(invalid)?);
            }
            _ => {
                headers.insert(
                    header::AUTHORIZATION,
                    header::HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(invalid)?,
                );
            }
        }
    }

    for (name, value) in &options.headers {
        let name = header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| LlmError::ConfigError(format!("Invalid header name '{}': {}", name, e)))?;
        let value = header::HeaderValue::from_str(value)
            .map_err(|e| LlmError::ConfigError(format!("Invalid value for header '{}': {}", name, e)))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Builds and caches transports by configuration
#[derive(Default)]
pub struct TransportFactory {
    cache: Mutex<HashMap<String, Arc<HttpTransport>>>,
}

impl TransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached transport for these options or build a new one
    pub fn create_transport(&self, options: &TransportOptions) -> LlmResult<Arc<HttpTransport>> {
        let key = options.cache_key();
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = cache.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let transport = Arc::new(HttpTransport::new(options)?);
        debug!("Built HTTP transport for {} ({})", options.provider, options.model);
        cache.insert(key, Arc::clone(&transport));
        Ok(transport)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
