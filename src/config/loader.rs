//! Configuration file loading and environment variable resolution.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

use regex::Regex;

use crate::errors::{LlmError, LlmResult};
use crate::providers::ClientConfig;
use super::types::Config;

/// Load and parse a TOML configuration file.
///
/// # Arguments
/// * `path` - Path to the TOML configuration file
///
/// # Returns
/// * `LlmResult<Config>` - Parsed configuration with environment variables resolved
///
/// # Example
/// ```no_run
/// use llm_wrappers::config::load_config;
///
/// let config = load_config("wrappers.toml").unwrap();
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> LlmResult<Config> {
    let path = path.as_ref();

    let content = fs::read_to_string(path).map_err(|e| {
        LlmError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&content)
}

/// Parse a TOML configuration string.
///
/// # Arguments
/// * `content` - TOML configuration string
///
/// # Returns
/// * `LlmResult<Config>` - Parsed configuration with environment variables resolved
pub fn parse_config(content: &str) -> LlmResult<Config> {
    let mut config: Config = toml::from_str(content).map_err(|e| {
        LlmError::ConfigError(format!("Failed to parse TOML: {}", e))
    })?;

    resolve_env_vars(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Resolve environment variable references in the configuration.
///
/// Environment variables are specified using the `${VAR_NAME}` syntax in
/// `api_key`, `base_url` and header values of models and pool instances.
fn resolve_env_vars(config: &mut Config) -> LlmResult<()> {
    let env_var_pattern = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| LlmError::ConfigError(format!("Invalid env var pattern: {}", e)))?;

    for (idx, model) in config.models.iter_mut().enumerate() {
        resolve_client_env(&mut model.client, &format!("models[{}]", idx), &env_var_pattern)?;
    }

    for (pool_name, pool) in config.pools.iter_mut() {
        for (idx, instance) in pool.instances.iter_mut().enumerate() {
            let location = format!("pools.{}.instances[{}]", pool_name, idx);
            resolve_client_env(&mut instance.client, &location, &env_var_pattern)?;
        }
    }

    Ok(())
}

fn resolve_client_env(client: &mut ClientConfig, location: &str, pattern: &Regex) -> LlmResult<()> {
    if let Some(api_key) = &client.api_key {
        client.api_key = Some(resolve_env_var_string(api_key, pattern, &format!("{}.api_key", location))?);
    }
    if let Some(base_url) = &client.base_url {
        client.base_url = Some(resolve_env_var_string(base_url, pattern, &format!("{}.base_url", location))?);
    }
    for (header, value) in client.headers.iter_mut() {
        *value = resolve_env_var_string(value, pattern, &format!("{}.headers.{}", location, header))?;
    }
    Ok(())
}

/// Resolve environment variables in a single string.
/// Strings without references are returned unchanged.
fn resolve_env_var_string(s: &str, pattern: &Regex, location: &str) -> LlmResult<String> {
    let mut result = s.to_string();

    for caps in pattern.captures_iter(s) {
        let full_match = &caps[0];
        let var_name = &caps[1];

        match env::var(var_name) {
            Ok(value) => {
                result = result.replace(full_match, &value);
            }
            Err(_) => {
                return Err(LlmError::ConfigError(format!(
                    "Environment variable '{}' not found\n  \
                     → Referenced in {}\n  \
                     → Set it with: export {}=\"your-value\"",
                    var_name, location, var_name
                )));
            }
        }
    }

    Ok(result)
}

/// Validate the configuration for consistency.
fn validate_config(config: &Config) -> LlmResult<()> {
    if config.settings.max_instance_attempts == 0 {
        return Err(LlmError::ConfigError(
            "settings.max_instance_attempts must be at least 1".to_string(),
        ));
    }

    let mut model_names = HashSet::new();
    for (idx, model) in config.models.iter().enumerate() {
        if model.name.trim().is_empty() {
            return Err(LlmError::ConfigError(format!(
                "Model name is empty in models[{}]",
                idx
            )));
        }
        if !model_names.insert(model.name.as_str()) {
            return Err(LlmError::ConfigError(format!(
                "Model '{}' is defined more than once\n  \
                 → Model names must be unique",
                model.name
            )));
        }
    }

    for (pool_name, pool) in &config.pools {
        let mut ids = HashSet::new();
        for (idx, instance) in pool.instances.iter().enumerate() {
            if instance.id.trim().is_empty() {
                return Err(LlmError::ConfigError(format!(
                    "Instance id is empty in pools.{}.instances[{}]",
                    pool_name, idx
                )));
            }
            if !ids.insert(instance.id.as_str()) {
                return Err(LlmError::ConfigError(format!(
                    "Instance '{}' appears more than once in pool '{}'",
                    instance.id, pool_name
                )));
            }
        }
    }

    // Fallback groups must point at defined task groups
    for (group_name, group) in &config.task_groups {
        for fallback in &group.fallback_groups {
            if !config.task_groups.contains_key(fallback) {
                return Err(LlmError::ConfigError(format!(
                    "Fallback group '{}' referenced by task group '{}' is not defined\n  \
                     → Define it in a [task_groups.{}] section or remove it from fallback_groups",
                    fallback, group_name, fallback
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ExternalConfigResolver;
    use crate::config::StaticConfigResolver;
    use crate::pool::{PollingPoolManager, RotationStrategyKind};
    use crate::collaborators::TaskGroupManager;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[[models]]
name = "chat"
model_type = "mock"
api_key = "test-key"
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models[0].client.api_key.as_deref(), Some("test-key"));
        assert!(config.wrappers.is_empty());
    }

    #[test]
    fn test_env_var_resolution() {
        env::set_var("WRAPPERS_TEST_API_KEY", "resolved-key");

        let toml = r#"
[pools.main]
instances = [{ id = "a", model_type = "mock", api_key = "${WRAPPERS_TEST_API_KEY}" }]
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(
            config.pools["main"].instances[0].client.api_key.as_deref(),
            Some("resolved-key")
        );

        env::remove_var("WRAPPERS_TEST_API_KEY");
    }

    #[test]
    fn test_missing_env_var() {
        let toml = r#"
[[models]]
name = "chat"
api_key = "${WRAPPERS_TEST_SURELY_UNSET}"
"#;

        let err = parse_config(toml).unwrap_err().to_string();
        assert!(err.contains("WRAPPERS_TEST_SURELY_UNSET"));
        assert!(err.contains("models[0].api_key"));
    }

    #[test]
    fn test_duplicate_model_names() {
        let toml = r#"
[[models]]
name = "chat"

[[models]]
name = "chat"
"#;

        let err = parse_config(toml).unwrap_err().to_string();
        assert!(err.contains("more than once"));
    }

    #[test]
    fn test_duplicate_instance_ids() {
        let toml = r#"
[pools.main]
instances = [{ id = "a" }, { id = "a" }]
"#;

        assert!(parse_config(toml).is_err());
    }

    #[test]
    fn test_undefined_fallback_group() {
        let toml = r#"
[task_groups.chat]
fallback_groups = ["missing"]
"#;

        let err = parse_config(toml).unwrap_err().to_string();
        assert!(err.contains("not defined"));
    }

    #[test]
    fn test_default_settings() {
        let config = parse_config("").unwrap();
        assert!(config.settings.cache_enabled);
        assert_eq!(config.settings.cache_max_size, 100);
        assert_eq!(config.settings.max_instance_attempts, 2);
    }

    #[test]
    fn test_builds_collaborators() {
        let toml = r#"
[settings]
cache_max_size = 5
max_instance_attempts = 4

[[models]]
name = "fast"
model_type = "mock"

[task_groups.chat]
echelons.primary = { models = ["fast"] }

[pools.main]
rotation_strategy = "least_used"
failure_threshold = 1
instances = [{ id = "a", model_type = "mock" }]

[wrappers.pool]
type = "polling_pool"
pool = "main"

[wrappers.explicit]
type = "polling_pool"
max_instance_attempts = 1

[wrappers.chat]
type = "task_group"
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.pools["main"].config.rotation_strategy, RotationStrategyKind::LeastUsed);

        let resolver = StaticConfigResolver::from_config(&config);
        assert_eq!(resolver.get_module_config().cache_max_size, 5);
        let fast = resolver.get_client_config("fast").unwrap();
        assert_eq!(fast.model_name.as_deref(), Some("fast"));
        assert!(resolver.get_client_config("slow").is_none());

        let groups = config.build_task_group_manager();
        assert_eq!(groups.get_models_for_group("chat.primary").unwrap(), vec!["fast"]);

        let pools = config.build_pool_manager();
        assert_eq!(pools.pool_names(), vec!["main"]);

        let definitions = config.wrapper_definitions();
        assert_eq!(definitions["pool"]["max_instance_attempts"], 4);
        assert_eq!(definitions["explicit"]["max_instance_attempts"], 1);
        assert!(!definitions["chat"].contains_key("max_instance_attempts"));
    }
}
