//! Configuration module for TOML-based wrapper configuration.
//!
//! Models, task groups, polling pools and wrappers can be declared in a TOML
//! file instead of being assembled in code.
//!
//! # Example Configuration File
//!
//! ```toml
//! [settings]
//! cache_max_size = 50
//! max_instance_attempts = 3
//!
//! [[models]]
//! name = "fast-chat"
//! model_type = "openai"
//! model_name = "gpt-4o-mini"
//! api_key = "${OPENAI_API_KEY}"
//!
//! [task_groups.chat]
//! fallback_groups = ["backup"]
//! echelons.primary = { models = ["fast-chat"] }
//!
//! [pools.gpu]
//! rotation_strategy = "least_used"
//! failure_threshold = 2
//! instances = [
//!     { id = "gpu-1", model_type = "openai", model_name = "gpt-4o", api_key = "${KEY_1}" },
//!     { id = "gpu-2", model_type = "openai", model_name = "gpt-4o", api_key = "${KEY_2}" },
//! ]
//!
//! [wrappers.chat]
//! type = "task_group"
//! target = "chat.primary"
//!
//! [wrappers.gpu]
//! type = "polling_pool"
//! pool = "gpu"
//! ```
//!
//! # Environment Variables
//!
//! API keys, base URLs and header values can reference environment variables
//! using the `${VAR_NAME}` syntax. These are resolved at load time.

mod loader;
mod resolver;
mod types;

pub use loader::{load_config, parse_config};
pub use resolver::StaticConfigResolver;
pub use types::{Config, InstanceDefinition, ModelConfig, PoolDefinition, Settings};
