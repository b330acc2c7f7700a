//! Token accounting for wrapper responses.

use log::debug;
use serde_json::Value;

use crate::collaborators::TokenCalculationService;
use crate::constants;
use crate::providers::{LlmResponse, Params, TokenUsage};

/// Usage for a response produced by a pool instance.
///
/// Order of preference: usage reported by the client, usage found in the
/// response metadata (`token_usage` or `usage`), an estimate from the token
/// service, and finally a length-based estimate.
pub fn resolve_pool_usage(response: &LlmResponse, token_service: Option<&dyn TokenCalculationService>) -> TokenUsage {
    if let Some(usage) = response.usage {
        return usage;
    }
    if let Some(usage) = usage_from_metadata(response) {
        return usage;
    }

    let completion_tokens = token_service
        .and_then(|service| {
            service
                .calculate_tokens(
                    &response.content,
                    constants::TOKEN_ESTIMATE_PROVIDER,
                    constants::TOKEN_ESTIMATE_MODEL,
                )
                .map_err(|e| debug!("Token service unavailable, estimating from length: {}", e))
                .ok()
        })
        .unwrap_or_else(|| (char_len(&response.content) / 4).max(1));

    TokenUsage::new(completion_tokens.max(constants::MIN_PROMPT_TOKENS), completion_tokens)
}

/// Usage for a response produced on the task-group path.
///
/// Explicit usage passed in `params["token_usage"]` wins; otherwise the
/// prompt is estimated at a quarter of the content length and the completion
/// at half of that.
pub fn estimate_task_group_usage(content: &str, params: &Params) -> TokenUsage {
    if let Some(usage) = params.get("token_usage").and_then(TokenUsage::from_value) {
        return usage;
    }
    let prompt_tokens = (char_len(content) / 4).max(1);
    TokenUsage::new(prompt_tokens, prompt_tokens / 2)
}

fn usage_from_metadata(response: &LlmResponse) -> Option<TokenUsage> {
    ["token_usage", "usage"]
        .iter()
        .filter_map(|key| response.metadata.get(*key))
        .find_map(|value: &Value| TokenUsage::from_value(value))
}

fn char_len(content: &str) -> u32 {
    u32::try_from(content.chars().count()).unwrap_or(u32::MAX)
}
