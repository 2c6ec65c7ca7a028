//! Configuration loading helper functions
//! Provides utilities for loading configuration with fallback logic

use tracing::debug;

/// Get string configuration value with priority: explicit > ENV > Default
pub fn get_string_config(
    explicit: Option<String>,
    is_default: bool,
    env_var: &str,
    default: String,
) -> String {
    if let Some(val) = explicit {
        if !val.is_empty() && !is_default {
            return val;
        }
    }

    if let Ok(env_val) = std::env::var(env_var) {
        if !env_val.is_empty() {
            debug!("Using {} from environment", env_var);
            return env_val;
        }
    }

    default
}
