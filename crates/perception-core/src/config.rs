use crate::app_config::{EngineConfig, Environment};
use crate::ConfigError;

/// Load engine configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_engine_config() -> Result<EngineConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_engine_config_from_env()
}

/// Load engine configuration from environment variables already in the process.
///
/// Unlike [`load_engine_config`], this does NOT load `.env` files. Useful for
/// testing or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_engine_config_from_env() -> Result<EngineConfig, ConfigError> {
    build_engine_config(|key| std::env::var(key))
}

/// Build engine configuration using the provided env-var lookup function.
///
/// The parsing and validation logic is decoupled from the process environment
/// so it can be tested with a pure `HashMap` lookup.
fn build_engine_config<F>(lookup: F) -> Result<EngineConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let store_url = require("PERCEPTION_STORE_URL")?;
    let store_token = lookup("PERCEPTION_STORE_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());

    let env = parse_environment(&or_default("PERCEPTION_ENV", "development"))?;

    let bind_addr = parse_addr("PERCEPTION_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("PERCEPTION_LOG_LEVEL", "info");

    let page_size = parse_u32("PERCEPTION_PAGE_SIZE", "1000")?;
    if page_size == 0 {
        return Err(invalid("PERCEPTION_PAGE_SIZE", "must be at least 1".into()));
    }
    let max_pages = parse_usize("PERCEPTION_MAX_PAGES", "500")?;
    let debounce_ms = parse_u64("PERCEPTION_DEBOUNCE_MS", "150")?;
    let cache_ttl_secs = parse_u64("PERCEPTION_CACHE_TTL_SECS", "300")?;
    let max_retries = parse_u32("PERCEPTION_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("PERCEPTION_RETRY_BACKOFF_BASE_MS", "500")?;
    let request_timeout_secs = parse_u64("PERCEPTION_REQUEST_TIMEOUT_SECS", "30")?;
    let accept_partial = parse_bool("PERCEPTION_ACCEPT_PARTIAL", "false")?;
    let normalizer_path = lookup("PERCEPTION_NORMALIZER_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    Ok(EngineConfig {
        store_url,
        store_token,
        env,
        bind_addr,
        log_level,
        page_size,
        max_pages,
        debounce_ms,
        cache_ttl_secs,
        max_retries,
        retry_backoff_base_ms,
        request_timeout_secs,
        accept_partial,
        normalizer_path,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for unrecognised values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim() {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PERCEPTION_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
