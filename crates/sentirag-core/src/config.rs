use std::str::FromStr;

use crate::app_config::{AppConfig, Environment};
use crate::tiers::TickerTiers;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Blank values count as unset so `FOO=` in a .env file disables a backend.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_hours = |var: &str, default: i64| -> Result<i64, ConfigError> {
        let hours = parse_or(&lookup, var, default)?;
        if hours > 0 {
            Ok(hours)
        } else {
            Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("must be a positive number of hours, got {hours}"),
            })
        }
    };

    let database_url = optional("DATABASE_URL");
    let env = parse_environment(&or_default("SENTIRAG_ENV", "development"))?;
    let log_level = or_default("SENTIRAG_LOG_LEVEL", "info");

    let db_max_connections = parse_or(&lookup, "SENTIRAG_DB_MAX_CONNECTIONS", 10)?;
    let db_min_connections = parse_or(&lookup, "SENTIRAG_DB_MIN_CONNECTIONS", 1)?;
    let db_acquire_timeout_secs = parse_or(&lookup, "SENTIRAG_DB_ACQUIRE_TIMEOUT_SECS", 10)?;

    let redis_url = optional("REDIS_URL");
    let tei_embed_url = optional("SENTIRAG_TEI_EMBED_URL");
    let tei_classify_url = optional("SENTIRAG_TEI_CLASSIFY_URL");

    let openai_api_key = optional("OPENAI_API_KEY");
    let llm_base_url = or_default("SENTIRAG_LLM_BASE_URL", "https://api.openai.com/v1");
    let llm_model = or_default("SENTIRAG_LLM_MODEL", "gpt-3.5-turbo");
    let llm_timeout_secs = parse_or(&lookup, "SENTIRAG_LLM_TIMEOUT_SECS", 30)?;

    let answer_cache_ttl_secs = parse_or(&lookup, "ANSWER_CACHE_TTL_SEC", 1800)?;
    let retention_hours = parse_hours("RETENTION_HOURS", 24)?;
    let retrieval_k = parse_or(&lookup, "SENTIRAG_RETRIEVAL_K", 12)?;
    let retrieval_window_hours = parse_hours("SENTIRAG_RETRIEVAL_WINDOW_HOURS", 24)?;
    let ingest_max_concurrent_tickers =
        parse_or(&lookup, "SENTIRAG_INGEST_MAX_CONCURRENT_TICKERS", 1)?;

    let ticker_tiers = TickerTiers::from_json(&or_default("TICKER_TIERS_JSON", "{}"))?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        redis_url,
        tei_embed_url,
        tei_classify_url,
        openai_api_key,
        llm_base_url,
        llm_model,
        llm_timeout_secs,
        answer_cache_ttl_secs,
        retention_hours,
        retrieval_k,
        retrieval_window_hours,
        ingest_max_concurrent_tickers,
        ticker_tiers,
    })
}

/// Parse `var` when set, otherwise return `default`.
fn parse_or<T, F>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    match lookup(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SENTIRAG_ENV".to_string(),
            reason: format!("expected development|test|production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
