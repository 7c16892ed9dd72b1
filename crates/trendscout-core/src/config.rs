use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files; useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup, no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<i64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("TRENDSCOUT_ENV", "development"));

    let bind_addr = parse("TRENDSCOUT_BIND_ADDR", "0.0.0.0:4000")?;
    let log_level = or_default("TRENDSCOUT_LOG_LEVEL", "info");

    let reddit_client_id = lookup("REDDIT_CLIENT_ID").ok();
    let reddit_client_secret = lookup("REDDIT_CLIENT_SECRET").ok();
    let reddit_user_agent = or_default(
        "TRENDSCOUT_REDDIT_USER_AGENT",
        "trendscout/0.1 (trend-discovery)",
    );
    let reddit_feed = or_default("TRENDSCOUT_REDDIT_FEED", "popular");

    let x_bearer_token = lookup("X_BEARER_TOKEN").ok();
    let x_search_query = or_default(
        "TRENDSCOUT_X_SEARCH_QUERY",
        "(viral OR trending) lang:en -is:retweet",
    );

    let insight_service_url = lookup("TRENDSCOUT_INSIGHT_URL").ok();
    let insight_timeout_secs = parse_u64("TRENDSCOUT_INSIGHT_TIMEOUT_SECS", "10")?;

    let db_max_connections = parse_u32("TRENDSCOUT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("TRENDSCOUT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("TRENDSCOUT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let source_request_timeout_secs = parse_u64("TRENDSCOUT_SOURCE_REQUEST_TIMEOUT_SECS", "30")?;
    let source_max_retries = parse_u32("TRENDSCOUT_SOURCE_MAX_RETRIES", "3")?;
    let source_backoff_base_ms = parse_u64("TRENDSCOUT_SOURCE_BACKOFF_BASE_MS", "1000")?;
    let max_posts_per_source = parse_usize("TRENDSCOUT_MAX_POSTS_PER_SOURCE", "200")?;

    let min_discovery_interval_mins = parse_i64("TRENDSCOUT_MIN_DISCOVERY_INTERVAL_MINS", "15")?;
    let dashboard_lookback_hours = parse_i64("TRENDSCOUT_DASHBOARD_LOOKBACK_HOURS", "24")?;
    let discovery_cron = or_default("TRENDSCOUT_DISCOVERY_CRON", "0 */30 * * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        reddit_client_id,
        reddit_client_secret,
        reddit_user_agent,
        reddit_feed,
        x_bearer_token,
        x_search_query,
        insight_service_url,
        insight_timeout_secs,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        source_request_timeout_secs,
        source_max_retries,
        source_backoff_base_ms,
        max_posts_per_source,
        min_discovery_interval_mins,
        dashboard_lookback_hours,
        discovery_cron,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
