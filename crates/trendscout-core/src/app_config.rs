use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_user_agent: String,
    pub reddit_feed: String,
    pub x_bearer_token: Option<String>,
    pub x_search_query: String,
    pub insight_service_url: Option<String>,
    pub insight_timeout_secs: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub source_request_timeout_secs: u64,
    pub source_max_retries: u32,
    pub source_backoff_base_ms: u64,
    pub max_posts_per_source: usize,
    pub min_discovery_interval_mins: i64,
    pub dashboard_lookback_hours: i64,
    pub discovery_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field(
                "reddit_client_id",
                &self.reddit_client_id.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "reddit_client_secret",
                &self.reddit_client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("reddit_user_agent", &self.reddit_user_agent)
            .field("reddit_feed", &self.reddit_feed)
            .field(
                "x_bearer_token",
                &self.x_bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field("x_search_query", &self.x_search_query)
            .field("insight_service_url", &self.insight_service_url)
            .field("insight_timeout_secs", &self.insight_timeout_secs)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "source_request_timeout_secs",
                &self.source_request_timeout_secs,
            )
            .field("source_max_retries", &self.source_max_retries)
            .field("source_backoff_base_ms", &self.source_backoff_base_ms)
            .field("max_posts_per_source", &self.max_posts_per_source)
            .field(
                "min_discovery_interval_mins",
                &self.min_discovery_interval_mins,
            )
            .field("dashboard_lookback_hours", &self.dashboard_lookback_hours)
            .field("discovery_cron", &self.discovery_cron)
            .finish()
    }
}
