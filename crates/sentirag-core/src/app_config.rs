use crate::tiers::TickerTiers;
use crate::ConfigError;

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
    /// Unset only matters to commands that open a connection.
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub redis_url: Option<String>,
    pub tei_embed_url: Option<String>,
    pub tei_classify_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub answer_cache_ttl_secs: u64,
    pub retention_hours: i64,
    pub retrieval_k: usize,
    pub retrieval_window_hours: i64,
    pub ingest_max_concurrent_tickers: usize,
    pub ticker_tiers: TickerTiers,
}

impl AppConfig {
    /// The configured `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when it is not set.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[redacted]"))
            .field("tei_embed_url", &self.tei_embed_url)
            .field("tei_classify_url", &self.tei_classify_url)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("answer_cache_ttl_secs", &self.answer_cache_ttl_secs)
            .field("retention_hours", &self.retention_hours)
            .field("retrieval_k", &self.retrieval_k)
            .field("retrieval_window_hours", &self.retrieval_window_hours)
            .field(
                "ingest_max_concurrent_tickers",
                &self.ingest_max_concurrent_tickers,
            )
            .field("ticker_tiers", &self.ticker_tiers)
            .finish()
    }
}
