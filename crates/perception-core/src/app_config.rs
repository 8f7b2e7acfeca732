use std::net::SocketAddr;
use std::path::PathBuf;

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
pub struct EngineConfig {
    pub store_url: String,
    pub store_token: Option<String>,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub page_size: u32,
    pub max_pages: usize,
    pub debounce_ms: u64,
    pub cache_ttl_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub request_timeout_secs: u64,
    pub accept_partial: bool,
    pub normalizer_path: Option<PathBuf>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("store_url", &self.store_url)
            .field(
                "store_token",
                &self.store_token.as_ref().map(|_| "[redacted]"),
            )
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("debounce_ms", &self.debounce_ms)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("accept_partial", &self.accept_partial)
            .field("normalizer_path", &self.normalizer_path)
            .finish()
    }
}
