use std::path::PathBuf;
use std::time::Duration;

use govcon_adapters::{DEFAULT_DAYS_BACK, DEFAULT_LIMIT};
use govcon_storage::HttpClientConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub days_back: u32,
    pub fetch_limit: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset or unparseable values
    /// fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_base_url: non_empty("GOVCON_API_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8000".to_string()),
            data_dir: non_empty("GOVCON_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./.govcon")),
            http_timeout_secs: non_empty("GOVCON_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(20),
            user_agent: non_empty("GOVCON_USER_AGENT").unwrap_or_else(|| "govcon/0.1".to_string()),
            days_back: non_empty("GOVCON_DAYS_BACK")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_DAYS_BACK),
            fetch_limit: non_empty("GOVCON_FETCH_LIMIT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
        }
    }
}
