use std::env;
use std::path::PathBuf;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Graph API
    pub api_url: String,
    pub bot_username: String,
    pub bot_password: String,

    // Profile source
    pub profile_base_url: String,

    // Lookup tables (property ids + organization/title resolution)
    pub property_table_path: Option<PathBuf>,
    pub lookup_table_path: Option<PathBuf>,

    // Runtime
    pub max_concurrent: usize,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            api_url: required_env("STAFFSYNC_API_URL"),
            bot_username: required_env("STAFFSYNC_BOT_USERNAME"),
            bot_password: required_env("STAFFSYNC_BOT_PASSWORD"),
            profile_base_url: required_env("STAFFSYNC_PROFILE_BASE_URL"),
            property_table_path: env::var("STAFFSYNC_PROPERTY_TABLE").ok().map(PathBuf::from),
            lookup_table_path: env::var("STAFFSYNC_LOOKUP_TABLE").ok().map(PathBuf::from),
            max_concurrent: env::var("STAFFSYNC_MAX_CONCURRENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            http_timeout_secs: env::var("STAFFSYNC_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            user_agent: env::var("STAFFSYNC_USER_AGENT")
                .unwrap_or_else(|_| "staffsync/0.1".to_string()),
        }
    }

    /// Log the effective config without credentials.
    pub fn log_redacted(&self) {
        info!(
            api_url = %self.api_url,
            profile_base_url = %self.profile_base_url,
            bot_username = %self.bot_username,
            max_concurrent = self.max_concurrent,
            http_timeout_secs = self.http_timeout_secs,
            "Loaded config"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
