use crate::error::{Error, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub database_path: String,
    pub concurrency_limit: usize,
    pub request_timeout_secs: u64,
    pub store_timeout_secs: u64,
    pub record_failures: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // An absent token is not a load error: tasks are dropped at processing time.
        let github_token = env::var("GITHUB_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let github_api_url = env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let database_path = env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "contribpulse.db".to_string());

        let concurrency_limit = parse_var("CONCURRENCY_LIMIT", 4)?;
        let request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", 30)?;
        let store_timeout_secs = parse_var("STORE_TIMEOUT_SECS", 30)?;

        let record_failures = env::var("RECORD_FAILURES")
            .ok()
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        if concurrency_limit == 0 {
            return Err(Error::Config("CONCURRENCY_LIMIT must be at least 1".to_string()));
        }

        Ok(Self {
            github_token,
            github_api_url,
            database_path,
            concurrency_limit,
            request_timeout_secs,
            store_timeout_secs,
            record_failures,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub store_timeout: Duration,
    pub record_failures: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(30),
            record_failures: false,
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            store_timeout: Duration::from_secs(config.store_timeout_secs),
            record_failures: config.record_failures,
        }
    }
}
