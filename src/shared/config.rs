use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::sync::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout in seconds; an expired request counts as a transient failure.
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval: u64,
    pub max_retry: u32,
    pub retry_server_errors: bool,
    pub transient_statuses: Vec<u16>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
                connection_timeout: 30,
            },
            api: ApiConfig {
                base_url: "http://localhost:3333/api".to_string(),
                request_timeout: 20,
            },
            sync: SyncConfig {
                auto_sync: true,
                sync_interval: 300, // 5 minutes
                max_retry: 3,
                retry_server_errors: true,
                transient_statuses: vec![408, 425, 429],
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("AGRISYNC_DATABASE_URL") {
            let v = v.trim();
            if !v.is_empty() {
                cfg.database.url = v.to_string();
            }
        }
        if let Some(v) = lookup("AGRISYNC_DATABASE_MAX_CONNECTIONS") {
            if let Some(value) = parse_u32(&v) {
                cfg.database.max_connections = value;
            }
        }

        if let Some(v) = lookup("AGRISYNC_API_BASE_URL") {
            let v = v.trim().trim_end_matches('/');
            if !v.is_empty() {
                cfg.api.base_url = v.to_string();
            }
        }
        if let Some(v) = lookup("AGRISYNC_API_TIMEOUT_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.api.request_timeout = value;
            }
        }

        if let Some(v) = lookup("AGRISYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(v) = lookup("AGRISYNC_SYNC_INTERVAL_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.sync_interval = value.max(1);
            }
        }
        if let Some(v) = lookup("AGRISYNC_SYNC_MAX_RETRY") {
            if let Some(value) = parse_u32(&v) {
                cfg.sync.max_retry = value;
            }
        }
        if let Some(v) = lookup("AGRISYNC_SYNC_RETRY_SERVER_ERRORS") {
            cfg.sync.retry_server_errors = parse_bool(&v, cfg.sync.retry_server_errors);
        }
        if let Some(v) = lookup("AGRISYNC_SYNC_TRANSIENT_STATUSES") {
            let statuses: Vec<u16> = v.split(',').filter_map(parse_u16).collect();
            if !statuses.is_empty() {
                cfg.sync.transient_statuses = statuses;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(format!(
                "Api base_url must be an http(s) url: {}",
                self.api.base_url
            ));
        }
        if self.api.request_timeout == 0 {
            return Err("Api request_timeout must be greater than 0".to_string());
        }
        if self.sync.max_retry == 0 {
            return Err("Sync max_retry must be greater than 0".to_string());
        }
        if self.sync.auto_sync && self.sync.sync_interval == 0 {
            return Err("Sync sync_interval must be greater than 0".to_string());
        }
        if let Some(status) = self
            .sync
            .transient_statuses
            .iter()
            .find(|status| !(100..600).contains(*status))
        {
            return Err(format!("Sync transient status {status} is not an HTTP status"));
        }
        Ok(())
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl SyncConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retry,
            retry_server_errors: self.retry_server_errors,
            transient_statuses: self.transient_statuses.clone(),
        }
    }
}

fn default_database_url() -> String {
    match dirs::data_local_dir() {
        Some(dir) => format!(
            "sqlite://{}?mode=rwc",
            dir.join("agrisync").join("offline.db").display()
        ),
        None => "sqlite://./data/offline.db?mode=rwc".to_string(),
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_u16(value: &str) -> Option<u16> {
    value.trim().parse::<u16>().ok()
}
