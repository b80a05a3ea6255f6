use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_PERSIST_DEBOUNCE_MS, DEFAULT_PROFILE_ID};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub profile_id: String,
    pub lesson_catalog_path: Option<String>,
    pub persistence: PersistenceConfig,
    pub worker: WorkerConfig,
    /// Fixed seed for daily goal selection; entropy when unset.
    pub goal_seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub debounce_ms: u64,
    /// Ephemeral mode: nothing is written, in-memory state still updates.
    pub skip: bool,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_PERSIST_DEBOUNCE_MS,
            skip: false,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl PersistenceConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 4850_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/progress.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            profile_id: env_or("PROFILE_ID", DEFAULT_PROFILE_ID),
            lesson_catalog_path: env_opt("LESSON_CATALOG_PATH"),
            persistence: PersistenceConfig {
                debounce_ms: env_or_parse("PERSIST_DEBOUNCE_MS", DEFAULT_PERSIST_DEBOUNCE_MS),
                skip: env_or_bool("PERSIST_SKIP", false),
            },
            worker: WorkerConfig {
                enabled: env_or_bool("WORKER_ENABLED", true),
            },
            goal_seed: env_opt("GOAL_SEED").and_then(|raw| match raw.parse::<u64>() {
                Ok(seed) => Some(seed),
                Err(_) => {
                    tracing::warn!(value = %raw, "Invalid GOAL_SEED, using entropy");
                    None
                }
            }),
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank both mean "not configured".
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
