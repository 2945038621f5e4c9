//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured for local development.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which remote record store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteBackend {
    Supabase,
    Firestore,
}

impl FromStr for RemoteBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(Self::Supabase),
            "firestore" => Ok(Self::Firestore),
            _ => Err(ConfigError::Invalid("REMOTE_BACKEND")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Identity provider ---
    /// Firebase Web API key
    pub firebase_api_key: String,
    /// Firebase / GCP project ID (also used for Firestore)
    pub firebase_project_id: String,
    /// Auth emulator host (e.g. "localhost:9099"), if any
    pub auth_emulator_host: Option<String>,

    // --- Remote record store ---
    pub remote_backend: RemoteBackend,
    /// Supabase project URL
    pub supabase_url: Option<String>,
    /// Supabase anonymous (public) API key
    pub supabase_anon_key: Option<String>,
    /// Attempts per remote insert before giving up
    pub remote_write_max_attempts: u32,
    /// Delay before the first retry, doubled for each further attempt
    pub remote_write_backoff: Duration,

    // --- Local ---
    /// JSON file backing local persistence
    pub cache_path: PathBuf,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let remote_backend = match env::var("REMOTE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => RemoteBackend::Supabase,
        };

        let supabase_url = optional_var("SUPABASE_URL");
        let supabase_anon_key = optional_var("SUPABASE_ANON_KEY");
        if remote_backend == RemoteBackend::Supabase {
            if supabase_url.is_none() {
                return Err(ConfigError::Missing("SUPABASE_URL"));
            }
            if supabase_anon_key.is_none() {
                return Err(ConfigError::Missing("SUPABASE_ANON_KEY"));
            }
        }

        let log_format = match optional_var("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            firebase_api_key: env::var("FIREBASE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            firebase_project_id: env::var("FIREBASE_PROJECT_ID")
                .unwrap_or_else(|_| "local-dev".to_string()),
            auth_emulator_host: optional_var("FIREBASE_AUTH_EMULATOR_HOST"),
            remote_backend,
            supabase_url,
            supabase_anon_key,
            remote_write_max_attempts: parse_var::<u32>("REMOTE_WRITE_MAX_ATTEMPTS", 3)?.max(1),
            remote_write_backoff: Duration::from_millis(parse_var::<u64>(
                "REMOTE_WRITE_BACKOFF_MS",
                500,
            )?),
            cache_path: optional_var("SESSION_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_path),
            log_format,
        })
    }

    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            firebase_api_key: "test_api_key".to_string(),
            firebase_project_id: "test-project".to_string(),
            auth_emulator_host: None,
            remote_backend: RemoteBackend::Supabase,
            supabase_url: Some("http://localhost:54321".to_string()),
            supabase_anon_key: Some("test_anon_key".to_string()),
            remote_write_max_attempts: 3,
            remote_write_backoff: Duration::from_millis(1),
            cache_path: PathBuf::from("session-test.json"),
            log_format: LogFormat::Text,
        }
    }
}

/// `<local data dir>/retina-session/session.json`, or the working directory
/// when the platform has no data directory.
fn default_cache_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("retina-session"))
        .unwrap_or_default()
        .join("session.json")
}

/// Read a variable, treating empty values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid(name)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
