//! Configuration module for the card sync service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Sets whose catalog data is kept for offline use when nothing else is configured.
pub const DEFAULT_OFFLINE_SETS: &[&str] = &["sv03.5", "SV8a", "sv08.5"];

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to the local key-value SQLite database file
    pub db_path: PathBuf,
    /// Path to the SQLite file standing in for the remote collection store
    pub remote_db_path: PathBuf,
    /// Private per-app file area; `None` disables image overrides
    pub documents_dir: Option<PathBuf>,
    /// Base URL of the external card catalog API
    pub catalog_url: String,
    /// Request timeout for catalog calls
    pub catalog_timeout: Duration,
    /// Catalog sets refreshed for offline use
    pub offline_sets: Vec<String>,
    /// Optional JSON file replacing the built-in variant rule table
    pub variant_rules_path: Option<PathBuf>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("CARDSYNC_API_PSK").ok().filter(|s| !s.is_empty());

        let db_path = env::var("CARDSYNC_DB_PATH")
            .unwrap_or_else(|_| "./data/cardsync.sqlite".to_string())
            .into();

        let remote_db_path = env::var("CARDSYNC_REMOTE_DB_PATH")
            .unwrap_or_else(|_| "./data/remote.sqlite".to_string())
            .into();

        let documents_dir = env::var("CARDSYNC_DOCUMENTS_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let catalog_url = env::var("CARDSYNC_CATALOG_URL")
            .unwrap_or_else(|_| "https://api.pokemontcg.io/v2".to_string())
            .trim_end_matches('/')
            .to_string();

        let catalog_timeout = match env::var("CARDSYNC_CATALOG_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                AppError::Validation(format!("Invalid CARDSYNC_CATALOG_TIMEOUT_SECS: {}", raw))
            })?,
            Err(_) => Duration::from_secs(15),
        };

        let offline_sets = env::var("CARDSYNC_OFFLINE_SETS")
            .map(|raw| parse_set_list(&raw))
            .unwrap_or_else(|_| DEFAULT_OFFLINE_SETS.iter().map(|s| s.to_string()).collect());

        let variant_rules_path = env::var("CARDSYNC_VARIANT_RULES")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let raw_bind = env::var("CARDSYNC_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8787".to_string());
        let bind_addr = raw_bind
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid CARDSYNC_BIND_ADDR: {}", raw_bind)))?;

        let log_level = env::var("CARDSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_psk,
            db_path,
            remote_db_path,
            documents_dir,
            catalog_url,
            catalog_timeout,
            offline_sets,
            variant_rules_path,
            bind_addr,
            log_level,
        })
    }
}

/// Split a comma separated set list, dropping blanks.
fn parse_set_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        for key in [
            "CARDSYNC_API_PSK",
            "CARDSYNC_DB_PATH",
            "CARDSYNC_REMOTE_DB_PATH",
            "CARDSYNC_DOCUMENTS_DIR",
            "CARDSYNC_CATALOG_URL",
            "CARDSYNC_CATALOG_TIMEOUT_SECS",
            "CARDSYNC_OFFLINE_SETS",
            "CARDSYNC_VARIANT_RULES",
            "CARDSYNC_BIND_ADDR",
            "CARDSYNC_LOG_LEVEL",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/cardsync.sqlite"));
        assert_eq!(config.remote_db_path, PathBuf::from("./data/remote.sqlite"));
        assert!(config.documents_dir.is_none());
        assert_eq!(config.catalog_url, "https://api.pokemontcg.io/v2");
        assert_eq!(config.catalog_timeout, Duration::from_secs(15));
        assert_eq!(config.offline_sets, vec!["sv03.5", "SV8a", "sv08.5"]);
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8787");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_set_list_skips_blanks() {
        assert_eq!(parse_set_list(" sv03.5, ,SV8a,"), vec!["sv03.5", "SV8a"]);
        assert!(parse_set_list("").is_empty());
    }
}
