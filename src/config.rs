use std::path::PathBuf;

use crate::error::ConfigError;
use crate::executor::WarehouseContext;
use crate::twitter::{TwitterCredentials, DEFAULT_BASE_URL};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub project: String,
    pub template_dir: PathBuf,
    pub error_dir: PathBuf,
    pub db_max_connections: u32,
    pub log_level: String,
    pub twitter_base_url: String,
    pub twitter_timeout_secs: u64,
    pub twitter: Option<TwitterCredentials>,
}

impl AppConfig {
    pub fn warehouse_context(&self) -> WarehouseContext {
        WarehouseContext {
            project: self.project.clone(),
            template_dir: self.template_dir.clone(),
            error_dir: self.error_dir.clone(),
        }
    }
}

/// Loads `.env` (if present) and then reads the process environment.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| std::env::var(key))
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let db_max_connections = parse_u32("KOL_DB_MAX_CONNECTIONS", "5")?;
    if db_max_connections == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "KOL_DB_MAX_CONNECTIONS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let project = or_default("KOL_PROJECT", "kol_warehouse");
    if project.is_empty() || !project.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::InvalidEnvVar {
            var: "KOL_PROJECT".to_string(),
            reason: "must be a bare identifier".to_string(),
        });
    }

    let twitter = match (
        lookup("API_KEY").ok(),
        lookup("API_SECRET").ok(),
        lookup("ACCESS_TOKEN_KEY").ok(),
        lookup("ACCESS_TOKEN_SECRET").ok(),
    ) {
        (Some(api_key), Some(api_secret), Some(access_token), Some(access_token_secret)) => {
            Some(TwitterCredentials {
                api_key,
                api_secret,
                access_token,
                access_token_secret,
            })
        }
        _ => None,
    };

    Ok(AppConfig {
        database_url: lookup("DATABASE_URL").ok(),
        project,
        template_dir: PathBuf::from(or_default("KOL_TEMPLATE_DIR", "./queries")),
        error_dir: PathBuf::from(or_default("KOL_ERROR_DIR", "errors")),
        db_max_connections,
        log_level: or_default("KOL_LOG_LEVEL", "info"),
        twitter_base_url: or_default("TWITTER_API_BASE_URL", DEFAULT_BASE_URL),
        twitter_timeout_secs: parse_u64("TWITTER_TIMEOUT_SECS", "30")?,
        twitter,
    })
}

/// The database URL, or an error naming the variable to set.
pub fn require_database_url(config: &AppConfig) -> Result<&str, ConfigError> {
    config
        .database_url
        .as_deref()
        .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
}
