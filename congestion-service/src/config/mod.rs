use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct CongestionConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub auth: AuthConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the service that issues access tokens.
    pub jwt_secret: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Prefix for the congestion routes, e.g. `/api/predict`. Empty mounts at `/`.
    pub base_path: String,
    pub max_batch_size: usize,
}

impl CongestionConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let base_path = normalize_base_path(&get_env("API_BASE_PATH", Some(""), false)?)?;
        let max_batch_size = get_env("MAX_BATCH_SIZE", Some("1000"), false)?
            .parse()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid MAX_BATCH_SIZE: {}", e)))?;

        Ok(CongestionConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("congestion_db"), is_prod)?,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(get_env("JWT_SECRET", None, is_prod)?),
            },
            api: ApiConfig {
                base_path,
                max_batch_size,
            },
        })
    }
}

/// Trims trailing slashes and requires a leading one; `""` and `"/"` mean root.
pub fn normalize_base_path(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if !trimmed.starts_with('/') {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "API_BASE_PATH must start with '/': {}",
            raw
        )));
    }
    Ok(trimmed.to_string())
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
