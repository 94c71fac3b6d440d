// homebites/server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;

pub const DEFAULT_ORACLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,

  pub mongo_uri: String,
  pub mongo_db_name: String,

  pub google_api_key: String,
  pub oracle_model: String,
  pub oracle_temperature: f32,
  pub oracle_base_url: String,
  pub oracle_timeout_secs: u64,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    let config = Self::from_lookup(|var_name| env::var(var_name).ok())?;
    tracing::info!(config = ?config, "Application configuration loaded successfully.");
    Ok(config)
  }

  /// Builds the config from any variable source; `from_env` passes the process environment.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let server_port = get_env("PORT")
      .unwrap_or_else(|_| "8000".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid PORT: {}", e)))?;

    let mongo_uri = get_env("MONGO_URI").or_else(|_| get_env("MONGODB_URI"))?;
    let mongo_db_name = get_env("MONGO_DB_NAME").unwrap_or_else(|_| "HomeBites".to_string());

    let google_api_key = get_env("GOOGLE_API_KEY")?;
    let oracle_model = get_env("ORACLE_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
    let oracle_temperature = get_env("ORACLE_TEMPERATURE")
      .unwrap_or_else(|_| "0.7".to_string())
      .parse::<f32>()
      .map_err(|e| AppError::Config(format!("Invalid ORACLE_TEMPERATURE: {}", e)))?;
    if !(0.0..=2.0).contains(&oracle_temperature) {
      return Err(AppError::Config(format!(
        "ORACLE_TEMPERATURE must be between 0 and 2, got {}",
        oracle_temperature
      )));
    }
    let oracle_base_url = get_env("ORACLE_BASE_URL")
      .unwrap_or_else(|_| DEFAULT_ORACLE_BASE_URL.to_string())
      .trim_end_matches('/')
      .to_string();
    let oracle_timeout_secs = get_env("ORACLE_TIMEOUT_SECS")
      .unwrap_or_else(|_| "30".to_string())
      .parse::<u64>()
      .map_err(|e| AppError::Config(format!("Invalid ORACLE_TIMEOUT_SECS: {}", e)))?;

    Ok(Self {
      server_host,
      server_port,
      mongo_uri,
      mongo_db_name,
      google_api_key,
      oracle_model,
      oracle_temperature,
      oracle_base_url,
      oracle_timeout_secs,
    })
  }
}

// Credentials never reach the logs.
impl fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("mongo_uri", &"[REDACTED]")
      .field("mongo_db_name", &self.mongo_db_name)
      .field("google_api_key", &"[REDACTED]")
      .field("oracle_model", &self.oracle_model)
      .field("oracle_temperature", &self.oracle_temperature)
      .field("oracle_base_url", &self.oracle_base_url)
      .field("oracle_timeout_secs", &self.oracle_timeout_secs)
      .finish()
  }
}
