//! UI-connector configuration, read from the environment at startup.

use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is missing")]
    MissingVar(&'static str),
    #[error("environment variable {0} is not valid: {1}")]
    InvalidVar(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// HS256 secret shared with the token-minting service.
    pub jwt_secret: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub bind_addr: String,
    pub log_level: String,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let redis_port = match env::var("REDISPORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    ConfigError::InvalidVar("REDISPORT", e.to_string())
                })?,
            Err(_) => 6379,
        };
        Ok(Config {
            jwt_secret: required("JWT_SECRET_KEY")?,
            redis_host: required("REDISHOST")?,
            redis_port,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
        })
    }
}
