//! Audiohook service configuration.
//!
//! Environment variables are the sole config source, read once at startup.
//!
//! # Required
//! - `API_KEY` — shared key the Audiohook client presents in `X-API-KEY`
//! - `CONVERSATION_PROFILE_NAME` — full resource path; the location segment
//!   is extracted here and a malformed name aborts startup
//! - `GCP_PROJECT_ID`
//! - `UI_CONNECTOR` — UI-connector endpoint (diagnostic surface)
//! - `REDISHOST` / `REDISPORT`

use regex::Regex;
use std::env;

const LOCATION_ID_REGEX: &str = r"^projects/[^/]+/locations/([^/]+)";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is missing")]
    MissingVar(&'static str),
    #[error("environment variable {0} is not valid: {1}")]
    InvalidVar(&'static str, String),
    #[error("conversation profile name is not in correct format: {0}")]
    BadProfileName(String),
}

/// Runtime configuration for the Audiohook interception service.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub conversation_profile_name: String,
    pub project_id: String,
    /// Extracted from `conversation_profile_name` at startup.
    pub location_id: String,
    pub ui_connector_endpoint: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub bind_addr: String,
    pub log_level: String,
    /// Grace period for joining workers at session close, seconds.
    pub timeout_secs: u64,
    /// PCMU sample rate; one byte per sample.
    pub rate: u32,
    pub chunk_size: usize,
    /// Replay window replayed at the start of each recognition restart, seconds.
    pub max_lookback_secs: u64,
    pub summary_interval_secs: u64,
    /// Durable topic for summaries with no live subscriber.
    pub conversation_event_topic: String,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

fn optional_parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidVar(name, e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Extract the location id from a conversation-profile resource name.
///
/// The single consumer of the documented
/// `^projects/[^/]+/locations/([^/]+)` pattern; called at startup so a bad
/// profile name fails fast rather than at first session open.
pub fn extract_location_id(conversation_profile_name: &str) -> Result<String, ConfigError> {
    let re = Regex::new(LOCATION_ID_REGEX).expect("location regex is valid");
    re.captures(conversation_profile_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
        .ok_or_else(|| ConfigError::BadProfileName(conversation_profile_name.to_owned()))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let conversation_profile_name = required("CONVERSATION_PROFILE_NAME")?;
        let location_id = extract_location_id(&conversation_profile_name)?;
        Ok(Config {
            api_key: required("API_KEY")?,
            project_id: required("GCP_PROJECT_ID")?,
            ui_connector_endpoint: required("UI_CONNECTOR")?,
            redis_host: required("REDISHOST")?,
            redis_port: optional_parsed("REDISPORT", 6379)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
            timeout_secs: optional_parsed("TIMEOUT", 2)?,
            rate: optional_parsed("RATE", 8000)?,
            chunk_size: optional_parsed("CHUNK_SIZE", 1600)?,
            max_lookback_secs: optional_parsed("MAX_LOOKBACK", 3)?,
            summary_interval_secs: optional_parsed("SUMMARY_INTERVAL_SECS", 60)?,
            conversation_event_topic: env::var("CONVERSATION_EVENT_TOPIC")
                .unwrap_or_else(|_| "aa-conversation-event-topic".to_owned()),
            conversation_profile_name,
            location_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_id_is_extracted_from_the_profile_name() {
        let location = extract_location_id(
            "projects/demo/locations/us-central1/conversationProfiles/cp-1",
        )
        .unwrap();
        assert_eq!(location, "us-central1");

        let global =
            extract_location_id("projects/demo/locations/global/conversationProfiles/cp-1")
                .unwrap();
        assert_eq!(global, "global");
    }

    #[test]
    fn malformed_profile_names_fail_fast() {
        assert!(matches!(
            extract_location_id("conversationProfiles/cp-1"),
            Err(ConfigError::BadProfileName(_))
        ));
        assert!(matches!(
            extract_location_id(""),
            Err(ConfigError::BadProfileName(_))
        ));
    }
}
