// common/src/config.rs
use chrono::Duration;
use config::{Config as ConfigFile, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::protocol::deeplink::DEFAULT_SCHEME;

/// Central configuration for the auth server
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub web_server_addr: String,
    pub log_level: String,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

/// Values rendered into every challenge. Signer and verifier must agree on
/// all of them byte for byte.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSettings {
    pub domain: String,
    pub uri: String,
    pub chain_id: u64,
    pub web_statement: String,
    pub desktop_statement: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    pub challenge: ChallengeSettings,
    pub deep_link_scheme: String,
    pub nonce_ttl_secs: i64,
    pub code_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub jwt_secret: String,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub paths: Vec<String>,
    pub max_requests: usize,
    pub window_secs: u64,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            domain: "snelabs.space".to_string(),
            uri: "https://snelabs.space/auth".to_string(),
            chain_id: 534352, // Scroll mainnet
            web_statement: "Sign in to SNE Radar".to_string(),
            desktop_statement: "Authenticate SNE Radar Desktop".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            challenge: ChallengeSettings::default(),
            deep_link_scheme: DEFAULT_SCHEME.to_string(),
            nonce_ttl_secs: 600,
            code_ttl_secs: 60,
            session_ttl_secs: 86400,
            jwt_secret: "dev_secret".to_string(),
            cookie_name: "sne_session".to_string(),
            cookie_secure: true,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            paths: vec![
                "/api/auth/nonce".to_string(),
                "/api/auth/siwe".to_string(),
                "/api/auth/redeem".to_string(),
            ],
            max_requests: 10,
            window_secs: 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            log_level: "info".to_string(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl AuthConfig {
    pub fn nonce_ttl(&self) -> Duration {
        Duration::seconds(self.nonce_ttl_secs)
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::seconds(self.code_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_secs)
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let defaults = ConfigFile::try_from(&Config::default())?;

        ConfigFile::builder()
            // Start with compiled-in defaults so partial files are enough
            .add_source(defaults)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix "APP", e.g. APP__AUTH__JWT_SECRET
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let mut config = Config::default();

                if let Ok(addr) = env::var("WEB_SERVER_ADDR") {
                    config.web_server_addr = addr;
                }
                if let Ok(level) = env::var("LOG_LEVEL") {
                    config.log_level = level;
                }
                if let Ok(secret) = env::var("JWT_SECRET") {
                    config.auth.jwt_secret = secret;
                }
                if let Ok(domain) = env::var("SIWE_DOMAIN") {
                    config.auth.challenge.domain = domain;
                }
                if let Ok(uri) = env::var("SIWE_URI") {
                    config.auth.challenge.uri = uri;
                }
                if let Some(chain_id) = env::var("SIWE_CHAIN_ID").ok().and_then(|v| v.parse().ok()) {
                    config.auth.challenge.chain_id = chain_id;
                }
                if let Some(ttl) = env::var("NONCE_TTL_SECS").ok().and_then(|v| v.parse().ok()) {
                    config.auth.nonce_ttl_secs = ttl;
                }
                if let Some(ttl) = env::var("CODE_TTL_SECS").ok().and_then(|v| v.parse().ok()) {
                    config.auth.code_ttl_secs = ttl;
                }
                if let Some(ttl) = env::var("SESSION_TTL_SECS").ok().and_then(|v| v.parse().ok()) {
                    config.auth.session_ttl_secs = ttl;
                }
                config.auth.cookie_secure = env::var("COOKIE_SECURE")
                    .map(|v| v.to_lowercase() == "true")
                    .unwrap_or(true);

                config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_conservative() {
        let config = Config::default();
        assert!(config.auth.code_ttl_secs <= 60);
        assert!((300..=600).contains(&config.auth.nonce_ttl_secs));
        assert_eq!(config.auth.deep_link_scheme, "sneradar");
    }

    #[test]
    fn test_defaults_survive_config_builder() {
        let built: Config = ConfigFile::builder()
            .add_source(ConfigFile::try_from(&Config::default()).unwrap())
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(built.auth.challenge, ChallengeSettings::default());
        assert_eq!(built.rate_limit.paths.len(), 3);
    }
}
