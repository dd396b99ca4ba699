//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::game::replay::DEFAULT_CACHE_CAPACITY;

/// Supabase connection settings for the match store
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// HS256 secret used to verify access tokens
    pub jwt_secret: String,

    /// Supabase storage; matches are kept in memory when unset
    pub supabase: Option<SupabaseConfig>,

    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,
    /// Upper bound on a single request
    pub request_timeout: Duration,
    /// Turn submissions allowed per user per second
    pub turn_rate_limit: u32,
    /// Matches whose replayed snapshots are kept in memory
    pub snapshot_cache_size: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR when a host platform provides it
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let supabase = match (env::var("SUPABASE_URL"), env::var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Ok(url), Ok(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            (Ok(_), Err(_)) => return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")),
            (Err(_), Ok(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
            (Err(_), Err(_)) => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,

            supabase,

            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            request_timeout: Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECS", 10)?),
            turn_rate_limit: parse_or("TURN_RATE_LIMIT", 5)?,
            snapshot_cache_size: parse_or("SNAPSHOT_CACHE_SIZE", DEFAULT_CACHE_CAPACITY)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
