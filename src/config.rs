use anyhow::{Context, Result};

// ============================================================================
// Configuration Constants
// ============================================================================

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "sqlite:marketplace.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACCESS_TOKEN_TTL_HOURS: i64 = 24;
const DEFAULT_ISSUER: &str = "bazaar-server";

/// Upper bound on message text, in characters after trimming.
/// Anything larger is rejected before it reaches the store.
pub const MAX_TEXT_LENGTH: usize = 1000;

/// Per-session push buffer. A session whose buffer is full misses the push
/// and catches up from the durable log on its next history read.
const DEFAULT_PUSH_BUFFER_SIZE: usize = 64;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub access_token_ttl_hours: i64,
    pub issuer: String,
    pub max_text_length: usize,
    pub push_buffer_size: usize,
}

impl Config {
    /// Loads configuration from the environment. `JWT_SECRET` is required,
    /// everything else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let port = match std::env::var("PORT") {
            Ok(v) => v.parse().context("PORT must be a valid port number")?,
            Err(_) => DEFAULT_PORT,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let db_max_connections = match std::env::var("DB_MAX_CONNECTIONS") {
            Ok(v) => v.parse().context("DB_MAX_CONNECTIONS must be an integer")?,
            Err(_) => DEFAULT_DB_MAX_CONNECTIONS,
        };

        let access_token_ttl_hours = match std::env::var("ACCESS_TOKEN_TTL_HOURS") {
            Ok(v) => v.parse().context("ACCESS_TOKEN_TTL_HOURS must be an integer")?,
            Err(_) => DEFAULT_ACCESS_TOKEN_TTL_HOURS,
        };

        let push_buffer_size = match std::env::var("PUSH_BUFFER_SIZE") {
            Ok(v) => v.parse().context("PUSH_BUFFER_SIZE must be an integer")?,
            Err(_) => DEFAULT_PUSH_BUFFER_SIZE,
        };

        Ok(Self {
            port,
            database_url,
            db_max_connections,
            jwt_secret,
            access_token_ttl_hours,
            issuer: DEFAULT_ISSUER.to_string(),
            max_text_length: MAX_TEXT_LENGTH,
            push_buffer_size,
        })
    }

    /// In-memory configuration used by the test suites.
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_hours: 1,
            issuer: DEFAULT_ISSUER.to_string(),
            max_text_length: MAX_TEXT_LENGTH,
            push_buffer_size: DEFAULT_PUSH_BUFFER_SIZE,
        }
    }
}
