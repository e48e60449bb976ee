//! CLI argument parsing, validation, and startup helpers.

use crate::db::Database;
use crate::jwt::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::Parser;
use tracing::{error, info};

/// Minimum length of the decoded signing secret, in bytes.
const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Tollgate",
    about = "Authentication gate: verifies access tokens and silently reissues them from stored refresh tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8642")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "tollgate.db")]
    pub database: String,

    /// Path to file containing the base64-encoded signing secret. Prefer using TOKEN_SECRET env var instead
    #[arg(long)]
    pub secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_ACCESS_TTL_SECS)]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_REFRESH_TTL_SECS)]
    pub refresh_ttl_secs: u64,

    /// Upper bound on any single token store call, in milliseconds
    #[arg(long, default_value = "250")]
    pub store_timeout_ms: u64,

    /// Rotate the refresh token whenever an access token is reissued
    #[arg(long)]
    pub rotate_on_reissue: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the token signing secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_token_secret(secret_file: Option<&str>) -> Option<Vec<u8>> {
    let encoded = if let Ok(secret) = std::env::var("TOKEN_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("TOKEN_SECRET") };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read token secret file");
                return None;
            }
        }
    } else {
        error!(
            "Token secret is required. Set TOKEN_SECRET environment variable (recommended) or use --secret-file"
        );
        return None;
    };

    parse_secret(&encoded)
}

/// Decode and validate the base64-encoded secret.
fn parse_secret(encoded: &str) -> Option<Vec<u8>> {
    let Ok(secret) = STANDARD.decode(encoded.trim()) else {
        error!("Token secret is not valid base64");
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "Token secret decodes to fewer than {} bytes. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
