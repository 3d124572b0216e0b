use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::screening::classifier::{
    TierThresholds, DEFAULT_SHORTLIST_THRESHOLD, DEFAULT_WAITLIST_THRESHOLD,
};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub scoring_api_url: String,
    /// Unset means results and preferences live in process memory only.
    pub redis_url: Option<String>,
    pub session_ttl_secs: u64,
    pub refresh_interval: Duration,
    pub backend_timeout: Duration,
    pub thresholds: TierThresholds,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let thresholds = TierThresholds {
            shortlist: parse_env("SHORTLIST_THRESHOLD", DEFAULT_SHORTLIST_THRESHOLD)?,
            waitlist: parse_env("WAITLIST_THRESHOLD", DEFAULT_WAITLIST_THRESHOLD)?,
        };
        validate_thresholds(&thresholds)?;

        Ok(Config {
            scoring_api_url: require_env("SCORING_API_URL")?,
            redis_url: std::env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            session_ttl_secs: parse_env("SESSION_TTL_SECS", 86_400)?,
            refresh_interval: Duration::from_secs(parse_env("REFRESH_INTERVAL_SECS", 30)?),
            backend_timeout: Duration::from_secs(parse_env("BACKEND_TIMEOUT_SECS", 30)?),
            thresholds,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn validate_thresholds(thresholds: &TierThresholds) -> Result<()> {
    if !thresholds.shortlist.is_finite() || !thresholds.waitlist.is_finite() {
        bail!("Tier thresholds must be finite numbers");
    }
    if thresholds.waitlist > thresholds.shortlist {
        bail!(
            "WAITLIST_THRESHOLD ({}) must not exceed SHORTLIST_THRESHOLD ({})",
            thresholds.waitlist,
            thresholds.shortlist
        );
    }
    Ok(())
}
