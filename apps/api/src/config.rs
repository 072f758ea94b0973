use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::curation::scoring::DEFAULT_RECENCY_HALF_LIFE_DAYS;

/// Where the similarity report is read from.
#[derive(Debug, Clone)]
pub enum ReportLocation {
    File(PathBuf),
    S3 {
        bucket: String,
        key: String,
        endpoint: String,
        access_key_id: String,
        secret_access_key: String,
    },
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub report: ReportLocation,
    pub recency_half_life_days: f64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            report: report_location()?,
            recency_half_life_days: match std::env::var("RECENCY_HALF_LIFE_DAYS") {
                Ok(v) => parse_half_life(&v)?,
                Err(_) => DEFAULT_RECENCY_HALF_LIFE_DAYS,
            },
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn report_location() -> Result<ReportLocation> {
    if let Ok(path) = std::env::var("REPORT_PATH") {
        return Ok(ReportLocation::File(PathBuf::from(path)));
    }
    if let Ok(key) = std::env::var("REPORT_S3_KEY") {
        return Ok(ReportLocation::S3 {
            bucket: require_env("S3_BUCKET")?,
            key,
            endpoint: require_env("S3_ENDPOINT")?,
            access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
        });
    }
    bail!("Either REPORT_PATH or REPORT_S3_KEY must be set")
}

fn parse_half_life(raw: &str) -> Result<f64> {
    let days = raw
        .parse::<f64>()
        .context("RECENCY_HALF_LIFE_DAYS must be a number")?;
    if !days.is_finite() || days <= 0.0 {
        bail!("RECENCY_HALF_LIFE_DAYS must be positive, got {days}");
    }
    Ok(days)
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
