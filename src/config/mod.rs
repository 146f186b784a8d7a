// src/config/mod.rs
// All tunables load from the environment (.env supported), with defaults
// that match the original deployment.

use chrono::Weekday;
use once_cell::sync::Lazy;
use std::str::FromStr;

use crate::error::VigilError;

#[derive(Debug, Clone)]
pub struct VigilConfig {
    // ── Server Configuration
    pub host: String,
    pub port: u16,

    // ── Operator auth
    pub admin_access_key: String,

    // ── Storage layout
    pub data_dir: String,
    pub max_active: usize,
    pub retention_days: i64,

    // ── Probe targets
    pub scan_dir: String,
    pub env_file: String,
    pub gemini_model: String,
    pub gemini_timeout_secs: u64,

    // ── Alerting
    pub alerts_min_level: String,
    pub alerts_provider: String,
    pub alerts_webhook_url: String,
    pub alerts_recipient: String,

    // ── Cron guards (UTC)
    pub daily_hour: u32,
    pub weekly_day: String,

    // ── Logging
    pub log_level: String,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            // Tolerate trailing comments and whitespace in .env values
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl VigilConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            host: env_var_or("VIGIL_HOST", "0.0.0.0".to_string()),
            port: env_var_or("VIGIL_PORT", 3002),
            admin_access_key: env_var_or("ADMIN_ACCESS_KEY", String::new()),
            data_dir: env_var_or("VIGIL_DATA_DIR", "./logs".to_string()),
            max_active: env_var_or("SELFREPAIR_MAX_ACTIVE", 1000),
            retention_days: env_var_or("SELFREPAIR_RETENTION_DAYS", 30),
            scan_dir: env_var_or("VIGIL_SCAN_DIR", "./src".to_string()),
            env_file: env_var_or("VIGIL_ENV_FILE", "./.env.local".to_string()),
            gemini_model: env_var_or("GEMINI_MODEL", "gemini-1.5-flash".to_string()),
            gemini_timeout_secs: env_var_or("GEMINI_TIMEOUT_SECS", 15),
            alerts_min_level: env_var_or("ALERTS_MIN_LEVEL", "warn".to_string()),
            alerts_provider: env_var_or("ALERTS_PROVIDER", "log".to_string()),
            alerts_webhook_url: env_var_or("ALERTS_WEBHOOK_URL", String::new()),
            alerts_recipient: env_var_or("ALERTS_RECIPIENT", "ops".to_string()),
            daily_hour: env_var_or("SELFREPAIR_DAILY_HOUR", 0),
            weekly_day: env_var_or("SELFREPAIR_WEEKLY_DAY", "sun".to_string()),
            log_level: env_var_or("VIGIL_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Reject settings that cannot be mapped to runtime values. Checked
    /// once at startup, before any state is built.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.daily_hour > 23 {
            return Err(VigilError::Config(format!(
                "SELFREPAIR_DAILY_HOUR must be 0-23, got {}",
                self.daily_hour
            )));
        }
        if self.max_active == 0 {
            return Err(VigilError::Config(
                "SELFREPAIR_MAX_ACTIVE must be at least 1".to_string(),
            ));
        }
        if self.retention_days < 1 {
            return Err(VigilError::Config(
                "SELFREPAIR_RETENTION_DAYS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Weekly trigger weekday, defaulting to Sunday on malformed input
    pub fn weekly_weekday(&self) -> Weekday {
        self.weekly_day.parse().unwrap_or(Weekday::Sun)
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<VigilConfig> = Lazy::new(VigilConfig::from_env);
