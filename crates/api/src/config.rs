//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use saga::{ActivityOptions, OptionsError, RiskPolicy};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `ACTIVITY_START_TO_CLOSE_SECS` — per-attempt budget (default: `15`)
/// - `ACTIVITY_SCHEDULE_TO_CLOSE_SECS` — total budget per call (default: `60`)
/// - `ACTIVITY_MAX_ATTEMPTS` — attempt limit, `0` for none (default: `0`)
/// - `ACTIVITY_MAX_CONCURRENCY` — activities running at once (default: `64`)
/// - `RISK_POLICY` — `reject` or `log-only` (default: `reject`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub activity_start_to_close: Duration,
    pub activity_schedule_to_close: Duration,
    pub activity_max_attempts: u32,
    pub activity_max_concurrency: usize,
    pub risk_policy: RiskPolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            activity_start_to_close: Duration::from_secs(env_or(
                "ACTIVITY_START_TO_CLOSE_SECS",
                defaults.activity_start_to_close.as_secs(),
            )),
            activity_schedule_to_close: Duration::from_secs(env_or(
                "ACTIVITY_SCHEDULE_TO_CLOSE_SECS",
                defaults.activity_schedule_to_close.as_secs(),
            )),
            activity_max_attempts: env_or("ACTIVITY_MAX_ATTEMPTS", defaults.activity_max_attempts),
            activity_max_concurrency: env_or(
                "ACTIVITY_MAX_CONCURRENCY",
                defaults.activity_max_concurrency,
            ),
            risk_policy: env_or("RISK_POLICY", defaults.risk_policy),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds validated activity options from the configured budgets.
    pub fn activity_options(&self) -> Result<ActivityOptions, OptionsError> {
        let options = ActivityOptions::with_budgets(
            self.activity_start_to_close,
            self.activity_schedule_to_close,
        )
        .max_attempts(self.activity_max_attempts);
        options.validate()?;
        Ok(options)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            activity_start_to_close: ActivityOptions::DEFAULT_START_TO_CLOSE,
            activity_schedule_to_close: ActivityOptions::DEFAULT_SCHEDULE_TO_CLOSE,
            activity_max_attempts: 0,
            activity_max_concurrency: saga::activities::retrying::DEFAULT_MAX_CONCURRENCY,
            risk_policy: RiskPolicy::Reject,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable config value");
            default
        }),
        Err(_) => default,
    }
}
