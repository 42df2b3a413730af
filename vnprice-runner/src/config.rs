//! Fetch configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Sections: `[range]`, `[retry]`, `[limits]`, `[output]`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use vnprice_core::analytics::ReturnWindow;
use vnprice_core::data::ThrottleLimits;
use vnprice_core::domain::{DateRange, RangeError};
use vnprice_core::fetch::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config [{section}] {key}: {reason}")]
    Invalid {
        section: &'static str,
        key: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Range(#[from] RangeError),
}

/// Upper bound on any configured delay, in seconds.
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Convert a delay in seconds without panicking on out-of-range input.
/// Values are clamped to `[0, MAX_DELAY_SECS]`; NaN becomes zero.
fn delay(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_DELAY_SECS)).unwrap_or(Duration::ZERO)
}

fn invalid(section: &'static str, key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        section,
        key,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub range: RangeConfig,
    pub retry: RetryConfig,
    pub limits: LimitsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    pub start: NaiveDate,
    /// Defaults to today when absent.
    pub end: Option<NaiveDate>,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default(),
            end: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub jitter: bool,
    /// Wait between consecutive chunks of one ticker in degraded mode.
    pub degraded_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 2.0,
            max_delay_secs: 60.0,
            jitter: true,
            degraded_delay_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Tickers fetched concurrently.
    pub max_workers: usize,
    /// Concurrent requests allowed against one source.
    pub max_in_flight_per_source: usize,
    pub requests_per_minute: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            max_in_flight_per_source: 2,
            requests_per_minute: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Summary sort column: `1d%`, `1w%`, `1m%` or `6m%`.
    pub sort_by: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            sort_by: "6m%".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FetchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(end) = self.range.end {
            DateRange::new(self.range.start, end)?;
        }

        let r = &self.retry;
        for (key, value) in [
            ("base_delay_secs", r.base_delay_secs),
            ("max_delay_secs", r.max_delay_secs),
            ("degraded_delay_secs", r.degraded_delay_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid("retry", key, "must be a non-negative number"));
            }
            if value > MAX_DELAY_SECS {
                return Err(invalid(
                    "retry",
                    key,
                    format!("must be at most {MAX_DELAY_SECS} seconds"),
                ));
            }
        }
        if !(4.0..=6.0).contains(&r.degraded_delay_secs) {
            tracing::warn!(
                degraded_delay_secs = r.degraded_delay_secs,
                "degraded delay outside the usual 4-6 s band"
            );
        }
        if r.max_delay_secs < r.base_delay_secs {
            return Err(invalid(
                "retry",
                "max_delay_secs",
                "must be at least base_delay_secs",
            ));
        }

        let l = &self.limits;
        if l.max_workers == 0 {
            return Err(invalid("limits", "max_workers", "must be at least 1"));
        }
        if l.max_in_flight_per_source == 0 {
            return Err(invalid(
                "limits",
                "max_in_flight_per_source",
                "must be at least 1",
            ));
        }
        if l.requests_per_minute == Some(0) {
            return Err(invalid("limits", "requests_per_minute", "must be at least 1"));
        }
        if l.timeout_secs == 0 {
            return Err(invalid("limits", "timeout_secs", "must be at least 1"));
        }

        if ReturnWindow::from_label(&self.output.sort_by).is_none() {
            return Err(invalid(
                "output",
                "sort_by",
                format!("unknown column '{}'", self.output.sort_by),
            ));
        }
        Ok(())
    }

    /// The configured range, with a missing end resolved to `today`.
    pub fn date_range(&self, today: NaiveDate) -> Result<DateRange, ConfigError> {
        Ok(DateRange::new(self.range.start, self.range.end.unwrap_or(today))?)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            base_delay: delay(self.retry.base_delay_secs),
            max_delay: delay(self.retry.max_delay_secs),
            jitter: self.retry.jitter,
        }
    }

    pub fn degraded_delay(&self) -> Duration {
        delay(self.retry.degraded_delay_secs)
    }

    pub fn throttle_limits(&self) -> ThrottleLimits {
        ThrottleLimits {
            max_in_flight: self.limits.max_in_flight_per_source,
            requests_per_minute: self.limits.requests_per_minute,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.limits.timeout_secs)
    }

    pub fn sort_window(&self) -> ReturnWindow {
        ReturnWindow::from_label(&self.output.sort_by).unwrap_or(ReturnWindow::SixMonths)
    }
}
