//! Configuration types for the ticker display
//!
//! `TickerOptions` is loaded once (YAML file, then environment overrides),
//! validated, and handed to each component by reference. Nothing mutates it
//! after startup.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ============================================================================
// Enums
// ============================================================================

/// Supported exchanges
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    #[default]
    Hitbtc,
    Binance,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Hitbtc => write!(f, "hitbtc"),
            Exchange::Binance => write!(f, "binance"),
        }
    }
}

impl FromStr for Exchange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hitbtc" => Ok(Exchange::Hitbtc),
            "binance" => Ok(Exchange::Binance),
            other => Err(AppError::Config(format!("Unsupported exchange '{}'", other))),
        }
    }
}

/// Price-move flash animation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PulseStyle {
    #[default]
    Normal,
    Fast,
    Off,
}

impl PulseStyle {
    /// How long the flash frame stays up before the afterglow frame
    pub fn frame_duration(&self) -> Duration {
        match self {
            PulseStyle::Fast => Duration::from_micros(76_400),
            _ => Duration::from_millis(124),
        }
    }
}

impl FromStr for PulseStyle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(PulseStyle::Normal),
            "fast" => Ok(PulseStyle::Fast),
            "off" | "none" | "" => Ok(PulseStyle::Off),
            other => Err(AppError::Config(format!("Unknown pulse style '{}'", other))),
        }
    }
}

/// Heading drawn above the board
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeadingStyle {
    #[default]
    Normal,
    HrOver,
    HrUnder,
    Full,
    Slim,
}

impl HeadingStyle {
    /// Terminal rows taken by the heading
    pub fn rows(&self) -> u16 {
        match self {
            HeadingStyle::Slim => 1,
            HeadingStyle::Normal | HeadingStyle::HrOver | HeadingStyle::HrUnder => 2,
            HeadingStyle::Full => 3,
        }
    }
}

impl FromStr for HeadingStyle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(HeadingStyle::Normal),
            "hr_over" => Ok(HeadingStyle::HrOver),
            "hr_under" => Ok(HeadingStyle::HrUnder),
            "full" => Ok(HeadingStyle::Full),
            "slim" => Ok(HeadingStyle::Slim),
            other => Err(AppError::Config(format!("Unknown heading style '{}'", other))),
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Display and feed options for one ticker session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TickerOptions {
    pub exchange: Exchange,
    /// Number of volume leaders shown when no pairs are given
    pub show_first: usize,
    /// Order rows by converted volume, largest first
    pub vol_sorted: bool,
    /// Unit for the volume column; `None` shows raw base volume
    pub vol_unit: Option<String>,
    /// 24-bit color escapes instead of the 256-color palette
    pub truecolor: bool,
    /// Abort when too many symbols go stale
    pub strict_time: bool,
    pub pulse: PulseStyle,
    /// Price move, in percent of the last rendered price, that triggers a flash
    pub pulse_over: f64,
    pub heading: HeadingStyle,
    /// Maximum fraction of stale symbols tolerated in strict mode
    pub max_stale: f64,
    /// Age after which a snapshot is considered stale
    pub stale_secs: f64,
    /// Watchdog sweep interval
    pub poll_interval_secs: f64,
    pub reply_timeout_secs: f64,
    /// Fixed per-row refresh interval; defaults to 100ms per displayed row
    pub render_interval_ms: Option<u64>,
}

impl Default for TickerOptions {
    fn default() -> Self {
        Self {
            exchange: Exchange::Hitbtc,
            show_first: 24,
            vol_sorted: true,
            vol_unit: Some("USD".to_string()),
            truecolor: false,
            strict_time: true,
            pulse: PulseStyle::Normal,
            pulse_over: 0.125,
            heading: HeadingStyle::Normal,
            max_stale: 0.5,
            stale_secs: 15.0,
            poll_interval_secs: 10.0,
            reply_timeout_secs: 10.0,
            render_interval_ms: None,
        }
    }
}

impl TickerOptions {
    /// Validate option ranges
    pub fn validate(&self) -> Result<(), AppError> {
        if self.show_first == 0 {
            return Err(AppError::Config("show_first must be at least 1".to_string()));
        }

        if !self.pulse_over.is_finite() || self.pulse_over <= 0.0 {
            return Err(AppError::Config(format!(
                "pulse_over must be a positive percentage (got {})",
                self.pulse_over
            )));
        }

        if !self.max_stale.is_finite() || self.max_stale < 0.0 || self.max_stale > 1.0 {
            return Err(AppError::Config(format!(
                "max_stale must be between 0 and 1 (got {})",
                self.max_stale
            )));
        }

        for (name, value) in [
            ("stale_secs", self.stale_secs),
            ("poll_interval_secs", self.poll_interval_secs),
            ("reply_timeout_secs", self.reply_timeout_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::Config(format!(
                    "{} must be a positive number of seconds (got {})",
                    name, value
                )));
            }
        }

        if let Some(unit) = &self.vol_unit {
            if unit.is_empty() || !unit.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(AppError::Config(format!(
                    "vol_unit must be a currency code (got '{}')",
                    unit
                )));
            }
        }

        Ok(())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs_f64(self.stale_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.reply_timeout_secs)
    }

    /// Flash threshold in percent, `None` when flashes are off
    pub fn pulse_threshold(&self) -> Option<Decimal> {
        match self.pulse {
            PulseStyle::Off => None,
            _ => Decimal::from_f64(self.pulse_over),
        }
    }

    /// Upper-cased volume unit
    pub fn volume_unit(&self) -> Option<String> {
        self.vol_unit.as_ref().map(|u| u.to_uppercase())
    }

    /// Per-row refresh interval for a board of `rows` rows
    pub fn render_interval(&self, rows: usize) -> Duration {
        match self.render_interval_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_millis(100 * rows.max(1) as u64),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
