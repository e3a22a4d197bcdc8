//! Configuration loader for YAML files and environment overrides
//!
//! Options come from an optional YAML file (path in `TICKER_CONFIG`), then
//! individual environment variables override single fields, then the result
//! is validated once.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use crate::error::AppError;

use super::types::TickerOptions;

/// Load options from a YAML file and validate them
pub fn load_config(path: &Path) -> Result<TickerOptions, AppError> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let options: TickerOptions = serde_yaml::from_reader(reader).map_err(|e| {
        AppError::Config(format!("YAML parse error in '{}': {}", path.display(), e))
    })?;

    options.validate()?;

    Ok(options)
}

/// Load options from a YAML string (useful for testing)
pub fn load_config_from_str(yaml_content: &str) -> Result<TickerOptions, AppError> {
    let options: TickerOptions = serde_yaml::from_str(yaml_content)
        .map_err(|e| AppError::Config(format!("YAML parse error: {}", e)))?;

    options.validate()?;

    Ok(options)
}

/// Resolve the effective options: file (if `TICKER_CONFIG` is set), then env
pub fn load_options() -> Result<TickerOptions, AppError> {
    let mut options = match std::env::var("TICKER_CONFIG") {
        Ok(path) if !path.is_empty() => load_config(Path::new(&path))?,
        _ => TickerOptions::default(),
    };
    apply_env_overrides(&mut options)?;
    options.validate()?;
    Ok(options)
}

fn env_value<T: FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("Invalid value for {}: '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

fn env_flag(name: &str) -> Result<Option<bool>, AppError> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
            _ => Err(AppError::Config(format!("Invalid flag for {}: '{}'", name, raw))),
        },
        Err(_) => Ok(None),
    }
}

/// Override individual fields from environment variables
pub fn apply_env_overrides(options: &mut TickerOptions) -> Result<(), AppError> {
    if let Some(exchange) = env_value("EXCHANGE")? {
        options.exchange = exchange;
    }
    if let Some(n) = env_value("SHOW_FIRST")? {
        options.show_first = n;
    }
    if let Some(flag) = env_flag("VOL_SORTED")? {
        options.vol_sorted = flag;
    }
    if let Ok(unit) = std::env::var("VOL_UNIT") {
        let unit = unit.trim();
        options.vol_unit = match unit.to_lowercase().as_str() {
            "" | "none" | "off" => None,
            _ => Some(unit.to_uppercase()),
        };
    }
    if let Some(flag) = env_flag("HAS_24")? {
        options.truecolor = flag;
    } else if std::env::var("COLORTERM").map(|v| v == "truecolor" || v == "24bit").unwrap_or(false)
    {
        options.truecolor = true;
    }
    if let Some(flag) = env_flag("STRICT_TIME")? {
        options.strict_time = flag;
    }
    if let Some(style) = env_value("PULSE")? {
        options.pulse = style;
    }
    if let Some(pct) = env_value("PULSE_OVER")? {
        options.pulse_over = pct;
    }
    if let Some(style) = env_value("HEADING")? {
        options.heading = style;
    }
    if let Some(ratio) = env_value("MAX_STALE")? {
        options.max_stale = ratio;
    }
    if let Some(secs) = env_value("STALE_SECS")? {
        options.stale_secs = secs;
    }
    if let Some(secs) = env_value("POLL_INTERVAL")? {
        options.poll_interval_secs = secs;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{Exchange, HeadingStyle, PulseStyle};
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_CONFIG_YAML: &str = r#"
exchange: binance
show_first: 12
vol_unit: BTC
pulse: fast
pulse_over: 0.25
heading: slim
stale_secs: 30
"#;

    const ENV_VARS: &[&str] = &[
        "EXCHANGE", "SHOW_FIRST", "VOL_SORTED", "VOL_UNIT", "HAS_24", "COLORTERM",
        "STRICT_TIME", "PULSE", "PULSE_OVER", "HEADING", "MAX_STALE", "STALE_SECS",
        "POLL_INTERVAL", "TICKER_CONFIG",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_load_config_from_str_valid() {
        let options = load_config_from_str(VALID_CONFIG_YAML).unwrap();
        assert_eq!(options.exchange, Exchange::Binance);
        assert_eq!(options.show_first, 12);
        assert_eq!(options.vol_unit.as_deref(), Some("BTC"));
        assert_eq!(options.pulse, PulseStyle::Fast);
        assert_eq!(options.heading, HeadingStyle::Slim);
        // Unspecified fields keep their defaults
        assert!(options.strict_time);
        assert_eq!(options.max_stale, 0.5);
    }

    #[test]
    fn test_load_config_from_str_invalid_yaml() {
        let result = load_config_from_str("invalid: yaml: content: [");
        assert!(result.unwrap_err().to_string().contains("YAML parse error"));
    }

    #[test]
    fn test_load_config_from_str_validation_failure() {
        let result = load_config_from_str("max_stale: 2.0\n");
        assert!(result.unwrap_err().to_string().contains("max_stale"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/ticker.yaml"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Configuration file not found"));
    }

    #[test]
    fn test_load_config_from_file_valid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(VALID_CONFIG_YAML.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let options = load_config(temp_file.path()).unwrap();
        assert_eq!(options.show_first, 12);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("SHOW_FIRST", "8");
        std::env::set_var("VOL_UNIT", "none");
        std::env::set_var("HAS_24", "1");
        std::env::set_var("PULSE", "off");
        std::env::set_var("HEADING", "full");
        std::env::set_var("STRICT_TIME", "false");

        let mut options = TickerOptions::default();
        apply_env_overrides(&mut options).unwrap();
        clear_env();

        assert_eq!(options.show_first, 8);
        assert_eq!(options.vol_unit, None);
        assert!(options.truecolor);
        assert_eq!(options.pulse, PulseStyle::Off);
        assert_eq!(options.heading, HeadingStyle::Full);
        assert!(!options.strict_time);
    }

    #[test]
    #[serial]
    fn test_colorterm_enables_truecolor() {
        clear_env();
        std::env::set_var("COLORTERM", "truecolor");
        let mut options = TickerOptions::default();
        apply_env_overrides(&mut options).unwrap();
        clear_env();
        assert!(options.truecolor);
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_reported() {
        clear_env();
        std::env::set_var("STALE_SECS", "soon");
        let mut options = TickerOptions::default();
        let err = apply_env_overrides(&mut options).unwrap_err();
        clear_env();
        assert!(err.to_string().contains("STALE_SECS"), "Got: {}", err);
    }

    #[test]
    #[serial]
    fn test_load_options_reads_file_then_env() {
        clear_env();
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(VALID_CONFIG_YAML.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        std::env::set_var("TICKER_CONFIG", temp_file.path());
        std::env::set_var("SHOW_FIRST", "5");
        let options = load_options().unwrap();
        clear_env();

        assert_eq!(options.exchange, Exchange::Binance);
        assert_eq!(options.show_first, 5);
    }
}
