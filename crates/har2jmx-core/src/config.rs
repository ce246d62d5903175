//! Configuration management for HAR conversion.
//!
//! This module defines the `Config` struct holding every conversion setting.
//! The configuration can be loaded from a YAML or TOML file, created
//! programmatically, or assembled from command-line arguments.
//!
//! # Examples
//!
//! ```no_run
//! use har2jmx_core::config::Config;
//!
//! let mut config = Config::new("capture.har", "script.jmx");
//! config.new_group_after_ms = 5000;
//! config.include_regex = Some("https://mysite/.*".to_string());
//! ```

// Internal imports (std, crate)
use std::path::Path;
use std::str::FromStr;

// External imports (alphabetized)
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Where transaction annotations come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSourceKind {
    /// No annotations; groups come from pages and time gaps only
    #[default]
    None,
    /// A `;`-separated CSV of `timestamp;TRANSACTION;name;start|end` lines
    ExternalCsv,
}

/// Configuration for a HAR conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path or HTTP/HTTPS URL of the HAR capture
    pub har_path: String,

    /// Path of the JMeter script to write
    pub jmx_out: String,

    /// Optional path of the recorded results file to write
    #[serde(default)]
    pub record_out: Option<String>,

    /// Keep only URLs where this pattern is found
    #[serde(default)]
    pub include_regex: Option<String>,

    /// Drop URLs where this pattern is found; wins over `include_regex`
    #[serde(default)]
    pub exclude_regex: Option<String>,

    /// Open a new transaction group when two requests of a single-page
    /// capture are more than this many milliseconds apart (0 disables)
    #[serde(default)]
    pub new_group_after_ms: u64,

    /// Insert pauses between transaction groups
    #[serde(default = "default_true")]
    pub add_pause: bool,

    /// Drop the `Cookie` request header (a cookie manager replaces it)
    #[serde(default = "default_true")]
    pub remove_cookie: bool,

    /// Drop conditional cache request headers (a cache manager replaces them)
    #[serde(default = "default_true")]
    pub remove_cache_headers: bool,

    /// First transaction group number
    #[serde(default = "default_start_number")]
    pub page_start_number: u32,

    /// First sampler number
    #[serde(default = "default_start_number")]
    pub action_start_number: u32,

    #[serde(default)]
    pub annotation_source: AnnotationSourceKind,

    /// Path of the annotation file when `annotation_source` needs one
    #[serde(default)]
    pub annotation_path: Option<String>,

    /// How far (ms) outside an annotation window a timestamp may fall and
    /// still be attributed to the nearest window; unset means no limit
    #[serde(default)]
    pub annotation_tolerance_ms: Option<u64>,

    /// Convert WebSocket connections with the WebSocket samplers plugin
    #[serde(default)]
    pub websocket: bool,

    /// Add a disabled recorder with a results viewer reading `record_out`
    #[serde(default = "default_true")]
    pub add_result_tree_record: bool,
}

impl Config {
    /// Create a new Config with default values
    pub fn new(har_path: impl Into<String>, jmx_out: impl Into<String>) -> Self {
        Self {
            har_path: har_path.into(),
            jmx_out: jmx_out.into(),
            record_out: None,
            include_regex: None,
            exclude_regex: None,
            new_group_after_ms: 0,
            add_pause: true,
            remove_cookie: true,
            remove_cache_headers: true,
            page_start_number: default_start_number(),
            action_start_number: default_start_number(),
            annotation_source: AnnotationSourceKind::None,
            annotation_path: None,
            annotation_tolerance_ms: None,
            websocket: false,
            add_result_tree_record: true,
        }
    }

    /// Load configuration from a file; `.toml` files are read as TOML,
    /// anything else as YAML
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let mut config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        config.page_start_number = clamp_start_number("page_start_number", config.page_start_number);
        config.action_start_number =
            clamp_start_number("action_start_number", config.action_start_number);
        Ok(config)
    }

    /// Save configuration to a file
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

/// Parse a numeric option, falling back to `default` with a warning when the
/// raw value is not a number.
pub fn parse_number_or<T>(name: &str, raw: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            log::warn!(
                "Can't parse {} value '{}', using default {}",
                name,
                raw,
                default
            );
            default
        }
    }
}

/// Largest accepted page or sampler start number.
pub const MAX_START_NUMBER: u32 = 1_000_000;

/// Parse a start number; values that are not numbers or out of
/// `1..=MAX_START_NUMBER` fall back to 1 with a warning.
pub fn parse_start_number(name: &str, raw: &str) -> u32 {
    let value = parse_number_or::<i64>(name, raw, 1);
    if value <= 0 || value > i64::from(MAX_START_NUMBER) {
        log::warn!("{} must be in 1..={}, got {}, using 1", name, MAX_START_NUMBER, value);
        return 1;
    }
    clamp_start_number(name, u32::try_from(value).unwrap_or(1))
}

/// Bring a start number back to 1 when it is 0 or above `MAX_START_NUMBER`.
pub fn clamp_start_number(name: &str, value: u32) -> u32 {
    if value == 0 || value > MAX_START_NUMBER {
        log::warn!("{} must be in 1..={}, got {}, using 1", name, MAX_START_NUMBER, value);
        return 1;
    }
    value
}

fn default_true() -> bool {
    true
}

fn default_start_number() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_config_roundtrip() -> crate::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("config.yaml");

        let mut config = Config::new("capture.har", "script.jmx");
        config.exclude_regex = Some(r"\.png$".to_string());
        config.save(&file_path).await?;

        let loaded = Config::from_file(&file_path).await?;
        assert_eq!(loaded.har_path, "capture.har");
        assert_eq!(loaded.jmx_out, "script.jmx");
        assert_eq!(loaded.exclude_regex.as_deref(), Some(r"\.png$"));
        assert_eq!(loaded.include_regex, None);
        assert!(loaded.add_pause);
        assert!(loaded.remove_cookie);
        assert!(loaded.remove_cache_headers);
        assert_eq!(loaded.page_start_number, 1);
        assert_eq!(loaded.annotation_source, AnnotationSourceKind::None);

        Ok(())
    }

    #[tokio::test]
    async fn test_toml_defaults() -> crate::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("config.toml");
        fs::write(
            &file_path,
            "har_path = \"in.har\"\njmx_out = \"out.jmx\"\npage_start_number = 0\nannotation_source = \"external_csv\"\n",
        )
        .await?;

        let loaded = Config::from_file(&file_path).await?;
        assert_eq!(loaded.page_start_number, 1);
        assert_eq!(loaded.action_start_number, 1);
        assert_eq!(loaded.annotation_source, AnnotationSourceKind::ExternalCsv);
        assert!(loaded.add_result_tree_record);
        assert!(!loaded.websocket);
        Ok(())
    }

    #[test]
    fn test_parse_number_falls_back() {
        assert_eq!(parse_number_or::<u64>("new_group_after_ms", "5000", 0), 5000);
        assert_eq!(parse_number_or::<u64>("new_group_after_ms", "5s", 0), 0);
        assert_eq!(parse_start_number("page_start_number", "50"), 50);
        assert_eq!(parse_start_number("page_start_number", "-3"), 1);
        assert_eq!(parse_start_number("page_start_number", "abc"), 1);
    }

    #[test]
    fn test_huge_start_number_falls_back() {
        assert_eq!(parse_start_number("sampler_start_number", "4294967295"), 1);
        assert_eq!(parse_start_number("sampler_start_number", "99999999999"), 1);
        assert_eq!(parse_start_number("sampler_start_number", "1000000"), MAX_START_NUMBER);
        assert_eq!(clamp_start_number("action_start_number", u32::MAX), 1);
        assert_eq!(clamp_start_number("action_start_number", 250), 250);
    }
}
