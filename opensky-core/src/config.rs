//! Configuration file for the OpenSky tools.
//!
//! Reads `~/.opensky-tools/config.yaml` (or an explicit path) with pipeline
//! tuning, the trusted sensor types and progress reporting settings.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::pipeline::DEFAULT_TRUSTED_SENSORS;
use crate::types::{OpenskyError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub sensors: SensorConfig,
    pub progress: ProgressConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Seconds
    pub staleness_window: f64,
    /// Records
    pub sweep_interval: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    pub trusted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressConfig {
    pub enabled: bool,
    /// Seconds between rate updates
    pub interval: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pipeline: PipelineConfig {
                staleness_window: 3600.0,
                sweep_interval: 1_000_000,
            },
            sensors: SensorConfig {
                trusted: DEFAULT_TRUSTED_SENSORS.iter().map(|s| s.to_string()).collect(),
            },
            progress: ProgressConfig {
                enabled: true,
                interval: 1.0,
            },
        }
    }
}

/// Get the config directory path (`~/.opensky-tools/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".opensky-tools")
}

/// Get the default config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load the default config file, falling back to defaults if it is missing
/// or unreadable.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }
    load_config_from(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring unreadable config");
        Config::default()
    })
}

/// Load an explicitly named config file. A missing file is an error.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| OpenskyError::Config(format!("{}: {e}", path.display())))?;
    Ok(parse_config(&text))
}

/// Parse simple YAML-like config text. Invalid values keep their default.
pub fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = strip_comment(line).trim();
        if stripped.is_empty() {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');
        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }
        let Some(section) = current_section.as_deref() else {
            continue;
        };

        match (section, key) {
            ("pipeline", "staleness_window") => match parse_float_value(val) {
                Some(v) if v > 0.0 => config.pipeline.staleness_window = v,
                _ => invalid(section, key, val),
            },
            ("pipeline", "sweep_interval") => match val.parse::<u64>() {
                Ok(v) if v >= 1 => config.pipeline.sweep_interval = v,
                _ => invalid(section, key, val),
            },
            ("sensors", "trusted") => {
                let trusted: Vec<String> = parse_string_value(val)
                    .unwrap_or_default()
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if trusted.is_empty() {
                    invalid(section, key, val);
                } else {
                    config.sensors.trusted = trusted;
                }
            }
            ("progress", "enabled") => match val {
                "true" | "yes" | "on" => config.progress.enabled = true,
                "false" | "no" | "off" => config.progress.enabled = false,
                _ => invalid(section, key, val),
            },
            ("progress", "interval") => match parse_float_value(val) {
                Some(v) if v > 0.0 => config.progress.interval = v,
                _ => invalid(section, key, val),
            },
            _ => warn!(section, key, "unknown config key"),
        }
    }

    config
}

fn invalid(section: &str, key: &str, val: &str) {
    warn!(section, key, value = val, "invalid config value, keeping default");
}

/// Drop a trailing `# comment` that is not inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = None;
    for (i, c) in line.char_indices() {
        match (c, in_quotes) {
            ('"' | '\'', None) => in_quotes = Some(c),
            (q, Some(open)) if q == open => in_quotes = None,
            ('#', None) => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_float_value(val: &str) -> Option<f64> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    val.parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
