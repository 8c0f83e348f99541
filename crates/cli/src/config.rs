//! `.gcpspectre.yaml` configuration loading
//!
//! Field precedence everywhere is CLI flag > config file > built-in
//! default; this module only supplies the file layer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

const CONFIG_CANDIDATES: &[&str] = &[".gcpspectre.yaml", ".gcpspectre.yml"];

/// Configuration file contents. Every field is optional; missing values
/// fall through to the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub projects: Vec<String>,
    pub idle_days: Option<u32>,
    pub stale_days: Option<u32>,
    pub min_monthly_cost: Option<f64>,
    pub format: Option<String>,
    pub timeout: Option<String>,
    pub exclude: ExcludeSection,
}

/// Exclusion rules as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExcludeSection {
    pub resource_ids: Vec<String>,
    /// Entries are `"key=value"` or bare `"key"` (key-only matches any value).
    pub labels: Vec<String>,
}

/// Search `dir` for a config file and parse it. A missing file yields the
/// default config; a malformed one is a hard error.
pub fn load(dir: &Path) -> Result<(FileConfig, Option<PathBuf>)> {
    for candidate in CONFIG_CANDIDATES {
        let path = dir.join(candidate);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("read config {}", path.display()))
            }
        };

        let cfg: FileConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("parse config {}", path.display()))?;
        return Ok((cfg, Some(path)));
    }
    Ok((FileConfig::default(), None))
}

/// Convert `"key=value"` / `"key"` entries into the exclusion label map.
/// Key-only entries map to an empty value, which means "match any value".
pub fn parse_labels(entries: &[String]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (entry.clone(), String::new()),
        })
        .collect()
}

/// Parse a duration string: `"90s"`, `"10m"`, `"2h"`, `"1h30m"`, or a bare
/// number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        bail!("empty duration");
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut digits = String::new();
    for ch in trimmed.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let value: u64 = digits
            .parse()
            .with_context(|| format!("invalid duration '{trimmed}'"))?;
        digits.clear();
        let unit = match ch {
            's' => Duration::from_secs(value),
            'm' => Duration::from_secs(value * 60),
            'h' => Duration::from_secs(value * 3600),
            _ => bail!("invalid duration unit '{ch}' in '{trimmed}'"),
        };
        total += unit;
    }
    if !digits.is_empty() {
        bail!("trailing digits without a unit in '{trimmed}'");
    }
    Ok(total)
}
