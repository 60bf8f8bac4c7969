//! Optional `config.toml` with defaults for the `imgcache` binary.
//!
//! ```toml
//! cache_dir = "/var/cache/imgcache"
//! timeout_secs = 10
//! max_attempts = 3
//! fade_ms = 250
//! cache_enabled = true
//! verbosity = "quiet"
//! ```
//!
//! Every key is optional. Unknown keys are rejected so a typo never
//! silently falls back to a default.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

const TIMEOUT_SECS_RANGE: RangeInclusive<u64> = 1..=3600;
const MAX_ATTEMPTS_RANGE: RangeInclusive<u32> = 1..=10;
const FADE_MS_RANGE: RangeInclusive<u64> = 0..=10_000;

/// Defaults read from the config file; command-line flags win over these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub cache_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub fade_ms: Option<u64>,
    pub cache_enabled: Option<bool>,
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Parses and range-checks a config document.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.check_ranges()?;
        Ok(config)
    }

    fn check_ranges(&self) -> Result<()> {
        check_range("timeout_secs", self.timeout_secs, &TIMEOUT_SECS_RANGE)?;
        check_range("max_attempts", self.max_attempts, &MAX_ATTEMPTS_RANGE)?;
        check_range("fade_ms", self.fade_ms, &FADE_MS_RANGE)
    }
}

fn check_range<T>(key: &str, value: Option<T>, range: &RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if let Some(value) = value {
        ensure!(
            range.contains(&value),
            "`{key}` = {value} is outside {}..={}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Log verbosity chosen in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbositySetting {
    #[default]
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log level used when neither `RUST_LOG` nor CLI flags decide.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Where the config was looked for and what was found there.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub config: Option<FileConfig>,
}

/// `imgcache/config.toml` under the user's config directory, if one is known.
///
/// `$XDG_CONFIG_HOME` is preferred over `$HOME/.config`; empty values are
/// treated as unset.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    let non_empty = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty());
    let config_home = non_empty("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| non_empty("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(config_home.join("imgcache").join("config.toml"))
}

/// Reads the config at [`default_config_path`]. A missing file is not an error.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = default_config_path();
    let config = match &path {
        Some(path) if path.is_file() => Some(load_file_config(path)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file {}", path.display()))?;
    FileConfig::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}
