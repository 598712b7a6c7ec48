//! Configuration loading and path resolution.
//!
//! Everything lives under `~/.timekeeper/`:
//! - `daemon.toml`: race, daemon, overlay, and results settings
//! - `daemon.sock`: daemon socket
//! - `overlay.json`: latest overlay push
//! - `results.jsonl`: one line per finished session

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TimekeeperError};

const DEFAULT_RACE_DURATION_SECS: u64 = 300;
const DEFAULT_TICK_INTERVAL_MS: u64 = 50;
const MAX_TICK_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimekeeperConfig {
    pub race: RaceConfig,
    pub daemon: DaemonConfig,
    pub overlay: OverlayConfig,
    pub results: ResultsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Time allotted to one racer's session.
    pub duration_secs: u64,
}

impl RaceConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_RACE_DURATION_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// How long the event loop waits for a command before polling the timer.
    pub tick_interval_ms: u64,
}

impl DaemonConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    pub path: Option<PathBuf>,
}

impl TimekeeperConfig {
    pub fn validate(&self) -> Result<()> {
        if self.race.duration_secs == 0 {
            return Err(TimekeeperError::ConfigInvalid {
                field: "race.duration_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.daemon.tick_interval_ms == 0 || self.daemon.tick_interval_ms > MAX_TICK_INTERVAL_MS
        {
            return Err(TimekeeperError::ConfigInvalid {
                field: "daemon.tick_interval_ms".to_string(),
                reason: format!("must be between 1 and {}", MAX_TICK_INTERVAL_MS),
            });
        }
        Ok(())
    }

    pub fn overlay_path(&self) -> Result<PathBuf> {
        match &self.overlay.path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_timekeeper_dir()?.join("overlay.json")),
        }
    }

    pub fn results_path(&self) -> Result<PathBuf> {
        match &self.results.path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_timekeeper_dir()?.join("results.jsonl")),
        }
    }
}

/// Returns the path to the timekeeper directory (~/.timekeeper).
pub fn get_timekeeper_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".timekeeper"))
        .ok_or(TimekeeperError::HomeNotFound)
}

/// Returns the path to the daemon configuration file.
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_timekeeper_dir()?.join("daemon.toml"))
}

/// Loads the configuration, returning defaults if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<TimekeeperConfig> {
    if !path.exists() {
        return Ok(TimekeeperConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| TimekeeperError::Io {
        context: format!("reading {}", path.display()),
        source,
    })?;
    let config: TimekeeperConfig =
        toml::from_str(&content).map_err(|err| TimekeeperError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = load_config(&temp_dir.path().join("missing.toml")).expect("load config");
        assert_eq!(config, TimekeeperConfig::default());
        assert_eq!(config.race.duration(), Duration::from_secs(300));
        assert_eq!(config.daemon.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn load_config_parses_sections() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.toml");
        fs::write(
            &path,
            r#"
[race]
duration_secs = 180

[daemon]
tick_interval_ms = 20

[results]
path = "/var/lib/timekeeper/results.jsonl"
"#,
        )
        .expect("write config");

        let config = load_config(&path).expect("load config");
        assert_eq!(config.race.duration_secs, 180);
        assert_eq!(config.daemon.tick_interval_ms, 20);
        assert_eq!(config.overlay.path, None);
        assert_eq!(
            config.results_path().expect("results path"),
            PathBuf::from("/var/lib/timekeeper/results.jsonl")
        );
    }

    #[test]
    fn load_config_rejects_malformed_toml() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.toml");
        fs::write(&path, "[race\nduration_secs = ").expect("write config");

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, TimekeeperError::ConfigMalformed { .. }));
    }

    #[test]
    fn load_config_rejects_zero_duration() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.toml");
        fs::write(&path, "[race]\nduration_secs = 0\n").expect("write config");

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, TimekeeperError::ConfigInvalid { .. }));
    }
}
