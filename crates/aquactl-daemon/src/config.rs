//! Daemon configuration – reads `~/.aquactl/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Persisted daemon configuration stored in `~/.aquactl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the crash-recovery state record.  Empty disables persistence.
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// Supervisory tick interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Valve travel timeout in seconds.
    #[serde(default = "default_valve_timeout_secs")]
    pub valve_timeout_secs: u64,

    /// Whether the valves carry end-stop switches.
    #[serde(default)]
    pub valve_feedback: bool,

    /// Number of leak-detector inputs.
    #[serde(default = "default_leak_sensors")]
    pub leak_sensors: usize,

    /// How long the hot supply must stay warm before auto mode switches
    /// back to it, in seconds.
    #[serde(default = "default_recover_delay_secs")]
    pub recover_delay_secs: u64,

    /// How often the full status snapshot is logged, in ticks.  Zero
    /// disables the snapshot.
    #[serde(default = "default_status_every_ticks")]
    pub status_every_ticks: u64,
}

fn default_state_file() -> String {
    "state.bin".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_valve_timeout_secs() -> u64 {
    30
}
fn default_leak_sensors() -> usize {
    1
}
fn default_recover_delay_secs() -> u64 {
    60
}
fn default_status_every_ticks() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            poll_interval_ms: default_poll_interval_ms(),
            valve_timeout_secs: default_valve_timeout_secs(),
            valve_feedback: false,
            leak_sensors: default_leak_sensors(),
            recover_delay_secs: default_recover_delay_secs(),
            status_every_ticks: default_status_every_ticks(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn valve_timeout(&self) -> Duration {
        Duration::from_secs(self.valve_timeout_secs)
    }

    pub fn recover_delay(&self) -> Duration {
        Duration::from_secs(self.recover_delay_secs)
    }

    pub fn state_file_path(&self) -> Option<PathBuf> {
        if self.state_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.state_file))
        }
    }
}

/// Return the path to `~/.aquactl/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".aquactl").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `AQUACTL_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `AQUACTL_STATE_FILE` | `state_file` |
/// | `AQUACTL_POLL_INTERVAL_MS` | `poll_interval_ms` |
/// | `AQUACTL_VALVE_TIMEOUT_SECS` | `valve_timeout_secs` |
/// | `AQUACTL_RECOVER_DELAY_SECS` | `recover_delay_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("AQUACTL_STATE_FILE") {
        cfg.state_file = v;
    }
    if let Ok(v) = std::env::var("AQUACTL_POLL_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.poll_interval_ms = ms;
    }
    if let Ok(v) = std::env::var("AQUACTL_VALVE_TIMEOUT_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.valve_timeout_secs = secs;
    }
    if let Ok(v) = std::env::var("AQUACTL_RECOVER_DELAY_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.recover_delay_secs = secs;
    }
}

/// Save the config to disk, creating `~/.aquactl/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.poll_interval_ms, 1000);
        assert_eq!(loaded.valve_timeout_secs, 30);
        assert_eq!(loaded.leak_sensors, 1);
        assert!(!loaded.valve_feedback);
    }

    #[test]
    fn config_path_points_to_aquactl_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".aquactl"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let result = load_from(&path).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn empty_state_file_disables_persistence() {
        let cfg = Config { state_file: String::new(), ..Default::default() };
        assert!(cfg.state_file_path().is_none());
    }

    #[test]
    fn apply_env_overrides_changes_state_file() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("AQUACTL_STATE_FILE", "/tmp/aquactl-state.bin") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.state_file, "/tmp/aquactl-state.bin");
        unsafe { std::env::remove_var("AQUACTL_STATE_FILE") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_interval() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("AQUACTL_POLL_INTERVAL_MS", "not-a-number") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.poll_interval_ms, 1000);
        unsafe { std::env::remove_var("AQUACTL_POLL_INTERVAL_MS") };
    }
}
