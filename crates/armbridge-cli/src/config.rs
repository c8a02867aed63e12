//! Configuration vault – reads/writes `~/.armbridge/config.toml`.
//!
//! ```toml
//! default_robot_type = "arduino"
//! default_endpoint = "/dev/ttyACM0"
//! log_format = "compact"
//!
//! [adapters.arduino]
//! baud_rate = 115200
//! command_format = "gcode"
//!
//! [adapters.arduino.pacing]
//! boot_ms = 2500
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use armbridge_hal::AdapterConfig;
use serde::{Deserialize, Serialize};

/// Log output style for the `tracing` subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "pretty" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Persisted user configuration stored in `~/.armbridge/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Robot type `/connect` uses when none is given.
    #[serde(default = "default_robot_type")]
    pub default_robot_type: String,

    /// Endpoint `/connect` uses when none is given (host, `host:port` or
    /// serial port path).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_endpoint: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Per-family adapter settings, keyed by robot type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub adapters: BTreeMap<String, AdapterConfig>,
}

fn default_robot_type() -> String {
    "custom".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_robot_type: default_robot_type(),
            default_endpoint: String::new(),
            log_format: LogFormat::default(),
            adapters: BTreeMap::new(),
        }
    }
}

impl Config {
    /// The `[adapters.<robot_type>]` table, or defaults when absent.
    pub fn adapter(&self, robot_type: &str) -> AdapterConfig {
        self.adapters.get(robot_type).cloned().unwrap_or_default()
    }
}

/// `ARMBRIDGE_CONFIG` if set, otherwise `~/.armbridge/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("ARMBRIDGE_CONFIG")
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".armbridge").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
///
/// Environment overrides are not applied here; see [`apply_env_overrides`].
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply `ARMBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ARMBRIDGE_ROBOT_TYPE` | `default_robot_type` |
/// | `ARMBRIDGE_ENDPOINT` | `default_endpoint` |
/// | `ARMBRIDGE_LOG_FORMAT` | `log_format` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ARMBRIDGE_ROBOT_TYPE") {
        cfg.default_robot_type = v;
    }
    if let Ok(v) = std::env::var("ARMBRIDGE_ENDPOINT") {
        cfg.default_endpoint = v;
    }
    if let Ok(v) = std::env::var("ARMBRIDGE_LOG_FORMAT")
        && let Ok(format) = v.parse::<LogFormat>()
    {
        cfg.log_format = format;
    }
}

/// Save the config to disk, creating the parent directory if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
