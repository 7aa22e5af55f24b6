use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("no [profile.{0}] section")]
    MissingProfile(String),
}

/// One extraction profile: which directory to watch and whose log files to
/// accept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    pub log_dir: PathBuf,
    pub user_display_name: String,
    /// Polling cadence for watch loops, seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_check_interval() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    profile: HashMap<String, Profile>,
}

/// Load one named profile from a TOML settings file:
///
/// ```toml
/// [profile.default]
/// log_dir = "/home/alice/.local/share/VRClient/logs"
/// user_display_name = "Alice"
/// check_interval_secs = 60
/// ```
pub fn load_profile(path: impl AsRef<Path>, name: &str) -> Result<Profile, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut parsed: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    parsed
        .profile
        .remove(name)
        .ok_or_else(|| ConfigError::MissingProfile(name.to_string()))
}
