//! Configuration loading and types for voxmouse
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/voxmouse/config.toml)
//! 3. CLI arguments (highest priority)

use crate::error::VoxmouseError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Voxmouse Configuration
#
# Location: ~/.config/voxmouse/config.toml
# All settings can be overridden via CLI flags

[server]
# Address the event stream listens on
bind = "127.0.0.1"

# TCP port for the companion-app event stream
port = 3395

[pipeline]
# Decode mSBC audio riding inside input reports into PCM16.
# When false, long-press recording still emits button events but no
# ON_VOICE_DATA messages.
decode = true

# Clean decoded audio (100 Hz high-pass, energy gate, smoothing)
denoise = true

# Answer CHECK_PERMISSIONS by querying the OS input-monitoring permission.
# When false, the command is answered as authorized without querying.
permission_check = true

# Remember the 2.4G dongle identifier across restarts
# (one text file under the per-user data directory)
persistence = true
"#;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// TCP event stream configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address for the listening socket
    #[serde(default = "default_bind")]
    pub bind: String,

    /// TCP port (default 3395)
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Capability flags for the report-processing pipeline.
///
/// Each stage can be disabled independently; button and device events flow
/// regardless.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Decode in-report mSBC audio to PCM16
    #[serde(default = "default_true")]
    pub decode: bool,

    /// Apply the denoise filter to decoded PCM
    #[serde(default = "default_true")]
    pub denoise: bool,

    /// Consult the OS permission probe for CHECK_PERMISSIONS
    #[serde(default = "default_true")]
    pub permission_check: bool,

    /// Persist the discovered dongle identifier to disk
    #[serde(default = "default_true")]
    pub persistence: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decode: true,
            denoise: true,
            permission_check: true,
            persistence: true,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3395
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Listen address in `host:port` form
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    /// Per-user config file location
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("voxmouse").join("config.toml"))
    }

    /// Per-user data directory (holds the cached dongle identifier)
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("voxmouse"))
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, VoxmouseError> {
        toml::to_string_pretty(self).map_err(|e| VoxmouseError::Config(e.to_string()))
    }
}

/// Load configuration from the given path, or the default location.
///
/// An explicitly passed path must exist; the default path is optional and
/// missing means built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, VoxmouseError> {
    let (path, required) = match path {
        Some(p) => (Some(p.to_path_buf()), true),
        None => (Config::default_config_path(), false),
    };

    let Some(path) = path else {
        return Ok(Config::default());
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let config: Config = toml::from_str(&contents)
                .map_err(|e| VoxmouseError::Config(format!("{}: {}", path.display(), e)))?;
            tracing::debug!("Loaded config from {:?}", path);
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            tracing::debug!("No config file at {:?}, using defaults", path);
            Ok(Config::default())
        }
        Err(e) => Err(VoxmouseError::Config(format!("{}: {}", path.display(), e))),
    }
}
