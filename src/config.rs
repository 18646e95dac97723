//! Configuration management for the window-control daemon.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use crate::types::{CaptureMode, CapturePriority};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            polling: PollingConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the tracker is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Target poll cycle interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Timeout for the fallback title query against slow windows
    #[serde(default = "default_title_timeout_ms")]
    pub title_timeout_ms: u64,

    /// Titles longer than this are treated as retrieval failures
    #[serde(default = "default_title_max_len")]
    pub title_max_len: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 16,
            title_timeout_ms: 100,
            title_max_len: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Capture mode assigned to newly tracked windows
    #[serde(default = "default_window_mode")]
    pub window_mode: CaptureMode,

    /// Capture mode assigned to newly tracked desktops
    #[serde(default = "default_desktop_mode")]
    pub desktop_mode: CaptureMode,

    /// Priority used when the daemon issues its own capture requests
    #[serde(default = "default_priority")]
    pub default_priority: CapturePriority,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            window_mode: CaptureMode::GraphicsCapture,
            desktop_mode: CaptureMode::BitBlt,
            default_priority: CapturePriority::Middle,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval_ms() -> u64 {
    16
}

fn default_title_timeout_ms() -> u64 {
    100
}

fn default_title_max_len() -> usize {
    256
}

fn default_window_mode() -> CaptureMode {
    CaptureMode::GraphicsCapture
}

fn default_desktop_mode() -> CaptureMode {
    CaptureMode::BitBlt
}

fn default_priority() -> CapturePriority {
    CapturePriority::Middle
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("window-control")
            .join("config.toml")
    }

    /// Save configuration to the default path
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to_path(Self::default_config_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
