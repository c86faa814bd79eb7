// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Runtime settings for the demo: window, backend and frame pacing, debug
// output, shader sources. Missing files and fields fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::backend::BackendKind;
use crate::frame::DEFAULT_FRAMES_IN_FLIGHT;
use crate::instance::DebugLevel;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
    pub shaders: ShaderConfig,
}

/// Window settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "frame-rhi triangle".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Graphics settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphicsConfig {
    /// "vulkan" or "mock"
    pub backend: String,
    pub frames_in_flight: usize,
    /// 0 waits forever.
    pub fence_timeout_ms: u64,
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: "vulkan".to_string(),
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            fence_timeout_ms: 1000,
            clear_color: [0.1, 0.2, 0.8, 1.0],
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// "none", "verbose", "warning" or "error"
    pub level: String,
    /// `env_logger` filter, overridden by `RUST_LOG`.
    pub log_filter: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            level: "warning".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

/// GLSL sources compiled at startup
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/triangle.vert"),
            fragment: PathBuf::from("shaders/triangle.frag"),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.graphics.frames_in_flight == 0 {
            anyhow::bail!("graphics.frames_in_flight must be at least 1");
        }
        Ok(config)
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self.graphics.backend.to_lowercase().as_str() {
            "vulkan" => BackendKind::Vulkan,
            "mock" => BackendKind::Mock,
            _ => {
                log::warn!(
                    "Unknown backend '{}', defaulting to vulkan",
                    self.graphics.backend
                );
                BackendKind::Vulkan
            }
        }
    }

    pub fn debug_level(&self) -> DebugLevel {
        match self.debug.level.to_lowercase().as_str() {
            "none" => DebugLevel::None,
            "verbose" => DebugLevel::Verbose,
            "warning" => DebugLevel::Warning,
            "error" => DebugLevel::Error,
            _ => {
                log::warn!("Unknown debug level '{}', disabling validation", self.debug.level);
                DebugLevel::None
            }
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.graphics.frames_in_flight.max(1)
    }

    /// `None` waits forever.
    pub fn fence_timeout(&self) -> Option<Duration> {
        match self.graphics.fence_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.frames_in_flight(), 2);
        assert_eq!(config.fence_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(config.backend_kind(), BackendKind::Vulkan);
        assert_eq!(config.debug_level(), DebugLevel::Warning);
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r#"
            [window]
            width = 640

            [graphics]
            backend = "Mock"
            frames_in_flight = 3
            fence_timeout_ms = 0

            [debug]
            level = "verbose"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.backend_kind(), BackendKind::Mock);
        assert_eq!(config.frames_in_flight(), 3);
        assert_eq!(config.fence_timeout(), None);
        assert_eq!(config.debug_level(), DebugLevel::Verbose);
    }

    #[test]
    fn zero_frames_in_flight_is_rejected() {
        let err = Config::parse("[graphics]\nframes_in_flight = 0\n").unwrap_err();
        assert!(err.to_string().contains("frames_in_flight"));
    }

    #[test]
    fn unknown_names_fall_back() {
        let config = Config::parse("[graphics]\nbackend = \"metal\"\n[debug]\nlevel = \"loud\"\n").unwrap();
        assert_eq!(config.backend_kind(), BackendKind::Vulkan);
        assert_eq!(config.debug_level(), DebugLevel::None);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::load_from_path("does/not/exist.toml").unwrap();
        assert_eq!(config, Config::default());
    }
}
