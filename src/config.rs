//! Configuration file support for the canvas engine.
//!
//! All thresholds, debounce windows and appearance settings live in an
//! [`EngineConfig`] that can be exported to and imported from JSON.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{drawing, render, timing, zoom};
use crate::input::KeyBindings;

/// Log level setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Engine configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Interaction thresholds
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Debounce windows
    #[serde(default)]
    pub timing: TimingConfig,

    /// Shape appearance
    #[serde(default)]
    pub appearance: Appearance,

    /// Behavior toggles
    #[serde(default)]
    pub behavior: Behavior,

    /// Tool hotkeys
    #[serde(default)]
    pub key_bindings: KeyBindings,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Numeric thresholds used by the interaction algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    pub wheel_delta_clamp: f64,
    pub wheel_batch_clamp: f64,
    pub wheel_base: f64,
    pub wheel_sensitivity: f64,
    pub min_rectangle_size: f64,
    pub polygon_snap_distance: f64,
    pub rubber_band_min_size: f64,
    /// Screen pixels.
    pub click_drag_threshold: f64,
    /// Screen pixels.
    pub handle_hit_radius: f64,
    /// Screen pixels.
    pub outline_hit_tolerance: f64,
    /// Screen pixels.
    pub point_hit_radius: f64,
    pub cull_padding: f64,
    pub hover_disable_threshold: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_zoom: zoom::MIN,
            max_zoom: zoom::MAX,
            zoom_step: zoom::STEP,
            wheel_delta_clamp: zoom::WHEEL_DELTA_CLAMP,
            wheel_batch_clamp: zoom::WHEEL_BATCH_CLAMP,
            wheel_base: zoom::WHEEL_BASE,
            wheel_sensitivity: zoom::WHEEL_SENSITIVITY,
            min_rectangle_size: drawing::MIN_RECTANGLE_SIZE,
            polygon_snap_distance: drawing::POLYGON_SNAP_DISTANCE,
            rubber_band_min_size: drawing::RUBBER_BAND_MIN_SIZE,
            click_drag_threshold: drawing::CLICK_DRAG_THRESHOLD,
            handle_hit_radius: drawing::HANDLE_HIT_RADIUS,
            outline_hit_tolerance: drawing::OUTLINE_HIT_TOLERANCE,
            point_hit_radius: drawing::POINT_HIT_RADIUS,
            cull_padding: render::CULL_PADDING,
            hover_disable_threshold: render::HOVER_DISABLE_THRESHOLD,
        }
    }
}

/// Debounce windows, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub viewport_commit_ms: u64,
    pub selection_commit_ms: u64,
    pub hover_show_ms: u64,
    pub hover_hide_ms: u64,
}

impl TimingConfig {
    pub fn viewport_commit(&self) -> Duration {
        Duration::from_millis(self.viewport_commit_ms)
    }

    pub fn selection_commit(&self) -> Duration {
        Duration::from_millis(self.selection_commit_ms)
    }

    pub fn hover_show(&self) -> Duration {
        Duration::from_millis(self.hover_show_ms)
    }

    pub fn hover_hide(&self) -> Duration {
        Duration::from_millis(self.hover_hide_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            viewport_commit_ms: timing::VIEWPORT_COMMIT_MS,
            selection_commit_ms: timing::SELECTION_COMMIT_MS,
            hover_show_ms: timing::HOVER_SHOW_MS,
            hover_hide_ms: timing::HOVER_HIDE_MS,
        }
    }
}

/// How annotation shapes are drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Appearance {
    /// Outline width in screen pixels
    pub stroke_width: f64,
    /// Outline width of selected shapes in screen pixels
    pub selected_stroke_width: f64,
    /// Fill alpha in `[0, 1]`
    pub fill_opacity: f64,
    /// Draw the label name next to each shape
    pub show_labels: bool,
    /// Draw the confidence of auto-generated shapes
    pub show_confidence: bool,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            stroke_width: 2.0,
            selected_stroke_width: 3.0,
            fill_opacity: 0.2,
            show_labels: true,
            show_confidence: false,
        }
    }
}

/// Behavior toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Behavior {
    /// Left-dragging empty canvas with the select tool pans instead of
    /// starting a rubber band.
    pub empty_drag_pans: bool,
    /// Clip created and edited geometry to the image bounds.
    pub clip_to_image: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            empty_drag_pans: false,
            clip_to_image: true,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            thresholds: Thresholds::default(),
            timing: TimingConfig::default(),
            appearance: Appearance::default(),
            behavior: Behavior::default(),
            key_bindings: KeyBindings::default(),
            log_level: LogLevel::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        if config.thresholds.min_zoom <= 0.0
            || config.thresholds.min_zoom > config.thresholds.max_zoom
        {
            return Err(ConfigError::Invalid(format!(
                "zoom range [{}, {}] is empty or non-positive",
                config.thresholds.min_zoom, config.thresholds.max_zoom
            )));
        }

        Ok(config)
    }

    /// Get the default filename for config export.
    pub fn default_filename() -> &'static str {
        "hvat-canvas.json"
    }

    /// Get the default config file path for auto-load/save.
    /// Returns None on WASM (no filesystem access).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("hvat").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("hvat")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from a file.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to the given path, creating parent directories.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// A value is out of its valid range
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
