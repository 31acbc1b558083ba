//! Minimap configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default document-to-canvas scale factor.
pub const DEFAULT_SCALE: f64 = 0.08;

/// Default logical canvas width in pixels.
pub const DEFAULT_WIDTH: f64 = 180.0;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables for the minimap pipeline and its scheduler.
///
/// The same `scale` is handed to every consumer of a render pass, so base
/// content, highlights and the viewport indicator always line up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimapConfig {
    /// Document-space to canvas-space ratio.
    pub scale: f64,
    /// Logical canvas width in pixels.
    pub width: f64,
    /// Window height kept free for panel chrome; caps the canvas height.
    pub reserved_chrome: f64,
    /// Minimum on-canvas height of the viewport indicator.
    pub min_viewport_height: f64,
    /// Maximum synthetic text lines painted per element.
    pub max_text_lines: usize,
    /// Seed for the synthetic text line widths.
    pub text_seed: u32,
    /// Periodic full render interval.
    pub periodic_interval_ms: u64,
    /// Quiet period after structural mutations.
    pub structural_debounce_ms: u64,
    /// Quiet period after highlight mutations.
    pub highlight_debounce_ms: u64,
    /// Minimum spacing between viewport updates while scrolling.
    pub scroll_throttle_ms: u64,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            width: DEFAULT_WIDTH,
            reserved_chrome: 100.0,
            min_viewport_height: 8.0,
            max_text_lines: 10,
            text_seed: 0x5eed_1234,
            periodic_interval_ms: 2000,
            structural_debounce_ms: 200,
            highlight_debounce_ms: 100,
            scroll_throttle_ms: 16,
        }
    }
}

impl MinimapConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ConfigError::Invalid {
                field: "scale",
                reason: format!("must be a positive number, got {}", self.scale),
            });
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(ConfigError::Invalid {
                field: "width",
                reason: format!("must be a positive number, got {}", self.width),
            });
        }
        let sizes = [
            ("reserved_chrome", self.reserved_chrome),
            ("min_viewport_height", self.min_viewport_height),
        ];
        for (field, value) in sizes {
            if !(value >= 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a non-negative number, got {}", value),
                });
            }
        }
        let intervals = [
            ("periodic_interval_ms", self.periodic_interval_ms),
            ("structural_debounce_ms", self.structural_debounce_ms),
            ("highlight_debounce_ms", self.highlight_debounce_ms),
            ("scroll_throttle_ms", self.scroll_throttle_ms),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be at least 1 ms".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_millis(self.periodic_interval_ms)
    }

    pub fn structural_debounce(&self) -> Duration {
        Duration::from_millis(self.structural_debounce_ms)
    }

    pub fn highlight_debounce(&self) -> Duration {
        Duration::from_millis(self.highlight_debounce_ms)
    }

    pub fn scroll_throttle(&self) -> Duration {
        Duration::from_millis(self.scroll_throttle_ms)
    }
}
