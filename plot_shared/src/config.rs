//! Configuration system.
//!
//! Loads view configuration from JSON strings/files. Every field has a
//! default, so `{}` is a valid configuration.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{color::Rgba, element::DEFAULT_NEAR_CLIP, scene::DEFAULT_GRID_DIVS};

/// Root configuration for a plot view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Output surface size in pixels.
    pub width: u32,
    pub height: u32,
    pub fov_degrees: f64,
    /// Camera-space depth below which geometry is clipped.
    pub near_clip: f64,
    /// Fraction of velocity kept per `decay_interval_ms`.
    pub decay: f64,
    pub decay_interval_ms: u64,
    /// Animation tick.
    pub tick_ms: u64,
    /// Velocities below this count as settled.
    pub epsilon: f64,
    pub motion: MotionSpeeds,
    pub grid_divs: usize,
    /// `[r, g, b, a]`.
    pub background: [u8; 4],
    pub fog: FogConfig,
    /// Where the binary writes rendered frames.
    pub output: String,
}

/// Navigation speeds. Key speeds are per second; drag sensitivities are per
/// pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSpeeds {
    pub forward: f64,
    pub pan: f64,
    /// Radians per second.
    pub rotate: f64,
    pub pivot: f64,
    pub bank: f64,
    pub drag_pan: f64,
    pub drag_rotate: f64,
    pub drag_forward: f64,
    pub wheel_forward: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub enabled: bool,
    pub start: f64,
    pub end: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fov_degrees: 45.0,
            near_clip: DEFAULT_NEAR_CLIP,
            decay: 0.2,
            decay_interval_ms: 100,
            tick_ms: 50,
            epsilon: 1e-4,
            motion: MotionSpeeds::default(),
            grid_divs: DEFAULT_GRID_DIVS,
            background: [255, 255, 255, 255],
            fog: FogConfig::default(),
            output: default_output(),
        }
    }
}

impl Default for MotionSpeeds {
    fn default() -> Self {
        Self {
            forward: 4.0,
            pan: 2.0,
            rotate: 1.0,
            pivot: 1.5,
            bank: 1.0,
            drag_pan: 0.01,
            drag_rotate: 0.005,
            drag_forward: 0.02,
            wheel_forward: 0.5,
        }
    }
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: 5.0,
            end: 20.0,
        }
    }
}

fn default_output() -> String {
    "plot.svg".to_string()
}

impl ViewConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn background_color(&self) -> Rgba {
        let [r, g, b, a] = self.background;
        Rgba::new(r, g, b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let cfg = ViewConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, ViewConfig::default());
        assert_eq!(cfg.near_clip, 0.01);
        assert_eq!(cfg.tick_ms, 50);
    }

    #[test]
    fn partial_override() {
        let cfg =
            ViewConfig::from_json_str(r#"{"width": 320, "motion": {"pan": 9.0}, "fog": {"enabled": true}}"#)
                .unwrap();
        assert_eq!(cfg.width, 320);
        assert_eq!(cfg.height, 600);
        assert_eq!(cfg.motion.pan, 9.0);
        assert_eq!(cfg.motion.forward, 4.0);
        assert!(cfg.fog.enabled);
        assert_eq!(cfg.fog.end, 20.0);
    }
}
