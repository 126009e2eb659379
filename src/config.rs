use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Session settings, loaded from a JSON file at startup. Every field has a
/// default so a missing file or a partial file both work.
///
/// `crop_left`/`crop_right` are percentages of the scanline width;
/// `crop_top`/`crop_bottom` are scanline counts. The `*_min`/`*_max` knobs
/// are 0-100 percentages bounding the usable dynamic range fed into the
/// lookup tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Acquisition timebase index; see [`Settings::interval_ns`].
    pub timebase: u32,
    /// Horizontal display scale as a binary shift, 0 or negative (shrink).
    pub scale_x: i32,
    /// Vertical display scale as a binary shift, 0 or negative (shrink).
    pub scale_y: i32,
    pub crop_left: u32,
    pub crop_right: u32,
    pub crop_top: u32,
    pub crop_bottom: u32,
    pub y_min: u32,
    pub y_max: u32,
    pub i_min: u32,
    pub i_max: u32,
    pub q_min: u32,
    pub q_max: u32,
    /// Start in monochrome mode (luma only).
    pub monochrome: bool,
    /// Strength of the burst-amplitude luma compensation; 0 disables it.
    pub color_compensation: i32,
    /// Image fed to the synthetic signal source; built-in color bars if unset.
    pub source_image: Option<PathBuf>,
    /// Noise amplitude mixed into synthetic captures, as a fraction of the
    /// active video swing.
    pub noise: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // 64 ns gets about 1000 samples per scanline.
            timebase: 6,
            scale_x: 0,
            scale_y: 0,
            crop_left: 0,
            crop_right: 0,
            crop_top: 0,
            crop_bottom: 0,
            y_min: 0,
            y_max: 100,
            i_min: 0,
            i_max: 100,
            q_min: 0,
            q_max: 100,
            monochrome: false,
            color_compensation: 0,
            source_image: None,
            noise: 0.0,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, DecodeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DecodeError::Settings(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| DecodeError::Settings(format!("{}: {e}", path.display())))
    }

    /// Sampling interval in nanoseconds for the configured timebase. With
    /// timebase > 2, the interval is (timebase - 2) * 16 ns.
    pub fn interval_ns(&self) -> i64 {
        match self.timebase {
            0 => 2,
            1 => 4,
            2 => 8,
            t => 16 * (t as i64 - 2),
        }
    }
}
