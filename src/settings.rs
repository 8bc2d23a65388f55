//! Project-wide defaults that grip scripts may pull in when they start.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::smoothing::OneEuroParams;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not access settings file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file is not valid")]
    Parse(#[from] serde_json::Error),
}

/// Shoulder-mount behavior for two handed weapons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualStockSettings {
    /// Distance from the mount anchor at which the stock engages.
    pub snap_distance: f32,
    /// Band inside the snap distance over which the stock correction fades in.
    pub snap_lerp_threshold: f32,
    /// Offset from the anchor, in the anchor's yaw frame.
    pub snap_offset: Vector3<f32>,
    pub smooth_stock_hand: bool,
    /// 0 keeps the raw hand position, 1 uses the fully smoothed one.
    pub smoothing_value_for_stock: f32,
    pub stock_hand_smoothing: OneEuroParams,
}

impl Default for VirtualStockSettings {
    fn default() -> Self {
        Self {
            snap_distance: 35.0,
            snap_lerp_threshold: 20.0,
            snap_offset: Vector3::zeros(),
            smooth_stock_hand: false,
            smoothing_value_for_stock: 0.0,
            stock_hand_smoothing: OneEuroParams { min_cutoff: 5.0, cutoff_slope: 10.0, delta_cutoff: 20.0 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub virtual_stock: VirtualStockSettings,
    pub one_euro_min_cutoff: f32,
    pub one_euro_cutoff_slope: f32,
    pub one_euro_delta_cutoff: f32,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        let smoothing = OneEuroParams::default();
        Self {
            virtual_stock: VirtualStockSettings::default(),
            one_euro_min_cutoff: smoothing.min_cutoff,
            one_euro_cutoff_slope: smoothing.cutoff_slope,
            one_euro_delta_cutoff: smoothing.delta_cutoff,
        }
    }
}

impl GlobalSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io { path: path.to_owned(), source })?;
        let settings = serde_json::from_str(&raw)?;
        log::debug!("loaded global settings from {}", path.display());
        Ok(settings)
    }

    /// Like [`GlobalSettings::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(|source| SettingsError::Io { path: path.to_owned(), source })
    }

    /// Smoothing used on the secondary hand when a script asks for the global values.
    pub fn secondary_smoothing(&self) -> OneEuroParams {
        OneEuroParams {
            min_cutoff: self.one_euro_min_cutoff,
            cutoff_slope: self.one_euro_cutoff_slope,
            delta_cutoff: self.one_euro_delta_cutoff,
        }
    }
}
