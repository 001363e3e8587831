use std::path::Path;

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::animation::Interpolation;

/// Settings shared by the game record and cam importers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportOptions {
    pub fps: f64,
    pub global_scale: f32,
    /// Directory holding decompiled models in the game's folder layout.
    pub asset_path: String,
    pub interpolation: Interpolation,
    pub inter_key: bool,
    /// Reuse a skeleton already imported for the same model instead of importing it again.
    pub instancing: bool,
    pub render_width: f32,
    pub render_height: f32,
    /// Camera sensor width in millimetres, used to turn field of view into focal length.
    pub sensor_width: f32,
    /// Treat game record field of view as 4:3-authored and correct it to the render aspect.
    pub scale_agr_fov: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            fps: 30.0,
            global_scale: 0.01,
            asset_path: String::new(),
            interpolation: Interpolation::default(),
            inter_key: false,
            instancing: true,
            render_width: 1920.0,
            render_height: 1080.0,
            sensor_width: 36.0,
            scale_agr_fov: false,
        }
    }
}

impl ImportOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let options: Self = toml::from_str(&std::fs::read_to_string(path)?)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            bail!("fps must be positive, got {}", self.fps);
        }
        if !(self.global_scale.is_finite() && self.global_scale > 0.0) {
            bail!("global_scale must be positive, got {}", self.global_scale);
        }
        if self.sensor_width <= 0.0 {
            bail!("sensor_width must be positive, got {}", self.sensor_width);
        }

        Ok(())
    }
}
