use crate::{
    core::Canvas,
    error::{DotcamError, DotcamResult},
};

/// Read-only stylization parameters, fixed for the process lifetime.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StyleConfig {
    /// Diameter of each rendered dot, in canvas pixels.
    pub pixel_size: u32,
    /// Blank spacing between adjacent dots, in canvas pixels.
    pub gap_size: u32,
    /// Multiplier applied to grayscale deviation from midpoint 128.
    pub contrast_factor: f32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            pixel_size: 3,
            gap_size: 3,
            contrast_factor: 1.0,
        }
    }
}

impl StyleConfig {
    pub fn validate(&self) -> DotcamResult<()> {
        if self.pixel_size == 0 {
            return Err(DotcamError::validation("style pixel_size must be >= 1"));
        }
        if !self.contrast_factor.is_finite() || self.contrast_factor < 0.0 {
            return Err(DotcamError::validation(
                "style contrast_factor must be finite and >= 0",
            ));
        }
        Ok(())
    }

    /// Grid pitch: one dot plus one gap.
    pub fn cell_size(&self) -> u32 {
        self.pixel_size + self.gap_size
    }

    /// Raster grid dimensions for a canvas: floor(dim / cell_size) per axis.
    pub fn grid_dims(&self, canvas: Canvas) -> (u32, u32) {
        let cell = self.cell_size();
        (canvas.width / cell, canvas.height / cell)
    }
}

/// Average-of-channels grayscale, exactly (r + g + b) / 3.
pub fn to_grayscale(r: u8, g: u8, b: u8) -> f32 {
    (u32::from(r) + u32::from(g) + u32::from(b)) as f32 / 3.0
}

/// Scale the deviation from midpoint 128 by `factor`, clamped to [0, 255].
///
/// 128 is a fixed point for every factor.
pub fn adjust_contrast(gray: f32, factor: f32) -> f32 {
    (128.0 + (gray - 128.0) * factor).clamp(0.0, 255.0)
}

/// The downsampled grid of RGBA8 samples computed from one frame.
///
/// Recomputed every frame; carries no identity or history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA8, row-major
}

impl RasterBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn sample(&self, x: u32, y: u32) -> DotcamResult<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return Err(DotcamError::validation(format!(
                "raster sample ({x},{y}) out of bounds {}x{}",
                self.width, self.height
            )));
        }
        let off = (y as usize * self.width as usize + x as usize) * 4;
        Ok([
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ])
    }
}
