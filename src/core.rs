use crate::error::{KinetypeError, KinetypeResult};

/// 0-based index into an animation's frame timeline.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Output raster dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> KinetypeResult<Self> {
        if width == 0 || height == 0 {
            return Err(KinetypeError::validation("canvas width/height must be non-zero"));
        }
        Ok(Self { width, height })
    }

    pub fn center_x(self) -> f64 {
        f64::from(self.width) / 2.0
    }

    pub fn center_y(self) -> f64 {
        f64::from(self.height) / 2.0
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Straight (non-premultiplied) RGBA8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const WHITE: Self = Self::opaque(255, 255, 255);
    pub const BLACK: Self = Self::opaque(0, 0, 0);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Fixed generation constants for one animation.
///
/// These are crate-level configuration, not request parameters: every frame
/// of an animation shares the same canvas, frame count and delay.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderConfig {
    /// Output canvas in pixels.
    pub canvas: Canvas,
    /// Total frames per animation loop.
    pub frame_count: u64,
    /// Per-frame delay in milliseconds (constant across frames).
    pub delay_ms: u32,
    /// Base font size in pixels; shrunk proportionally when the text would
    /// overflow the canvas.
    pub font_px: f32,
    /// Background color every frame is cleared to.
    pub background: Rgba8,
    /// Evaluate frames on a rayon worker pool instead of sequentially.
    pub parallel: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 400,
                height: 200,
            },
            frame_count: 60,
            delay_ms: 50,
            font_px: 48.0,
            background: Rgba8::WHITE,
            parallel: false,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> KinetypeResult<()> {
        Canvas::new(self.canvas.width, self.canvas.height)?;
        if self.frame_count < 2 {
            return Err(KinetypeError::validation(
                "frame_count must be at least 2 (styles animate over a full cycle)",
            ));
        }
        if self.delay_ms < 10 {
            // GIF timing has centisecond resolution.
            return Err(KinetypeError::validation("delay_ms must be at least 10"));
        }
        if !self.font_px.is_finite() || self.font_px <= 0.0 {
            return Err(KinetypeError::validation("font_px must be finite and > 0"));
        }
        Ok(())
    }

    /// Per-frame delay in GIF centisecond units, never zero.
    pub fn delay_cs(&self) -> u16 {
        (self.delay_ms / 10).max(1).min(u32::from(u16::MAX)) as u16
    }
}
