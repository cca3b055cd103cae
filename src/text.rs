//! Glyph metrics and coverage rasterization.
//!
//! Centering math depends on the same font/size configuration that produces
//! the final pixels, so everything metric-related funnels through
//! [`GlyphFont`].

use std::sync::OnceLock;

use fontdue::{Font, FontSettings, Metrics};

use crate::error::{KinetypeError, KinetypeResult};

static BUILTIN_FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
static BUILTIN: OnceLock<GlyphFont> = OnceLock::new();

/// Smallest size the adaptive fit will shrink to.
const MIN_FONT_PX: f32 = 8.0;

/// A parsed typeface plus the metric queries the renderer needs.
pub struct GlyphFont {
    font: Font,
}

impl GlyphFont {
    pub fn from_bytes(bytes: &[u8]) -> KinetypeResult<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| KinetypeError::render(format!("failed to parse font: {e}")))?;
        Ok(Self { font })
    }

    /// The embedded default typeface (DejaVu Sans).
    pub fn builtin() -> &'static GlyphFont {
        BUILTIN.get_or_init(|| {
            Self::from_bytes(BUILTIN_FONT_BYTES).expect("embedded DejaVu Sans must be valid")
        })
    }

    /// Horizontal advance of one character at `px`.
    pub fn char_advance(&self, c: char, px: f32) -> f32 {
        self.font.metrics(c, px).advance_width
    }

    /// Total advance width of `text` at `px`.
    pub fn measure(&self, text: &str, px: f32) -> f32 {
        text.chars().map(|c| self.char_advance(c, px)).sum()
    }

    /// Distance from the visual center of a line to its baseline at `px`.
    ///
    /// Adding this to a y-coordinate turns "center of canvas" into the
    /// baseline that vertically centers the ascent/descent box there.
    pub fn baseline_offset(&self, px: f32) -> f32 {
        match self.font.horizontal_line_metrics(px) {
            // `descent` is negative; the box spans [baseline - ascent,
            // baseline - descent] so its center sits (ascent+descent)/2
            // above the baseline.
            Some(m) => (m.ascent + m.descent) / 2.0,
            None => px * 0.35,
        }
    }

    /// Rasterize one character's coverage bitmap at `px`.
    pub fn rasterize(&self, c: char, px: f32) -> (Metrics, Vec<u8>) {
        self.font.rasterize(c, px)
    }

    /// Shrink `base_px` proportionally until `text` fits `max_width`.
    ///
    /// Returns `base_px` unchanged when the text already fits, so short
    /// strings render at the configured size.
    pub fn fit_px(&self, text: &str, base_px: f32, max_width: f32) -> f32 {
        let width = self.measure(text, base_px);
        if width <= max_width || width <= 0.0 {
            return base_px;
        }
        (base_px * max_width / width).max(MIN_FONT_PX)
    }
}

impl std::fmt::Debug for GlyphFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphFont").finish_non_exhaustive()
    }
}
