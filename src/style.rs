//! Per-frame animation style evaluation.
//!
//! Every strategy is a pure function of `(style, text, frame, frame_count)`;
//! identical inputs always yield identical parameters, so frames may be
//! evaluated in any order, including in parallel.

use std::f64::consts::PI;

use crate::{
    color::{channel_from_f64, hsl_to_rgb},
    core::{FrameIndex, Rgba8},
    error::{KinetypeError, KinetypeResult},
};

/// Vertical sway of fire glyphs in pixels.
const FLAME_RISE_PX: f64 = 5.0;
/// Vertical amplitude of the wave style in pixels.
const WAVE_AMPLITUDE_PX: f64 = 10.0;
/// Peak height of the bounce arc in pixels.
pub const BOUNCE_AMPLITUDE_PX: f64 = 40.0;

/// Closed set of animation styles.
///
/// The five public wire ids are `fire`, `wave`, `fade`, `colorSpin` and
/// `bounce`. `Default` is the in-core fallback arm of dispatch and is not a
/// valid wire id; requests carrying an unknown id are rejected at parse time
/// rather than silently falling back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleId {
    Fire,
    Wave,
    Fade,
    ColorSpin,
    Bounce,
    Default,
}

impl StyleId {
    /// Style ids accepted from collaborators, in presentation order.
    pub const WIRE_IDS: [&'static str; 5] = ["fire", "wave", "fade", "colorSpin", "bounce"];

    pub fn parse(id: &str) -> KinetypeResult<Self> {
        match id {
            "fire" => Ok(Self::Fire),
            "wave" => Ok(Self::Wave),
            "fade" => Ok(Self::Fade),
            "colorSpin" => Ok(Self::ColorSpin),
            "bounce" => Ok(Self::Bounce),
            other => Err(KinetypeError::style(format!(
                "unknown animation style '{other}'"
            ))),
        }
    }

    pub fn wire_id(self) -> &'static str {
        match self {
            Self::Fire => "fire",
            Self::Wave => "wave",
            Self::Fade => "fade",
            Self::ColorSpin => "colorSpin",
            Self::Bounce => "bounce",
            Self::Default => "default",
        }
    }

    /// True for styles that emit one parameter set per character.
    pub fn is_per_glyph(self) -> bool {
        matches!(self, Self::Fire | Self::Wave)
    }
}

impl std::str::FromStr for StyleId {
    type Err = KinetypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for StyleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_id())
    }
}

/// Render parameters for one glyph (or one whole string).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphParams {
    pub color: Rgba8,
    /// Horizontal offset in pixels, applied after centering.
    pub dx: f64,
    /// Vertical offset in pixels, applied after baseline placement.
    pub dy: f64,
    /// Rotation in radians about canvas center.
    pub rotation: f64,
    /// Opacity multiplier in `[0,1]`.
    pub opacity: f64,
}

impl GlyphParams {
    fn solid(color: Rgba8) -> Self {
        Self {
            color,
            dx: 0.0,
            dy: 0.0,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

/// Parameters for one frame: either one entry per character or a single
/// entry covering the whole string.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameParams {
    PerGlyph(Vec<GlyphParams>),
    Whole(GlyphParams),
}

/// Evaluate the style strategy for one frame.
pub fn frame_params(style: StyleId, text: &str, frame: FrameIndex, frame_count: u64) -> FrameParams {
    match style {
        StyleId::Fire => FrameParams::PerGlyph(fire(text, frame)),
        StyleId::Wave => FrameParams::PerGlyph(wave(text, frame)),
        StyleId::Fade => FrameParams::Whole(fade(frame, frame_count)),
        StyleId::ColorSpin => FrameParams::Whole(color_spin(frame, frame_count)),
        StyleId::Bounce => FrameParams::Whole(bounce(frame, frame_count)),
        StyleId::Default => FrameParams::Whole(spin_fallback(frame, frame_count)),
    }
}

fn fire(text: &str, frame: FrameIndex) -> Vec<GlyphParams> {
    let f = frame.0 as f64;
    text.chars()
        .enumerate()
        .map(|(i, _)| {
            let ramp = (frame.0 + i as u64 * 5) % 256;
            let g = (255i64 - ramp as i64).max(0) as u8;
            let flicker = ((f + i as f64) * 0.2).sin() * 0.2 + 0.8;
            let dy = ((f + i as f64 * 10.0) * 0.1).sin() * FLAME_RISE_PX;
            GlyphParams {
                color: Rgba8::opaque(255, g, 0),
                dx: 0.0,
                dy,
                rotation: 0.0,
                opacity: flicker,
            }
        })
        .collect()
}

fn wave(text: &str, frame: FrameIndex) -> Vec<GlyphParams> {
    let f = frame.0 as f64;
    text.chars()
        .enumerate()
        .map(|(i, _)| {
            let i = i as f64;
            let g = channel_from_f64(120.0 + (f * 0.05 + i * 0.5).sin() * 40.0);
            let dy = (f * 0.1 + i * 0.5).sin() * WAVE_AMPLITUDE_PX;
            GlyphParams {
                color: Rgba8::opaque(0, g, 255),
                dx: 0.0,
                dy,
                rotation: 0.0,
                opacity: 1.0,
            }
        })
        .collect()
}

fn fade(frame: FrameIndex, frame_count: u64) -> GlyphParams {
    let cycle = (frame.0 % frame_count) as f64;
    let half = frame_count as f64 / 2.0;
    let opacity = if cycle < half {
        cycle / half
    } else {
        2.0 - cycle / half
    };
    GlyphParams {
        opacity,
        ..GlyphParams::solid(Rgba8::BLACK)
    }
}

fn color_spin(frame: FrameIndex, frame_count: u64) -> GlyphParams {
    let hue = (frame.0 as f64 * 360.0 / frame_count as f64).rem_euclid(360.0);
    GlyphParams::solid(hsl_to_rgb(hue, 1.0, 0.5))
}

fn bounce(frame: FrameIndex, frame_count: u64) -> GlyphParams {
    let t = (frame.0 % frame_count) as f64 / frame_count as f64;
    GlyphParams {
        dy: -BOUNCE_AMPLITUDE_PX * (PI * t).sin(),
        ..GlyphParams::solid(Rgba8::BLACK)
    }
}

fn spin_fallback(frame: FrameIndex, frame_count: u64) -> GlyphParams {
    GlyphParams {
        rotation: frame.0 as f64 * 2.0 * PI / frame_count as f64,
        ..GlyphParams::solid(Rgba8::BLACK)
    }
}
