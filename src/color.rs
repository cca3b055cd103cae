//! Color math shared by styles, rendering and encoding.
//!
//! Everything here is pure and operates in `[0,255]` integer channel space
//! with saturation at the boundaries.

use crate::core::Rgba8;
use crate::error::{KinetypeError, KinetypeResult};

/// Parse `#RGB` or `#RRGGBB` into an opaque color.
pub fn parse_hex(s: &str) -> KinetypeResult<Rgba8> {
    let digits = s
        .strip_prefix('#')
        .ok_or_else(|| KinetypeError::validation(format!("hex color '{s}' must start with '#'")))?;

    let nibble = |c: char| -> KinetypeResult<u8> {
        c.to_digit(16)
            .map(|d| d as u8)
            .ok_or_else(|| KinetypeError::validation(format!("hex color '{s}' has non-hex digit")))
    };

    let chars: Vec<char> = digits.chars().collect();
    match chars.as_slice() {
        [r, g, b] => {
            let (r, g, b) = (nibble(*r)?, nibble(*g)?, nibble(*b)?);
            Ok(Rgba8::opaque(r << 4 | r, g << 4 | g, b << 4 | b))
        }
        [r1, r0, g1, g0, b1, b0] => Ok(Rgba8::opaque(
            nibble(*r1)? << 4 | nibble(*r0)?,
            nibble(*g1)? << 4 | nibble(*g0)?,
            nibble(*b1)? << 4 | nibble(*b0)?,
        )),
        _ => Err(KinetypeError::validation(format!(
            "hex color '{s}' must have 3 or 6 digits"
        ))),
    }
}

/// Convert HSL (hue in degrees, saturation/lightness in `[0,1]`) to RGB.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgba8 {
    let h = h.rem_euclid(360.0);
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgba8::opaque(
        channel_from_f64((r + m) * 255.0),
        channel_from_f64((g + m) * 255.0),
        channel_from_f64((b + m) * 255.0),
    )
}

/// Linearly interpolate across `stops` at phase `t`, wrapping around so the
/// last stop blends back into the first. `t` outside `[0,1)` is wrapped.
pub fn lerp_stops(stops: &[Rgba8], t: f64) -> KinetypeResult<Rgba8> {
    if stops.is_empty() {
        return Err(KinetypeError::validation("gradient needs at least one stop"));
    }
    if stops.len() == 1 {
        return Ok(stops[0]);
    }

    let t = t.rem_euclid(1.0);
    let scaled = t * stops.len() as f64;
    let i = (scaled.floor() as usize).min(stops.len() - 1);
    let frac = scaled - i as f64;
    let a = stops[i];
    let b = stops[(i + 1) % stops.len()];

    Ok(Rgba8 {
        r: lerp_u8(a.r, b.r, frac),
        g: lerp_u8(a.g, b.g, frac),
        b: lerp_u8(a.b, b.b, frac),
        a: lerp_u8(a.a, b.a, frac),
    })
}

/// Scale a color's alpha by `opacity` in `[0,1]`.
pub fn apply_opacity(color: Rgba8, opacity: f64) -> Rgba8 {
    Rgba8 {
        a: channel_from_f64(f64::from(color.a) * opacity.clamp(0.0, 1.0)),
        ..color
    }
}

/// Round-and-clamp a floating channel value into `u8`.
pub fn channel_from_f64(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

pub(crate) fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    channel_from_f64(f64::from(a) + (f64::from(b) - f64::from(a)) * t)
}

pub(crate) fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}
