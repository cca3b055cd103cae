//! CPU rasterization of styled text into per-frame pixel buffers.

use kurbo::{Affine, Point};

use crate::{
    color::{apply_opacity, mul_div255},
    core::{Canvas, Rgba8, RenderConfig},
    error::{KinetypeError, KinetypeResult},
    style::{FrameParams, GlyphParams},
    text::GlyphFont,
};

/// Horizontal margin the adaptive font fit keeps on each side.
const TEXT_MARGIN_PX: f32 = 10.0;

/// Owned straight-alpha RGBA8 raster for one frame.
///
/// A buffer lives for the duration of rendering one frame, then moves into
/// the encoder and is never mutated again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 bytes, `width * height * 4` long.
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            data: vec![0; canvas.pixel_count() * 4],
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    fn set_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data[i..i + 4].copy_from_slice(&px);
    }

    /// Source-over blend of `color` at effective alpha `a` onto an opaque
    /// destination pixel. Out-of-bounds coordinates are ignored.
    fn blend_pixel(&mut self, x: i64, y: i64, color: Rgba8, a: u8) {
        if a == 0 || x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let a16 = u16::from(a);
        let inv = 255 - a16;
        let blend = |src: u8, dst: u8| -> u8 {
            (mul_div255(u16::from(src), a16) + mul_div255(u16::from(dst), inv)).min(255) as u8
        };
        self.data[i] = blend(color.r, self.data[i]);
        self.data[i + 1] = blend(color.g, self.data[i + 1]);
        self.data[i + 2] = blend(color.b, self.data[i + 2]);
        self.data[i + 3] = 255;
    }
}

/// The narrow drawing capability set used while rasterizing a frame.
///
/// Style logic never sees this; it only produces [`GlyphParams`], and the
/// renderer drives the context.
pub struct DrawContext<'a> {
    buf: &'a mut PixelBuffer,
    font: &'a GlyphFont,
    font_px: f32,
    transform: Affine,
}

impl<'a> DrawContext<'a> {
    pub fn new(buf: &'a mut PixelBuffer, font: &'a GlyphFont, font_px: f32) -> Self {
        Self {
            buf,
            font,
            font_px,
            transform: Affine::IDENTITY,
        }
    }

    /// Fill the whole canvas with an opaque color, ignoring the transform.
    pub fn clear(&mut self, color: Rgba8) {
        self.fill_rect(
            0.0,
            0.0,
            f64::from(self.buf.width),
            f64::from(self.buf.height),
            color,
        );
    }

    /// Opaque axis-aligned rectangle fill in canvas space (not transformed).
    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgba8) {
        let x0 = x.max(0.0).floor() as u32;
        let y0 = y.max(0.0).floor() as u32;
        let x1 = ((x + w).ceil().max(0.0) as u32).min(self.buf.width);
        let y1 = ((y + h).ceil().max(0.0) as u32).min(self.buf.height);
        for py in y0..y1 {
            for px in x0..x1 {
                self.buf.set_pixel(px, py, [color.r, color.g, color.b, 255]);
            }
        }
    }

    /// Total advance width of `text` at the context's font size.
    pub fn measure_text(&self, text: &str) -> f64 {
        f64::from(self.font.measure(text, self.font_px))
    }

    /// Set the transform applied by subsequent [`fill_text`](Self::fill_text)
    /// calls.
    pub fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
    }

    /// Draw `text` with its pen starting at `x` on baseline `baseline_y`,
    /// blending each glyph's coverage at `opacity`.
    pub fn fill_text(&mut self, text: &str, x: f64, baseline_y: f64, color: Rgba8, opacity: f64) {
        let color = apply_opacity(color, opacity);
        if color.a == 0 {
            return;
        }
        let mut pen = x;
        for ch in text.chars() {
            let (metrics, coverage) = self.font.rasterize(ch, self.font_px);
            let left = pen + f64::from(metrics.xmin);
            let top = baseline_y - metrics.height as f64 - f64::from(metrics.ymin);
            self.blit_coverage(&coverage, metrics.width, metrics.height, left, top, color);
            pen += f64::from(metrics.advance_width);
        }
    }

    fn blit_coverage(
        &mut self,
        coverage: &[u8],
        gw: usize,
        gh: usize,
        left: f64,
        top: f64,
        color: Rgba8,
    ) {
        if gw == 0 || gh == 0 {
            return;
        }

        if self.transform == Affine::IDENTITY {
            let x0 = left.round() as i64;
            let y0 = top.round() as i64;
            for gy in 0..gh {
                for gx in 0..gw {
                    let cov = coverage[gy * gw + gx];
                    if cov == 0 {
                        continue;
                    }
                    let a = effective_alpha(cov, color.a);
                    self.buf.blend_pixel(x0 + gx as i64, y0 + gy as i64, color, a);
                }
            }
            return;
        }

        // Transformed path: inverse-map destination pixels back into glyph
        // space and nearest-sample the coverage bitmap, so rotation leaves
        // no forward-splatting holes.
        let inv = self.transform.inverse();
        let corners = [
            (left, top),
            (left + gw as f64, top),
            (left, top + gh as f64),
            (left + gw as f64, top + gh as f64),
        ];
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (cx, cy) in corners {
            let p = self.transform * Point::new(cx, cy);
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let x0 = (min_x.floor() as i64 - 1).max(0);
        let y0 = (min_y.floor() as i64 - 1).max(0);
        let x1 = (max_x.ceil() as i64 + 1).min(i64::from(self.buf.width) - 1);
        let y1 = (max_y.ceil() as i64 + 1).min(i64::from(self.buf.height) - 1);

        for py in y0..=y1 {
            for px in x0..=x1 {
                let src = inv * Point::new(px as f64 + 0.5, py as f64 + 0.5);
                let gx = (src.x - left).floor();
                let gy = (src.y - top).floor();
                if gx < 0.0 || gy < 0.0 || gx >= gw as f64 || gy >= gh as f64 {
                    continue;
                }
                let cov = coverage[gy as usize * gw + gx as usize];
                if cov == 0 {
                    continue;
                }
                let a = effective_alpha(cov, color.a);
                self.buf.blend_pixel(px, py, color, a);
            }
        }
    }
}

fn effective_alpha(coverage: u8, color_a: u8) -> u8 {
    mul_div255(u16::from(coverage), u16::from(color_a)) as u8
}

fn rotate_about(radians: f64, cx: f64, cy: f64) -> Affine {
    Affine::translate((cx, cy)) * Affine::rotate(radians) * Affine::translate((-cx, -cy))
}

/// Rasterize one frame of `text` under `params`.
///
/// The buffer is cleared to the configured background; per-glyph styles lay
/// characters out left-to-right from `center - total_width / 2`, so the
/// aggregate string stays centered while each character carries its own
/// parameters. The baseline is the ascent/descent-compensated canvas center
/// unless a style perturbs it through `dy`.
pub fn render_frame(
    text: &str,
    params: &FrameParams,
    cfg: &RenderConfig,
    font: &GlyphFont,
) -> KinetypeResult<PixelBuffer> {
    let mut buf = PixelBuffer::new(cfg.canvas);
    let max_width = cfg.canvas.width as f32 - 2.0 * TEXT_MARGIN_PX;
    let px = font.fit_px(text, cfg.font_px, max_width);
    let mut ctx = DrawContext::new(&mut buf, font, px);
    ctx.clear(cfg.background);

    let cx = cfg.canvas.center_x();
    let cy = cfg.canvas.center_y();
    let baseline = cy + f64::from(font.baseline_offset(px));

    match params {
        FrameParams::Whole(gp) => {
            apply_glyph_transform(&mut ctx, gp, cx, cy);
            let width = ctx.measure_text(text);
            ctx.fill_text(
                text,
                cx - width / 2.0 + gp.dx,
                baseline + gp.dy,
                gp.color,
                gp.opacity,
            );
        }
        FrameParams::PerGlyph(glyphs) => {
            let char_count = text.chars().count();
            if glyphs.len() != char_count {
                return Err(KinetypeError::render(format!(
                    "per-glyph params length {} does not match {} characters",
                    glyphs.len(),
                    char_count
                )));
            }
            let total = ctx.measure_text(text);
            let mut pen = cx - total / 2.0;
            let mut utf8 = [0u8; 4];
            for (ch, gp) in text.chars().zip(glyphs) {
                apply_glyph_transform(&mut ctx, gp, cx, cy);
                let s: &str = ch.encode_utf8(&mut utf8);
                ctx.fill_text(s, pen + gp.dx, baseline + gp.dy, gp.color, gp.opacity);
                pen += f64::from(font.char_advance(ch, px));
            }
        }
    }

    Ok(buf)
}

fn apply_glyph_transform(ctx: &mut DrawContext<'_>, gp: &GlyphParams, cx: f64, cy: f64) {
    if gp.rotation == 0.0 {
        ctx.set_transform(Affine::IDENTITY);
    } else {
        ctx.set_transform(rotate_about(gp.rotation, cx, cy));
    }
}
