//! GIF89a encoding: global palette, LZW-compressed image blocks, timing and
//! loop metadata.
//!
//! The encoder is deliberately self-contained: the palette is a function of
//! the full frame set, compression is the GIF flavor of LZW (variable code
//! width 3..=12 bits, clear/EOI codes, dictionary reset at 4096 entries,
//! 255-byte data sub-blocks), and the document layout follows the GIF89a
//! block grammar with a NETSCAPE2.0 infinite-loop application extension.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use crate::{
    core::{Canvas, Rgba8, RenderConfig},
    error::{KinetypeError, KinetypeResult},
    render::PixelBuffer,
};

/// Hard GIF limit on global color table entries.
pub const MAX_PALETTE_COLORS: usize = 256;

/// NeuQuant sample factor used when the exact color union overflows the
/// palette (1 = slowest/best, 30 = fastest).
const NEUQUANT_SAMPLE_FAC: i32 = 10;

const EXTENSION_INTRODUCER: u8 = 0x21;
const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
const APPLICATION_LABEL: u8 = 0xFF;
const IMAGE_SEPARATOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;
/// Disposal method 2 ("restore to background") in the GCE packed field, so
/// frames never smear into each other.
const GCE_PACKED_RESTORE_BG: u8 = 0b0000_1000;

const MAX_CODE_SIZE: u8 = 12;
const MAX_DICT_CODES: u16 = 1 << MAX_CODE_SIZE;

/// Ordered global color table shared by every frame of one animation.
///
/// Built once before any frame is encoded and immutable afterwards. The
/// background color is always entry 0 (also the logical screen background
/// index).
pub struct Palette {
    colors: Vec<[u8; 3]>,
    lookup: HashMap<[u8; 3], u8>,
}

impl Palette {
    /// Build the palette from the union of colors across all frames.
    ///
    /// Colors are kept in first-seen scan order. When the union exceeds 256
    /// entries the set is reduced with NeuQuant and every source color maps
    /// to its nearest palette entry (smallest squared RGB distance, ties to
    /// the lowest index).
    pub fn build(frames: &[PixelBuffer], background: Rgba8) -> KinetypeResult<Self> {
        let bg = background.rgb();
        let mut uniques: Vec<[u8; 3]> = vec![bg];
        let mut seen: HashSet<[u8; 3]> = HashSet::from([bg]);
        for frame in frames {
            for px in frame.data.chunks_exact(4) {
                let rgb = [px[0], px[1], px[2]];
                if seen.insert(rgb) {
                    uniques.push(rgb);
                }
            }
        }

        let (colors, lookup) = if uniques.len() <= MAX_PALETTE_COLORS {
            let lookup = uniques
                .iter()
                .enumerate()
                .map(|(i, &c)| (c, i as u8))
                .collect();
            (uniques, lookup)
        } else {
            Self::quantize(frames, bg, &uniques)
        };

        if colors.is_empty() || colors.len() > MAX_PALETTE_COLORS {
            return Err(KinetypeError::encode(format!(
                "palette holds {} colors after quantization (limit {MAX_PALETTE_COLORS})",
                colors.len()
            )));
        }

        Ok(Self { colors, lookup })
    }

    fn quantize(
        frames: &[PixelBuffer],
        bg: [u8; 3],
        uniques: &[[u8; 3]],
    ) -> (Vec<[u8; 3]>, HashMap<[u8; 3], u8>) {
        let samples: Vec<u8> = frames
            .iter()
            .flat_map(|f| f.data.iter().copied())
            .collect();
        let nq = color_quant::NeuQuant::new(NEUQUANT_SAMPLE_FAC, MAX_PALETTE_COLORS, &samples);

        let mut colors = vec![bg];
        let mut have: HashSet<[u8; 3]> = HashSet::from([bg]);
        for c in nq.color_map_rgb().chunks_exact(3) {
            let rgb = [c[0], c[1], c[2]];
            if colors.len() < MAX_PALETTE_COLORS && have.insert(rgb) {
                colors.push(rgb);
            }
        }

        let lookup = uniques
            .iter()
            .map(|&u| (u, nearest(&colors, u)))
            .collect();
        (colors, lookup)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        self.colors.as_slice()
    }

    /// Palette index of the background color.
    pub fn background_index(&self) -> u8 {
        0
    }

    /// Initial LZW code size for this palette (GIF mandates at least 2).
    pub fn min_code_size(&self) -> u8 {
        let mut bits = 2u8;
        while (1usize << bits) < self.colors.len() {
            bits += 1;
        }
        bits
    }

    /// The 3-bit "size of global color table" field: entries = 2^(n+1).
    fn gct_size_bits(&self) -> u8 {
        let mut bits = 1u8;
        while (1usize << (bits + 1)) < self.colors.len() {
            bits += 1;
        }
        bits
    }

    /// Map one frame's pixels to palette indices.
    pub fn index_frame(&self, frame: &PixelBuffer) -> KinetypeResult<Vec<u8>> {
        let mut out = Vec::with_capacity(frame.data.len() / 4);
        for px in frame.data.chunks_exact(4) {
            let rgb = [px[0], px[1], px[2]];
            let idx = self.lookup.get(&rgb).copied().ok_or_else(|| {
                KinetypeError::encode(format!(
                    "color {rgb:?} missing from palette lookup (internal error)"
                ))
            })?;
            out.push(idx);
        }
        Ok(out)
    }
}

fn nearest(colors: &[[u8; 3]], rgb: [u8; 3]) -> u8 {
    let mut best = 0usize;
    let mut best_d = u32::MAX;
    for (i, c) in colors.iter().enumerate() {
        let d = dist2(*c, rgb);
        // Strict `<` keeps the lowest index on distance ties.
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best as u8
}

fn dist2(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = i32::from(a[0]) - i32::from(b[0]);
    let dg = i32::from(a[1]) - i32::from(b[1]);
    let db = i32::from(a[2]) - i32::from(b[2]);
    (dr * dr + dg * dg + db * db) as u32
}

/// Streaming GIF89a writer over any byte sink.
///
/// `new` emits everything up to and including the loop extension,
/// `write_frame` appends one image block per call in timeline order, and
/// `finish` seals the document with the trailer. Any sink failure aborts the
/// document; no partial output is valid.
pub struct GifEncoder<W: Write> {
    w: W,
    canvas: Canvas,
    delay_cs: u16,
    palette: Palette,
    frames_written: u64,
}

impl<W: Write> std::fmt::Debug for GifEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GifEncoder")
            .field("canvas", &self.canvas)
            .field("delay_cs", &self.delay_cs)
            .field("frames_written", &self.frames_written)
            .finish_non_exhaustive()
    }
}

impl<W: Write> GifEncoder<W> {
    pub fn new(w: W, cfg: &RenderConfig, palette: Palette) -> KinetypeResult<Self> {
        cfg.validate()?;
        if palette.is_empty() || palette.len() > MAX_PALETTE_COLORS {
            return Err(KinetypeError::encode(format!(
                "global palette must hold 1..={MAX_PALETTE_COLORS} colors, got {}",
                palette.len()
            )));
        }

        if cfg.canvas.width > u32::from(u16::MAX) || cfg.canvas.height > u32::from(u16::MAX) {
            return Err(KinetypeError::validation(
                "GIF canvas dimensions must fit in 16 bits",
            ));
        }

        let mut enc = Self {
            w,
            canvas: cfg.canvas,
            delay_cs: cfg.delay_cs(),
            palette,
            frames_written: 0,
        };
        enc.write_header()?;
        enc.write_screen_descriptor()?;
        enc.write_global_color_table()?;
        enc.write_loop_extension()?;
        Ok(enc)
    }

    /// Append one frame. Frames must arrive in frame-index order and match
    /// the configured canvas.
    pub fn write_frame(&mut self, frame: &PixelBuffer) -> KinetypeResult<()> {
        if frame.width != self.canvas.width || frame.height != self.canvas.height {
            return Err(KinetypeError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.canvas.width, self.canvas.height
            )));
        }

        let indices = self.palette.index_frame(frame)?;
        self.write_graphic_control()?;
        self.write_image_descriptor()?;

        let min_code_size = self.palette.min_code_size();
        let compressed = lzw_compress(&indices, min_code_size);
        self.put(&[min_code_size])?;
        for chunk in compressed.chunks(255) {
            self.put(&[chunk.len() as u8])?;
            self.put(chunk)?;
        }
        self.put(&[0x00])?;

        self.frames_written += 1;
        Ok(())
    }

    /// Seal the document and return the sink.
    pub fn finish(mut self) -> KinetypeResult<W> {
        self.put(&[TRAILER])?;
        Ok(self.w)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn write_header(&mut self) -> KinetypeResult<()> {
        self.put(b"GIF89a")
    }

    fn write_screen_descriptor(&mut self) -> KinetypeResult<()> {
        let w = (self.canvas.width as u16).to_le_bytes();
        let h = (self.canvas.height as u16).to_le_bytes();
        // Global color table present, full color resolution, unsorted.
        let packed = 0xF0 | self.palette.gct_size_bits();
        self.put(&[w[0], w[1], h[0], h[1], packed, self.palette.background_index(), 0])
    }

    fn write_global_color_table(&mut self) -> KinetypeResult<()> {
        let entries = 1usize << (self.palette.gct_size_bits() + 1);
        for i in 0..entries {
            let rgb = self.palette.colors().get(i).copied().unwrap_or([0, 0, 0]);
            self.put(&rgb)?;
        }
        Ok(())
    }

    fn write_loop_extension(&mut self) -> KinetypeResult<()> {
        // NETSCAPE2.0 application extension, repeat count 0 = loop forever.
        self.put(&[EXTENSION_INTRODUCER, APPLICATION_LABEL, 0x0B])?;
        self.put(b"NETSCAPE2.0")?;
        self.put(&[0x03, 0x01, 0x00, 0x00, 0x00])
    }

    fn write_graphic_control(&mut self) -> KinetypeResult<()> {
        let delay = self.delay_cs.to_le_bytes();
        self.put(&[
            EXTENSION_INTRODUCER,
            GRAPHIC_CONTROL_LABEL,
            0x04,
            GCE_PACKED_RESTORE_BG,
            delay[0],
            delay[1],
            0x00, // no transparent index
            0x00,
        ])
    }

    fn write_image_descriptor(&mut self) -> KinetypeResult<()> {
        let w = (self.canvas.width as u16).to_le_bytes();
        let h = (self.canvas.height as u16).to_le_bytes();
        // Full-canvas frame at (0,0), no local color table, not interlaced.
        self.put(&[IMAGE_SEPARATOR, 0, 0, 0, 0, w[0], w[1], h[0], h[1], 0x00])
    }

    fn put(&mut self, bytes: &[u8]) -> KinetypeResult<()> {
        self.w
            .write_all(bytes)
            .map_err(|e| KinetypeError::encode(format!("failed to write GIF bytes: {e}")))
    }
}

/// Encode an ordered frame sequence into a complete GIF89a byte stream.
///
/// The palette is built from all frames before any frame is encoded, and the
/// loop extension always signals infinite repeat.
pub fn encode_animation(frames: &[PixelBuffer], cfg: &RenderConfig) -> KinetypeResult<Vec<u8>> {
    if frames.is_empty() {
        return Err(KinetypeError::validation(
            "animation must contain at least one frame",
        ));
    }

    let palette = Palette::build(frames, cfg.background)?;
    tracing::debug!(colors = palette.len(), frames = frames.len(), "global palette built");

    let capacity = frames.len() * frames[0].data.len() / 8;
    let mut enc = GifEncoder::new(Vec::with_capacity(capacity), cfg, palette)?;
    for frame in frames {
        enc.write_frame(frame)?;
    }
    enc.finish()
}

/// GIF-flavored LZW over palette indices.
///
/// Classic compress-derived encoder: code width starts at
/// `min_code_size + 1`, grows after the emitted-code count catches up with
/// the width, and the dictionary resets through a clear code once 4096
/// entries exist. Bits pack LSB-first.
fn lzw_compress(indices: &[u8], min_code_size: u8) -> Vec<u8> {
    let mut enc = LzwEncoder::new(min_code_size);

    enc.write_code(enc.clear_code());
    let mut iter = indices.iter().copied();
    let Some(first) = iter.next() else {
        enc.write_code(enc.eoi_code());
        return enc.finish();
    };

    let mut cur = u16::from(first);
    for k in iter {
        if let Some(&code) = enc.table.get(&(cur, k)) {
            cur = code;
            continue;
        }
        enc.write_code(cur);
        if enc.next_code < MAX_DICT_CODES {
            enc.table.insert((cur, k), enc.next_code);
            enc.next_code += 1;
        } else {
            enc.write_code(enc.clear_code());
            enc.reset_table();
        }
        cur = u16::from(k);
    }

    enc.write_code(cur);
    enc.write_code(enc.eoi_code());
    enc.finish()
}

struct LzwEncoder {
    min_code_size: u8,
    code_size: u8,
    next_code: u16,
    table: HashMap<(u16, u8), u16>,
    bit_buf: u32,
    bit_len: u8,
    bytes: Vec<u8>,
}

impl LzwEncoder {
    fn new(min_code_size: u8) -> Self {
        let mut enc = Self {
            min_code_size,
            code_size: 0,
            next_code: 0,
            table: HashMap::new(),
            bit_buf: 0,
            bit_len: 0,
            bytes: Vec::new(),
        };
        enc.reset_table();
        enc
    }

    fn clear_code(&self) -> u16 {
        1 << self.min_code_size
    }

    fn eoi_code(&self) -> u16 {
        self.clear_code() + 1
    }

    fn max_code(&self) -> u16 {
        (1 << self.code_size) - 1
    }

    fn reset_table(&mut self) {
        self.table.clear();
        self.next_code = self.eoi_code() + 1;
        self.code_size = self.min_code_size + 1;
    }

    fn write_code(&mut self, code: u16) {
        self.bit_buf |= u32::from(code) << self.bit_len;
        self.bit_len += self.code_size;
        while self.bit_len >= 8 {
            self.bytes.push((self.bit_buf & 0xFF) as u8);
            self.bit_buf >>= 8;
            self.bit_len -= 8;
        }
        if self.next_code > self.max_code() && self.code_size < MAX_CODE_SIZE {
            self.code_size += 1;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bit_len > 0 {
            self.bytes.push((self.bit_buf & 0xFF) as u8);
        }
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference LZW decoder used only to verify the encoder.
    fn lzw_decode(data: &[u8], min_code_size: u8) -> Vec<u8> {
        let clear = 1u16 << min_code_size;
        let eoi = clear + 1;
        let base_len = usize::from(clear) + 2;
        let mut width = min_code_size + 1;
        let mut table: Vec<Vec<u8>> = (0..clear).map(|i| vec![i as u8]).collect();
        table.push(Vec::new()); // clear
        table.push(Vec::new()); // eoi
        let mut out = Vec::new();
        let mut prev: Option<Vec<u8>> = None;
        let mut bit_pos = 0usize;

        let read_code = |bit_pos: &mut usize, width: u8| -> Option<u16> {
            if *bit_pos + usize::from(width) > data.len() * 8 {
                return None;
            }
            let mut code = 0u16;
            for i in 0..width {
                let bit = (data[*bit_pos / 8] >> (*bit_pos % 8)) & 1;
                code |= u16::from(bit) << i;
                *bit_pos += 1;
            }
            Some(code)
        };

        loop {
            let Some(code) = read_code(&mut bit_pos, width) else {
                panic!("ran out of bits before EOI");
            };
            if code == clear {
                table.truncate(base_len);
                width = min_code_size + 1;
                prev = None;
                continue;
            }
            if code == eoi {
                break;
            }
            let entry: Vec<u8> = if usize::from(code) < table.len() {
                table[usize::from(code)].clone()
            } else {
                let p = prev.as_ref().expect("code beyond table with no prefix");
                assert_eq!(usize::from(code), table.len(), "code skips table");
                let mut e = p.clone();
                e.push(p[0]);
                e
            };
            out.extend_from_slice(&entry);
            if let Some(p) = prev.take() {
                if table.len() < usize::from(MAX_DICT_CODES) {
                    let mut ne = p;
                    ne.push(entry[0]);
                    table.push(ne);
                }
            }
            if table.len() == (1usize << width) && width < MAX_CODE_SIZE {
                width += 1;
            }
            prev = Some(entry);
        }
        out
    }

    fn buffer_from_rgb(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let [r, g, b] = f(x, y);
                data.extend_from_slice(&[r, g, b, 255]);
            }
        }
        PixelBuffer {
            width,
            height,
            data,
        }
    }

    fn small_cfg(width: u32, height: u32) -> RenderConfig {
        RenderConfig {
            canvas: Canvas { width, height },
            ..RenderConfig::default()
        }
    }

    #[test]
    fn lzw_round_trips_simple_runs() {
        for min in [2u8, 4, 8] {
            let indices: Vec<u8> = (0..1000u32).map(|i| (i % (1 << min)) as u8).collect();
            let compressed = lzw_compress(&indices, min);
            assert_eq!(lzw_decode(&compressed, min), indices);
        }
    }

    #[test]
    fn lzw_round_trips_constant_input() {
        let indices = vec![0u8; 5000];
        let compressed = lzw_compress(&indices, 2);
        assert!(compressed.len() < indices.len() / 4);
        assert_eq!(lzw_decode(&compressed, 2), indices);
    }

    #[test]
    fn lzw_round_trips_noise_through_dictionary_resets() {
        // Enough random symbols to overflow the 4096-entry dictionary and
        // force at least one mid-stream clear.
        let mut rng = fastrand::Rng::with_seed(0x5EED);
        let indices: Vec<u8> = (0..100_000).map(|_| rng.u8(..)).collect();
        let compressed = lzw_compress(&indices, 8);
        assert_eq!(lzw_decode(&compressed, 8), indices);
    }

    #[test]
    fn lzw_handles_empty_and_single_symbol_inputs() {
        assert_eq!(lzw_decode(&lzw_compress(&[], 2), 2), Vec::<u8>::new());
        assert_eq!(lzw_decode(&lzw_compress(&[3], 2), 2), vec![3]);
    }

    #[test]
    fn palette_keeps_first_seen_order_with_background_first() {
        let frame = buffer_from_rgb(4, 1, |x, _| match x {
            0 => [9, 9, 9],
            1 => [255, 255, 255],
            _ => [1, 2, 3],
        });
        let palette = Palette::build(std::slice::from_ref(&frame), Rgba8::WHITE).unwrap();
        assert_eq!(palette.colors(), &[[255, 255, 255], [9, 9, 9], [1, 2, 3]]);
        assert_eq!(palette.background_index(), 0);
        assert_eq!(palette.min_code_size(), 2);
        assert_eq!(palette.index_frame(&frame).unwrap(), vec![1, 0, 2, 2]);
    }

    #[test]
    fn palette_quantizes_when_unions_overflow() {
        // 24*24 distinct colors = 576 uniques, well past the 256 limit.
        let frame = buffer_from_rgb(24, 24, |x, y| {
            [(x * 10) as u8, (y * 10) as u8, (x + y) as u8]
        });
        let palette = Palette::build(std::slice::from_ref(&frame), Rgba8::WHITE).unwrap();
        assert!(palette.len() <= MAX_PALETTE_COLORS);
        assert_eq!(palette.colors()[0], [255, 255, 255]);

        let indices = palette.index_frame(&frame).unwrap();
        assert_eq!(indices.len(), 24 * 24);
        assert!(indices.iter().all(|&i| usize::from(i) < palette.len()));

        // Quantization is deterministic.
        let again = Palette::build(std::slice::from_ref(&frame), Rgba8::WHITE).unwrap();
        assert_eq!(palette.colors(), again.colors());
        assert_eq!(again.index_frame(&frame).unwrap(), indices);
    }

    #[test]
    fn nearest_breaks_ties_toward_the_lowest_index() {
        let colors = [[0, 0, 0], [10, 0, 0], [0, 0, 10]];
        // [5,0,5] is squared-distance 50 from all three entries; index 0 wins.
        assert_eq!(nearest(&colors, [5, 0, 5]), 0);
        assert_eq!(nearest(&colors, [9, 0, 0]), 1);
    }

    #[test]
    fn encoded_document_is_framed_as_gif89a() {
        let cfg = small_cfg(8, 4);
        let frames = vec![
            buffer_from_rgb(8, 4, |_, _| [255, 255, 255]),
            buffer_from_rgb(8, 4, |x, _| if x < 4 { [0, 0, 0] } else { [255, 255, 255] }),
        ];
        let bytes = encode_animation(&frames, &cfg).unwrap();
        assert_eq!(&bytes[..6], b"GIF89a");
        assert_eq!(*bytes.last().unwrap(), TRAILER);
        // Canvas dims in the logical screen descriptor.
        assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), 8);
        assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), 4);
        // The NETSCAPE2.0 marker appears exactly once.
        let needle = b"NETSCAPE2.0";
        let hits = bytes.windows(needle.len()).filter(|w| w == needle).count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn first_frame_pixels_survive_a_decode_round_trip() {
        let frame = buffer_from_rgb(6, 3, |x, y| {
            if (x + y) % 2 == 0 {
                [255, 255, 255]
            } else {
                [0, 0, 0]
            }
        });
        let palette = Palette::build(std::slice::from_ref(&frame), Rgba8::WHITE).unwrap();
        let expected = palette.index_frame(&frame).unwrap();

        let min = palette.min_code_size();
        let compressed = lzw_compress(&expected, min);
        assert_eq!(lzw_decode(&compressed, min), expected);
    }

    #[test]
    fn frame_size_mismatch_is_rejected() {
        let cfg = small_cfg(8, 4);
        let good = buffer_from_rgb(8, 4, |_, _| [255, 255, 255]);
        let bad = buffer_from_rgb(4, 4, |_, _| [255, 255, 255]);
        let palette = Palette::build(std::slice::from_ref(&good), Rgba8::WHITE).unwrap();
        let mut enc = GifEncoder::new(Vec::new(), &cfg, palette).unwrap();
        assert!(enc.write_frame(&bad).is_err());
        assert!(enc.write_frame(&good).is_ok());
        assert_eq!(enc.frames_written(), 1);
    }

    #[test]
    fn empty_animation_is_rejected() {
        assert!(encode_animation(&[], &small_cfg(8, 4)).is_err());
    }

    #[test]
    fn sink_failures_propagate_as_encode_errors() {
        struct FailingSink;
        impl Write for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("sink closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let cfg = small_cfg(8, 4);
        let frame = buffer_from_rgb(8, 4, |_, _| [255, 255, 255]);
        let palette = Palette::build(std::slice::from_ref(&frame), Rgba8::WHITE).unwrap();
        let err = GifEncoder::new(FailingSink, &cfg, palette).unwrap_err();
        assert!(matches!(err, KinetypeError::Encode(_)));
    }
}
