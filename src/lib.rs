//! Kinetype turns a short text string and a named animation style into a
//! looping animated GIF.
//!
//! # Pipeline overview
//!
//! 1. **Evaluate**: [`frame_params`] maps `(style, text, frame, frame_count)`
//!    to per-frame render parameters — pure and deterministic, any order.
//! 2. **Render**: [`render_frame`] rasterizes the text onto a [`PixelBuffer`]
//!    with text-metric-based centering.
//! 3. **Encode**: [`encode_animation`] builds one global palette, compresses
//!    each frame with LZW and assembles the GIF89a document (constant delay,
//!    infinite loop).
//! 4. **Orchestrate**: [`Generator::generate`] runs the three stages,
//!    allocates an identifier and hands the bytes to a [`GifStore`].
//!
//! Key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic-by-default**: identical `(text, style, config)` inputs
//!   produce identical bytes; only the storage identifier is random.
//! - **No IO in the core**: rendering and encoding write to owned buffers;
//!   only [`GifStore`] implementations touch the filesystem.
#![forbid(unsafe_code)]

pub mod color;
pub mod core;
pub mod encode_gif;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod style;
pub mod text;

pub use core::{Canvas, FrameIndex, Rgba8, RenderConfig};
pub use encode_gif::{GifEncoder, MAX_PALETTE_COLORS, Palette, encode_animation};
pub use error::{KinetypeError, KinetypeResult};
pub use pipeline::{
    AnimationRequest, DirStore, Generator, GifStore, Locator, MAX_TEXT_CHARS, new_gif_id,
};
pub use render::{DrawContext, PixelBuffer, render_frame};
pub use style::{BOUNCE_AMPLITUDE_PX, FrameParams, GlyphParams, StyleId, frame_params};
pub use text::GlyphFont;
