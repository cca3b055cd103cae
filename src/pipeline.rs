//! Orchestration: request validation, frame evaluation, encoding and the
//! storage hand-off.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{
    core::{FrameIndex, RenderConfig},
    encode_gif,
    error::{KinetypeError, KinetypeResult},
    render::{PixelBuffer, render_frame},
    style::{StyleId, frame_params},
    text::GlyphFont,
};

/// Maximum request text length in characters.
pub const MAX_TEXT_CHARS: usize = 20;

/// A validated generation request: what to draw and how to animate it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnimationRequest {
    pub text: String,
    pub style: StyleId,
}

impl AnimationRequest {
    pub fn new(text: impl Into<String>, style: StyleId) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Re-check the boundary contract: 1..=20 printable characters.
    ///
    /// Collaborators validate before calling in; this is the core's
    /// defensive fail-fast so malformed input can never reach a strategy.
    pub fn validate(&self) -> KinetypeResult<()> {
        let chars = self.text.chars().count();
        if chars == 0 {
            return Err(KinetypeError::validation("text must be non-empty"));
        }
        if chars > MAX_TEXT_CHARS {
            return Err(KinetypeError::validation(format!(
                "text must be at most {MAX_TEXT_CHARS} characters, got {chars}"
            )));
        }
        if self.text.chars().any(char::is_control) {
            return Err(KinetypeError::validation(
                "text must not contain control characters",
            ));
        }
        Ok(())
    }
}

/// Where a stored animation ended up, relative to the store root.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Locator {
    /// Collision-resistant identifier (file stem).
    pub id: String,
    /// Store-relative path, e.g. `"<id>.gif"`.
    pub rel_path: String,
}

/// Byte sink collaborator that persists finished animations.
///
/// Implementations must tolerate concurrent puts of distinct names; the
/// identifier space makes collisions negligible.
pub trait GifStore {
    fn put(&self, file_name: &str, bytes: &[u8]) -> KinetypeResult<Locator>;
}

/// Filesystem-backed [`GifStore`] writing one file per animation.
#[derive(Clone, Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl GifStore for DirStore {
    fn put(&self, file_name: &str, bytes: &[u8]) -> KinetypeResult<Locator> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create store directory '{}'", self.root.display()))?;
        let path = self.root.join(file_name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("write animation to '{}'", path.display()))?;
        Ok(Locator {
            id: file_name.trim_end_matches(".gif").to_string(),
            rel_path: file_name.to_string(),
        })
    }
}

/// Allocate a fresh 128-bit identifier as 32 lowercase hex characters.
pub fn new_gif_id() -> String {
    format!("{:032x}", fastrand::u128(..))
}

/// The generation engine: style evaluation, rasterization and GIF encoding
/// behind one entry point.
///
/// Holds no per-request state; concurrent requests may share one instance.
#[derive(Debug)]
pub struct Generator {
    cfg: RenderConfig,
    font: &'static GlyphFont,
}

impl Generator {
    pub fn new(cfg: RenderConfig) -> KinetypeResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            font: GlyphFont::builtin(),
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.cfg
    }

    /// Evaluate and rasterize every frame of the animation, in frame-index
    /// order.
    ///
    /// Frames are pure functions of their index, so the parallel path maps
    /// over `0..frame_count` on a rayon pool; collecting reassembles index
    /// order before the caller ever sees the buffers.
    #[tracing::instrument(skip(self, request), fields(style = %request.style))]
    pub fn render_animation(&self, request: &AnimationRequest) -> KinetypeResult<Vec<PixelBuffer>> {
        request.validate()?;

        let n = self.cfg.frame_count;
        let render_one = |f: u64| -> KinetypeResult<PixelBuffer> {
            let params = frame_params(request.style, &request.text, FrameIndex(f), n);
            render_frame(&request.text, &params, &self.cfg, self.font)
        };

        if self.cfg.parallel {
            (0..n).into_par_iter().map(render_one).collect()
        } else {
            (0..n).map(render_one).collect()
        }
    }

    /// Encode an ordered frame sequence into GIF89a bytes.
    pub fn encode_frames(&self, frames: &[PixelBuffer]) -> KinetypeResult<Vec<u8>> {
        encode_gif::encode_animation(frames, &self.cfg)
    }

    /// Full pipeline: render, encode, allocate an identifier and persist.
    ///
    /// Validation failures surface before any frame is rendered; everything
    /// after validation is an internal generation failure. The call is pure
    /// up to the freshly drawn identifier, so callers may retry it whole.
    #[tracing::instrument(skip(self, request, store), fields(style = %request.style))]
    pub fn generate(
        &self,
        request: &AnimationRequest,
        store: &dyn GifStore,
    ) -> KinetypeResult<Locator> {
        let frames = self.render_animation(request)?;
        let bytes = self.encode_frames(&frames)?;
        tracing::debug!(
            frames = frames.len(),
            bytes = bytes.len(),
            "animation encoded"
        );

        let file_name = format!("{}.gif", new_gif_id());
        let locator = store.put(&file_name, &bytes)?;
        tracing::info!(id = %locator.id, "animation stored");
        Ok(locator)
    }
}
