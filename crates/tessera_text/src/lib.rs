//! Font atlases and text layout for Tessera
//!
//! This crate provides:
//! - Font loading and parsing (TTF/OTF via ttf-parser)
//! - Glyph rasterization (swash)
//! - A two-phase glyph atlas: a CPU build that may run on any thread, then
//!   GPU materialization on the device thread
//! - Text layout (word wrap, alignment, justification, anchoring) producing
//!   glyph runs for [`tessera_gpu::SpriteBatch::draw_text`]

pub mod atlas;
pub mod face;
pub mod layout;
pub mod rasterizer;
pub mod source;

pub use atlas::{AtlasBuilder, AtlasLayout, AtlasPage, AtlasRegion, FontAtlas, GlyphMetrics};
pub use face::{FontFace, FontMetrics};
pub use layout::{justify_tracking, PlacedGlyph, TextAlignment, TextAnchor, TextBlock, TextLayout, TextLine};
pub use rasterizer::{GlyphRasterizer, RasterizedGlyph};
pub use source::{FontGlyphSource, GlyphImage, GlyphSource, LineMetrics};

use tessera_gpu::GpuError;
use thiserror::Error;

/// Text errors
#[derive(Error, Debug)]
pub enum TextError {
    #[error("Failed to parse font: {0}")]
    FontParse(String),

    #[error("Invalid font data")]
    InvalidFontData,

    #[error("Glyph {ch:?} ({width}x{height}) does not fit a {max}px atlas page")]
    GlyphTooLarge {
        ch: char,
        width: u32,
        height: u32,
        max: u32,
    },

    #[error("Atlas charset is empty")]
    EmptyCharset,

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

pub type Result<T> = std::result::Result<T, TextError>;
