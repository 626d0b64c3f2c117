//! Glyph atlas
//!
//! Atlases are built in two phases:
//!
//! 1. [`AtlasBuilder::build`] rasterizes the charset, shelf-packs the glyphs
//!    into RGBA pages and gathers kerning. It touches no GPU state and the
//!    resulting [`AtlasLayout`] is `Send + Sync`, so it can run on a worker.
//! 2. [`AtlasLayout::materialize`] uploads one texture per page on the device
//!    thread. Every glyph region is a sub-texture of its page, so a string
//!    drawn from one page binds a single texture.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tessera_gpu::{RenderDevice, Texture};

use crate::source::{GlyphSource, LineMetrics};
use crate::{Result, TextError};

/// Default maximum page edge in pixels
pub const DEFAULT_PAGE_SIZE: u32 = 1024;

/// Pixel rectangle of a glyph inside a page (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasRegion {
    pub page: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Per-glyph metrics at the atlas size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphMetrics {
    pub advance: f32,
    pub bearing_x: f32,
    pub bearing_y: f32,
    pub width: f32,
    pub height: f32,
    /// `None` for blank glyphs such as space
    pub region: Option<AtlasRegion>,
}

/// RGBA pixels of one page: white with coverage in alpha
#[derive(Debug, Clone)]
pub struct AtlasPage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Configures and runs the CPU phase of an atlas build
#[derive(Debug, Clone)]
pub struct AtlasBuilder {
    size: f32,
    charset: Vec<char>,
    max_page_size: u32,
    padding: u32,
}

impl AtlasBuilder {
    /// Builder for printable ASCII at `size` pixels
    pub fn new(size: f32) -> Self {
        Self {
            size,
            charset: (' '..='~').collect(),
            max_page_size: DEFAULT_PAGE_SIZE,
            padding: 1,
        }
    }

    /// Replace the charset; duplicates are dropped
    pub fn charset(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.charset.clear();
        for ch in chars {
            if !self.charset.contains(&ch) {
                self.charset.push(ch);
            }
        }
        self
    }

    pub fn max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Empty pixels kept around every glyph
    pub fn padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Rasterize, pack and measure the charset
    pub fn build(&self, source: &mut dyn GlyphSource) -> Result<AtlasLayout> {
        if self.charset.is_empty() {
            return Err(TextError::EmptyCharset);
        }

        let line = source.line_metrics(self.size);
        let pad = self.padding;
        let max = self.max_page_size;

        let mut glyphs: FxHashMap<char, GlyphMetrics> = FxHashMap::default();
        let mut images = Vec::new();
        let mut missing = Vec::new();

        for &ch in &self.charset {
            let Some(image) = source.glyph(ch, self.size) else {
                missing.push(ch);
                continue;
            };
            if image.width + 2 * pad > max || image.height + 2 * pad > max {
                tracing::error!("Glyph {:?} is larger than the atlas page", ch);
                return Err(TextError::GlyphTooLarge {
                    ch,
                    width: image.width,
                    height: image.height,
                    max,
                });
            }
            glyphs.insert(
                ch,
                GlyphMetrics {
                    advance: image.advance,
                    bearing_x: image.bearing_x as f32,
                    bearing_y: image.bearing_y as f32,
                    width: image.width as f32,
                    height: image.height as f32,
                    region: None,
                },
            );
            if image.width > 0 && image.height > 0 {
                images.push((ch, image));
            }
        }
        if !missing.is_empty() {
            tracing::warn!("Font has no glyph for {} atlas characters: {:?}", missing.len(), missing);
        }

        // Tallest first keeps shelves tight
        images.sort_by(|(a, ia), (b, ib)| ib.height.cmp(&ia.height).then(a.cmp(b)));

        let area: u64 = images
            .iter()
            .map(|(_, i)| (i.width + 2 * pad) as u64 * (i.height + 2 * pad) as u64)
            .sum();
        let widest = images.iter().map(|(_, i)| i.width + 2 * pad).max().unwrap_or(1);
        let side = ((area as f64).sqrt().ceil() as u32).max(widest).max(1);
        let page_width = side.next_power_of_two().min(max);

        let mut packer = ShelfPacker::new(page_width, max);
        let mut placed = Vec::with_capacity(images.len());
        for (ch, image) in &images {
            let (page, x, y) = packer.place(image.width + 2 * pad, image.height + 2 * pad);
            let region = AtlasRegion {
                page,
                x: x + pad,
                y: y + pad,
                width: image.width,
                height: image.height,
            };
            if let Some(metrics) = glyphs.get_mut(ch) {
                metrics.region = Some(region);
            }
            placed.push((region, image));
        }

        let mut pages: Vec<AtlasPage> = packer
            .finish()
            .into_iter()
            .map(|height| AtlasPage {
                width: page_width,
                height,
                pixels: [255, 255, 255, 0].repeat((page_width * height) as usize),
            })
            .collect();

        for (region, image) in placed {
            blit_coverage(&mut pages[region.page], &region, &image.coverage);
        }

        let mut kerning = FxHashMap::default();
        for &a in self.charset.iter().filter(|c| glyphs.contains_key(c)) {
            for &b in self.charset.iter().filter(|c| glyphs.contains_key(c)) {
                let k = source.kerning(a, b, self.size);
                if k != 0.0 {
                    kerning.insert((a, b), k);
                }
            }
        }

        tracing::debug!(
            "built atlas: size={}, glyphs={}, pages={}, page_width={}, kerning_pairs={}",
            self.size,
            glyphs.len(),
            pages.len(),
            page_width,
            kerning.len()
        );

        Ok(AtlasLayout {
            size: self.size,
            line,
            glyphs,
            kerning,
            pages,
        })
    }
}

/// Writes coverage into the alpha channel of a page region
fn blit_coverage(page: &mut AtlasPage, region: &AtlasRegion, coverage: &[u8]) {
    let pixels = (region.width * region.height) as usize;
    if pixels == 0 {
        return;
    }
    // swash may hand back RGBA for color bitmap sources
    let stride = match coverage.len() / pixels {
        1 => 1,
        4 => 4,
        _ => {
            tracing::warn!(
                "Glyph coverage has {} bytes for {}x{}; leaving it blank",
                coverage.len(),
                region.width,
                region.height
            );
            return;
        }
    };
    for row in 0..region.height {
        for col in 0..region.width {
            let src = ((row * region.width + col) as usize) * stride + (stride - 1);
            let dst = (((region.y + row) * page.width + region.x + col) * 4 + 3) as usize;
            page.pixels[dst] = coverage[src];
        }
    }
}

/// Shelf packing across pages of fixed width and bounded height
struct ShelfPacker {
    width: u32,
    max_height: u32,
    x: u32,
    y: u32,
    shelf: u32,
    page: usize,
    heights: Vec<u32>,
}

impl ShelfPacker {
    fn new(width: u32, max_height: u32) -> Self {
        Self {
            width,
            max_height,
            x: 0,
            y: 0,
            shelf: 0,
            page: 0,
            heights: Vec::new(),
        }
    }

    /// Top-left of a `w`x`h` cell; callers guarantee it fits an empty page
    fn place(&mut self, w: u32, h: u32) -> (usize, u32, u32) {
        if self.x + w > self.width {
            self.y += self.shelf;
            self.x = 0;
            self.shelf = 0;
        }
        if self.y + h > self.max_height {
            self.heights.push(self.y.max(1));
            self.page += 1;
            self.x = 0;
            self.y = 0;
            self.shelf = 0;
        }
        let at = (self.page, self.x, self.y);
        self.x += w;
        self.shelf = self.shelf.max(h);
        at
    }

    /// Used height of every page
    fn finish(mut self) -> Vec<u32> {
        self.heights.push((self.y + self.shelf).max(1));
        self.heights
    }
}

/// CPU result of an atlas build
#[derive(Debug, Clone)]
pub struct AtlasLayout {
    size: f32,
    line: LineMetrics,
    glyphs: FxHashMap<char, GlyphMetrics>,
    kerning: FxHashMap<(char, char), f32>,
    pages: Vec<AtlasPage>,
}

impl AtlasLayout {
    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn line_metrics(&self) -> LineMetrics {
        self.line
    }

    pub fn glyph(&self, ch: char) -> Option<&GlyphMetrics> {
        self.glyphs.get(&ch)
    }

    pub fn kerning(&self, left: char, right: char) -> f32 {
        self.kerning.get(&(left, right)).copied().unwrap_or(0.0)
    }

    pub fn pages(&self) -> &[AtlasPage] {
        &self.pages
    }

    /// Upload the pages. Must run on the thread that owns the device.
    pub fn materialize<D: RenderDevice + ?Sized>(self, device: &mut D) -> Result<FontAtlas> {
        let mut pages = Vec::with_capacity(self.pages.len());
        for (i, page) in self.pages.iter().enumerate() {
            let texture = device
                .create_texture(page.width, page.height, &page.pixels)
                .map_err(|err| {
                    tracing::error!("Failed to upload atlas page {}: {}", i, err);
                    err
                })?;
            pages.push(Arc::new(texture));
        }

        let regions = self
            .glyphs
            .iter()
            .filter_map(|(&ch, metrics)| {
                let r = metrics.region?;
                let page = pages.get(r.page)?;
                Some((ch, Arc::new(page.sub_texture(r.x, r.y, r.width, r.height))))
            })
            .collect();

        Ok(FontAtlas {
            size: self.size,
            line: self.line,
            glyphs: self.glyphs,
            kerning: self.kerning,
            pages,
            regions,
        })
    }
}

/// A glyph atlas resident on the device
#[derive(Debug)]
pub struct FontAtlas {
    size: f32,
    line: LineMetrics,
    glyphs: FxHashMap<char, GlyphMetrics>,
    kerning: FxHashMap<(char, char), f32>,
    pages: Vec<Arc<Texture>>,
    regions: FxHashMap<char, Arc<Texture>>,
}

impl FontAtlas {
    /// Pixel size the glyphs were rasterized at
    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn line_metrics(&self) -> LineMetrics {
        self.line
    }

    pub fn glyph(&self, ch: char) -> Option<&GlyphMetrics> {
        self.glyphs.get(&ch)
    }

    pub fn has_glyph(&self, ch: char) -> bool {
        self.glyphs.contains_key(&ch)
    }

    pub fn kerning(&self, left: char, right: char) -> f32 {
        self.kerning.get(&(left, right)).copied().unwrap_or(0.0)
    }

    pub fn pages(&self) -> &[Arc<Texture>] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Arc<Texture>> {
        self.pages.get(index)
    }

    /// The glyph's region as a sub-texture of its page
    pub fn glyph_texture(&self, ch: char) -> Option<&Arc<Texture>> {
        self.regions.get(&ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shelf_packer_wraps_rows_and_pages() {
        let mut packer = ShelfPacker::new(10, 10);
        assert_eq!(packer.place(6, 4), (0, 0, 0));
        assert_eq!(packer.place(6, 4), (0, 0, 4));
        assert_eq!(packer.place(4, 3), (0, 6, 4));
        assert_eq!(packer.place(6, 4), (1, 0, 0));
        assert_eq!(packer.finish(), vec![8, 4]);
    }

    #[test]
    fn test_blit_writes_alpha_only() {
        let mut page = AtlasPage {
            width: 4,
            height: 4,
            pixels: [255, 255, 255, 0].repeat(16),
        };
        let region = AtlasRegion {
            page: 0,
            x: 1,
            y: 2,
            width: 2,
            height: 1,
        };
        blit_coverage(&mut page, &region, &[10, 20]);
        assert_eq!(&page.pixels[(2 * 4 + 1) * 4..(2 * 4 + 3) * 4], &[255, 255, 255, 10, 255, 255, 255, 20]);
        assert_eq!(page.pixels[3], 0);
    }

    #[test]
    fn test_layout_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AtlasLayout>();
    }
}
