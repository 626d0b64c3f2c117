//! Paged canvas

use tessera_gpu::{BlendEquation, BlendFunc, RenderDevice, SpriteBatch, StencilEffect};
use tessera_paint::{Affine, Color};
use tracing::debug;

use crate::compositor::draw_command;
use crate::page::Page;

/// A canvas with one or more pages.
///
/// Authoring calls go to the edit page through [`CanvasNode::editor`];
/// [`CanvasNode::draw`] renders the draw page. The two can differ, so one
/// page can be rebuilt while another is shown.
#[derive(Debug, Clone)]
pub struct CanvasNode {
    pages: Vec<Page>,
    edit_page: usize,
    draw_page: usize,
}

impl Default for CanvasNode {
    fn default() -> Self {
        Self::new(1)
    }
}

impl CanvasNode {
    /// A canvas with `pages` empty pages (at least one)
    pub fn new(pages: usize) -> Self {
        let mut node = Self {
            pages: Vec::new(),
            edit_page: 0,
            draw_page: 0,
        };
        node.paginate(pages);
        node
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Resize to `count` pages (at least one), clamping the page indices
    pub fn paginate(&mut self, count: usize) {
        let count = count.max(1);
        if count != self.pages.len() {
            debug!("Paginating canvas: {} -> {} pages", self.pages.len(), count);
        }
        self.pages.resize_with(count, Page::new);
        self.edit_page = self.edit_page.min(count - 1);
        self.draw_page = self.draw_page.min(count - 1);
    }

    pub fn edit_page(&self) -> usize {
        self.edit_page
    }

    /// Select the page that receives authoring calls, adding pages as needed
    pub fn set_edit_page(&mut self, index: usize) {
        if index >= self.pages.len() {
            self.paginate(index + 1);
        }
        self.edit_page = index;
    }

    pub fn draw_page(&self) -> usize {
        self.draw_page
    }

    /// Select the page that [`CanvasNode::draw`] renders, adding pages as needed
    pub fn set_draw_page(&mut self, index: usize) {
        if index >= self.pages.len() {
            self.paginate(index + 1);
        }
        self.draw_page = index;
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn page_mut(&mut self, index: usize) -> Option<&mut Page> {
        self.pages.get_mut(index)
    }

    /// The edit page
    pub fn editor(&mut self) -> &mut Page {
        &mut self.pages[self.edit_page]
    }

    pub fn clear_page(&mut self, index: usize) {
        if let Some(page) = self.pages.get_mut(index) {
            page.clear();
        }
    }

    pub fn clear_all(&mut self) {
        for page in &mut self.pages {
            page.clear();
        }
    }

    /// Replay the draw page into an active batch.
    ///
    /// Starts from a cleared stencil buffer and leaves the batch with its
    /// default blend, stencil, texture, gradient, scissor and blur state.
    /// The batch color is restored afterwards.
    pub fn draw<D: RenderDevice>(&self, batch: &mut SpriteBatch<D>, transform: &Affine, tint: Color) {
        let page = &self.pages[self.draw_page];
        if page.is_empty() {
            return;
        }

        let color = batch.color();
        batch.clear_stencil();
        for command in page.commands() {
            draw_command(batch, command, transform, tint);
        }

        batch.set_stencil_effect(StencilEffect::None);
        batch.set_blend_equation(BlendEquation::Add);
        batch.set_blend_func(BlendFunc::SOURCE_OVER);
        batch.set_texture(None);
        batch.set_gradient(None);
        batch.set_scissor(None);
        batch.set_blur(0.0);
        batch.set_color(color);
    }
}
