use gpui::{Bounds, Pixels, Point, point, px};
use gpui_component::VirtualListScrollHandle;
use missive_history::ScrollSurface;

/// Exposes the history list's virtual-list handle as a measured scroll surface.
///
/// GPUI offsets are negative as content scrolls down; the surface reports them as positive
/// distances from the top of the content.
pub struct ScrollManager {
    scroll_handle: VirtualListScrollHandle,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            scroll_handle: VirtualListScrollHandle::new(),
        }
    }

    pub fn handle(&self) -> &VirtualListScrollHandle {
        &self.scroll_handle
    }

    pub fn bounds(&self) -> Bounds<Pixels> {
        self.scroll_handle.bounds()
    }

    pub fn offset(&self) -> Point<Pixels> {
        self.scroll_handle.offset()
    }

    /// Returns to the top before a different conversation is shown.
    pub fn reset(&mut self) {
        self.scroll_handle.set_offset(point(Pixels::ZERO, Pixels::ZERO));
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollSurface for ScrollManager {
    fn content_extent(&self) -> f32 {
        // The handle only knows the scrollable overflow; content shorter than the viewport
        // reports the viewport height.
        f32::from(self.scroll_handle.max_offset().height) + self.viewport_extent()
    }

    fn viewport_extent(&self) -> f32 {
        f32::from(self.scroll_handle.bounds().size.height)
    }

    fn offset(&self) -> f32 {
        -f32::from(self.scroll_handle.offset().y)
    }

    fn set_offset(&mut self, offset: f32) {
        let current_x = self.scroll_handle.offset().x;
        self.scroll_handle.set_offset(point(current_x, px(-offset)));
    }
}
