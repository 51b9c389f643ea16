//! Viewport anchoring across store mutations.
//!
//! Anchoring is two-phase: [`ViewportAnchor::prepare`] runs immediately before the store is
//! mutated and only records the current content extent; [`ViewportAnchor::settle`] runs once
//! the mutated rows are committed to the rendered view and is the only place that measures
//! the new extent and writes the scroll offset.

use crate::query::QueryKind;

/// Measured scroll container. Offsets grow downward from the top of the content.
pub trait ScrollSurface {
    /// Total scrollable content size along the scroll axis.
    fn content_extent(&self) -> f32;
    /// Visible size along the scroll axis.
    fn viewport_extent(&self) -> f32;
    fn offset(&self) -> f32;
    fn set_offset(&mut self, offset: f32);

    fn max_offset(&self) -> f32 {
        (self.content_extent() - self.viewport_extent()).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorMode {
    /// Jump to the newest messages.
    Bottom,
    /// Keep the row under the viewport where it was while content grows above it.
    Preserve,
}

impl From<QueryKind> for AnchorMode {
    fn from(kind: QueryKind) -> Self {
        match kind {
            QueryKind::Initial => Self::Bottom,
            QueryKind::Older => Self::Preserve,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnchorState {
    pub prior_content_extent: f32,
}

#[derive(Debug, Default)]
pub struct ViewportAnchor {
    state: AnchorState,
    pending: Option<AnchorMode>,
}

impl ViewportAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AnchorState {
        self.state
    }

    pub fn pending(&self) -> Option<AnchorMode> {
        self.pending
    }

    pub fn reset(&mut self) {
        self.state = AnchorState::default();
        self.pending = None;
    }

    /// Records the extent before a mutation. Must run before the store changes.
    pub fn prepare(&mut self, mode: AnchorMode, surface: &dyn ScrollSurface) {
        match self.pending {
            // A second merge landed before the first one was laid out: the earliest prior
            // extent still describes what the user saw, so keep it.
            Some(AnchorMode::Bottom) => {}
            Some(AnchorMode::Preserve) => {
                if mode == AnchorMode::Bottom {
                    self.pending = Some(AnchorMode::Bottom);
                }
            }
            None => {
                self.state.prior_content_extent = surface.content_extent();
                self.pending = Some(mode);
            }
        }
    }

    /// Applies the pending adjustment against the committed layout.
    ///
    /// Returns the offset written, or `None` when nothing was pending.
    pub fn settle(&mut self, surface: &mut dyn ScrollSurface) -> Option<f32> {
        let mode = self.pending.take()?;
        let new_extent = surface.content_extent();
        let max_offset = surface.max_offset();

        let target = match mode {
            AnchorMode::Bottom => max_offset,
            AnchorMode::Preserve => {
                let grown_by = (new_extent - self.state.prior_content_extent).max(0.0);
                (surface.offset() + grown_by).clamp(0.0, max_offset)
            }
        };

        surface.set_offset(target);
        self.state.prior_content_extent = new_extent;
        tracing::trace!(?mode, new_extent, offset = target, "viewport anchor settled");
        Some(target)
    }
}
