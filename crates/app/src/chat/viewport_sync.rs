use std::ops::Range;

use missive_history::{HistoryPager, ScrollSurface, SentinelKey};

use crate::chat::sentinel::SentinelWatch;

/// Where a pending viewport adjustment stands relative to layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorFrame {
    #[default]
    Idle,
    /// Merged rows are being laid out this frame.
    AwaitingLayout,
    /// Layout committed; the next render settles the anchor.
    ReadyToSettle,
}

/// Orders viewport settling and sentinel reports across render frames.
///
/// Rows merged by the pager are laid out in the frame after the merge; the anchor settles in
/// the frame after that, and the sentinel is not reported until it has.
#[derive(Debug, Default)]
pub struct ViewportSync {
    frame: AnchorFrame,
}

impl ViewportSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> AnchorFrame {
        self.frame
    }

    /// A page was merged; its rows lay out in the coming frame.
    pub fn merged(&mut self) {
        self.frame = AnchorFrame::AwaitingLayout;
    }

    pub fn reset(&mut self) {
        self.frame = AnchorFrame::Idle;
    }

    /// Advances one render frame. Returns true when another frame must be requested.
    pub fn advance(&mut self, pager: &mut HistoryPager, surface: &mut dyn ScrollSurface) -> bool {
        match self.frame {
            AnchorFrame::Idle => false,
            AnchorFrame::AwaitingLayout => {
                self.frame = AnchorFrame::ReadyToSettle;
                true
            }
            AnchorFrame::ReadyToSettle => {
                pager.settle_viewport(surface);
                self.frame = AnchorFrame::Idle;
                false
            }
        }
    }

    /// Reports a visible sentinel once no viewport adjustment is outstanding.
    pub fn report_sentinel(
        &self,
        pager: &HistoryPager,
        watch: &mut SentinelWatch,
        visible_rows: &Range<usize>,
    ) -> Option<SentinelKey> {
        if self.frame != AnchorFrame::Idle || pager.has_pending_anchor() {
            return None;
        }
        watch.report(visible_rows)
    }
}

#[cfg(test)]
mod tests {
    use missive_history::{
        ApplyOutcome, FetchError, FetchOutcome, FetchTicket, Message, MessageId, PageResult,
    };

    use super::*;

    const ROW_HEIGHT: f32 = 40.0;
    const PAGE_SIZE: u64 = 10;

    struct ListSurface {
        content: f32,
        viewport: f32,
        offset: f32,
    }

    impl ScrollSurface for ListSurface {
        fn content_extent(&self) -> f32 {
            self.content
        }

        fn viewport_extent(&self) -> f32 {
            self.viewport
        }

        fn offset(&self) -> f32 {
            self.offset
        }

        fn set_offset(&mut self, offset: f32) {
            self.offset = offset;
        }
    }

    struct Frames {
        pager: HistoryPager,
        watch: SentinelWatch,
        sync: ViewportSync,
        surface: ListSurface,
        issued: Vec<FetchTicket>,
    }

    impl Frames {
        fn open(chat_id: u64) -> (Self, FetchTicket) {
            let mut frames = Self {
                pager: HistoryPager::new(),
                watch: SentinelWatch::new(),
                sync: ViewportSync::new(),
                surface: ListSurface {
                    content: 0.0,
                    viewport: 320.0,
                    offset: 0.0,
                },
                issued: Vec::new(),
            };
            let ticket = frames
                .pager
                .resolve(Some(chat_id), None, &mut frames.watch)
                .expect("initial ticket");
            (frames, ticket)
        }

        fn apply(&mut self, outcome: FetchOutcome) -> ApplyOutcome {
            let applied = self.pager.apply(outcome, &self.surface, &mut self.watch);
            if matches!(applied, ApplyOutcome::Merged(_)) {
                self.sync.merged();
            }
            applied
        }

        /// One render pass: settle, lay out, then report the visible rows.
        fn render(&mut self, visible_rows: Range<usize>) {
            self.sync.advance(&mut self.pager, &mut self.surface);
            self.surface.content = self.pager.messages().len() as f32 * ROW_HEIGHT;
            let Some(key) = self
                .sync
                .report_sentinel(&self.pager, &mut self.watch, &visible_rows)
            else {
                return;
            };
            if let Some(ticket) = self.pager.sentinel_visible(key, &mut self.watch) {
                self.issued.push(ticket);
            }
        }
    }

    fn message(id: u64) -> Message {
        Message::new(
            MessageId::new(id),
            1,
            "author",
            format!("m{id}"),
            1_700_000_000 + id as i64 * 60,
        )
    }

    fn page(low: u64, high: u64, total: u64) -> PageResult {
        PageResult {
            rows: (low..=high).rev().map(message).collect(),
            sidebar_list: None,
            total,
            page_size: PAGE_SIZE,
        }
    }

    fn ok(ticket: &FetchTicket, page: PageResult) -> FetchOutcome {
        FetchOutcome {
            generation: ticket.generation,
            query: ticket.query.clone(),
            result: Ok(page),
        }
    }

    fn failed(ticket: &FetchTicket) -> FetchOutcome {
        FetchOutcome {
            generation: ticket.generation,
            query: ticket.query.clone(),
            result: Err(FetchError::Network {
                stage: "test",
                details: "connection reset".to_string(),
            }),
        }
    }

    #[test]
    fn sentinel_is_not_reported_until_anchor_settles() {
        let (mut frames, initial) = Frames::open(5);
        frames.apply(ok(&initial, page(26, 35, 35)));

        frames.render(0..8);
        assert_eq!(frames.sync.frame(), AnchorFrame::ReadyToSettle);
        assert!(frames.pager.has_pending_anchor());
        assert!(frames.issued.is_empty());

        frames.render(0..8);
        assert_eq!(frames.sync.frame(), AnchorFrame::Idle);
        assert!(!frames.pager.has_pending_anchor());
        assert_eq!(frames.surface.offset, frames.surface.max_offset());
        assert_eq!(frames.issued.len(), 1);
    }

    #[test]
    fn anchor_settles_against_laid_out_rows() {
        let (mut frames, initial) = Frames::open(5);
        frames.apply(ok(&initial, page(26, 35, 35)));
        frames.render(3..11);
        frames.render(3..11);
        assert_eq!(frames.surface.offset, 80.0);

        frames.render(0..8);
        let older = frames.issued.pop().expect("older page issued");
        frames.surface.offset = 12.0;
        frames.apply(ok(&older, page(16, 25, 35)));

        // Laid out before settling: the offset still points at the old rows.
        frames.render(0..8);
        assert_eq!(frames.surface.offset, 12.0);
        assert_eq!(frames.surface.content, 20.0 * ROW_HEIGHT);

        frames.render(0..8);
        assert_eq!(frames.surface.offset, 12.0 + 10.0 * ROW_HEIGHT);
    }

    #[test]
    fn failed_older_page_waits_for_sentinel_to_return() {
        let (mut frames, initial) = Frames::open(5);
        frames.apply(ok(&initial, page(26, 35, 35)));
        frames.render(0..8);
        frames.render(0..8);
        let older = frames.issued.pop().expect("older page issued");

        assert_eq!(frames.apply(failed(&older)), ApplyOutcome::Failed);
        for _ in 0..5 {
            frames.render(0..8);
        }
        assert!(frames.issued.is_empty());

        frames.render(4..12);
        frames.render(0..8);
        assert_eq!(frames.issued.len(), 1);
        assert_eq!(frames.issued[0].query, older.query);
    }

    #[test]
    fn retry_reissues_failed_page_while_sentinel_stays_visible() {
        let (mut frames, initial) = Frames::open(5);
        frames.apply(ok(&initial, page(26, 35, 35)));
        frames.render(0..8);
        frames.render(0..8);
        let older = frames.issued.pop().expect("older page issued");
        frames.apply(failed(&older));
        frames.render(0..8);

        let retried = frames
            .pager
            .retry(&mut frames.watch)
            .expect("failed page can be retried");
        assert_eq!(retried.query, older.query);

        frames.apply(ok(&retried, page(16, 25, 35)));
        frames.render(0..8);
        frames.render(0..8);
        assert_eq!(frames.pager.messages().len(), 20);

        // The merged page brings a new sentinel, which may fire without scrolling away.
        let next = frames.issued.pop().expect("next older page issued");
        assert_ne!(next.query, older.query);
    }
}
