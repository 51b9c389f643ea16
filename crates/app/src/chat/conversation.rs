use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;

use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex, v_virtual_list,
};
use gpui_tokio_bridge::Tokio;
use missive_history::{
    ApplyOutcome, ConversationIdentity, FetchError, FetchOutcome, FetchTicket, HistoryFetcher,
    HistoryPager, MessageId, SentinelKey, SentinelView, ViewState, run_ticket,
};

use crate::chat::events::HistoryLoaded;
use crate::chat::message_row::{
    DEFAULT_CONTENT_WIDTH, HistoryRow, LIST_HORIZONTAL_PADDING, SENTINEL_ROW_HEIGHT,
    estimate_message_height, history_rows, max_pixels, pixels_changed, render_message_row,
};
use crate::chat::scroll_manager::ScrollManager;
use crate::chat::sentinel::SentinelWatch;
use crate::chat::source::open_history_source;
use crate::chat::viewport_sync::ViewportSync;
use crate::settings::ViewerSettings;

const CONTENT_WIDTH_CHANGE_EPSILON: f32 = 1.0;

struct SizeCacheEntry {
    height: Pixels,
    measured: bool,
}

/// Paged history of the open conversation.
pub struct ConversationView {
    pager: HistoryPager,
    scroll_manager: ScrollManager,
    sentinel: SentinelWatch,
    fetcher: Option<Arc<dyn HistoryFetcher>>,
    source_error: Option<SharedString>,
    /// Replaced on every settings change, which drops a superseded bootstrap.
    source_task: Option<Task<()>>,
    current_uid: Option<u64>,
    rows: Vec<HistoryRow>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    size_cache: HashMap<MessageId, SizeCacheEntry>,
    content_width: Option<Pixels>,
    viewport_sync: ViewportSync,
}

impl EventEmitter<HistoryLoaded> for ConversationView {}

impl ConversationView {
    pub fn new(settings: Arc<ViewerSettings>, cx: &mut Context<Self>) -> Self {
        let mut view = Self {
            pager: HistoryPager::new(),
            scroll_manager: ScrollManager::new(),
            sentinel: SentinelWatch::new(),
            fetcher: None,
            source_error: None,
            source_task: None,
            current_uid: settings.current_uid,
            rows: Vec::new(),
            item_sizes: Rc::new(Vec::new()),
            size_cache: HashMap::new(),
            content_width: None,
            viewport_sync: ViewportSync::new(),
        };
        view.set_source(settings, cx);
        view
    }

    pub fn identity(&self) -> Option<ConversationIdentity> {
        self.pager.identity()
    }

    pub fn pager(&self) -> &HistoryPager {
        &self.pager
    }

    /// Display name of the open conversation, from the cached sidebar list when possible.
    pub fn title(&self) -> Option<SharedString> {
        let identity = self.pager.identity()?;
        let username = self.pager.sidebar_list().and_then(|list| {
            list.iter()
                .find(|summary| summary.matches(&identity))
                .map(|summary| summary.to_username.clone())
        });

        Some(SharedString::from(
            username.unwrap_or_else(|| identity.to_string()),
        ))
    }

    /// Rebuilds the fetcher from `settings`, then reopens the current conversation on it.
    pub fn set_source(&mut self, settings: Arc<ViewerSettings>, cx: &mut Context<Self>) {
        self.fetcher = None;
        self.source_error = None;
        self.current_uid = settings.current_uid;

        let opening = Tokio::spawn(cx, async move { open_history_source(settings).await });
        self.source_task = Some(cx.spawn(async move |this, cx| {
            let opened = opening.await;
            let _ = this.update(cx, |this, cx| match opened {
                Ok(Ok(fetcher)) => this.handle_source_opened(fetcher, cx),
                Ok(Err(error)) => this.handle_source_failed(error.to_string(), cx),
                Err(error) => this.handle_source_failed(error.to_string(), cx),
            });
        }));
        cx.notify();
    }

    /// Opens `identity`; reopening the current conversation is a no-op.
    pub fn open(&mut self, identity: ConversationIdentity, cx: &mut Context<Self>) {
        let previous = self.pager.generation();
        let ticket = self
            .pager
            .resolve(identity.chat_id, identity.uid, &mut self.sentinel);

        if self.pager.generation() != previous {
            self.reset_layout();
        }
        if let Some(ticket) = ticket {
            self.dispatch(ticket, cx);
        }

        self.rebuild_rows();
        cx.notify();
    }

    /// Drops the loaded history and fetches the open conversation again.
    pub fn reload(&mut self, cx: &mut Context<Self>) {
        let Some(identity) = self.pager.identity() else {
            return;
        };

        self.pager.close(&mut self.sentinel);
        self.open(identity, cx);
    }

    pub fn retry(&mut self, cx: &mut Context<Self>) {
        if let Some(ticket) = self.pager.retry(&mut self.sentinel) {
            self.dispatch(ticket, cx);
        }

        self.rebuild_rows();
        cx.notify();
    }

    fn handle_source_opened(&mut self, fetcher: Arc<dyn HistoryFetcher>, cx: &mut Context<Self>) {
        tracing::info!(fetcher = fetcher.id(), "history source ready");
        self.fetcher = Some(fetcher);
        // Pages already loaded came from the previous source.
        self.reload(cx);
        cx.notify();
    }

    fn handle_source_failed(&mut self, error: String, cx: &mut Context<Self>) {
        tracing::error!(%error, "failed to open history source");
        self.source_error = Some(error.into());
        cx.notify();
    }

    /// Runs `ticket` on the tokio runtime and applies its outcome on the UI thread.
    ///
    /// Fetches are never cancelled; the pager discards outcomes that are no longer current.
    fn dispatch(&mut self, ticket: FetchTicket, cx: &mut Context<Self>) {
        let Some(fetcher) = self.fetcher.clone() else {
            tracing::debug!(page = ticket.query.page, "history source not ready, deferring fetch");
            return;
        };

        let issued = ticket.clone();
        let fetch = Tokio::spawn(cx, async move { run_ticket(fetcher.as_ref(), ticket).await });
        cx.spawn(async move |this, cx| {
            let outcome = match fetch.await {
                Ok(outcome) => outcome,
                Err(error) => FetchOutcome {
                    generation: issued.generation,
                    query: issued.query,
                    result: Err(FetchError::Network {
                        stage: "join-history-fetch",
                        details: error.to_string(),
                    }),
                },
            };

            let _ = this.update(cx, |this, cx| this.handle_outcome(outcome, cx));
        })
        .detach();
    }

    fn handle_outcome(&mut self, outcome: FetchOutcome, cx: &mut Context<Self>) {
        match self
            .pager
            .apply(outcome, &self.scroll_manager, &mut self.sentinel)
        {
            ApplyOutcome::Discarded => return,
            ApplyOutcome::Merged(report) => {
                tracing::debug!(?report, "history page merged");
                self.viewport_sync.merged();
                cx.emit(HistoryLoaded {
                    identity: self.pager.identity(),
                    sidebar_list: self.pager.sidebar_list().map(<[_]>::to_vec),
                });
            }
            ApplyOutcome::Failed => {}
        }

        self.rebuild_rows();
        cx.notify();
    }

    fn handle_sentinel_visible(&mut self, key: SentinelKey, cx: &mut Context<Self>) {
        if let Some(ticket) = self.pager.sentinel_visible(key, &mut self.sentinel) {
            self.dispatch(ticket, cx);
            self.rebuild_rows();
            cx.notify();
        }
    }

    /// Forwards a visible sentinel once no viewport adjustment is outstanding.
    fn report_sentinel(&mut self, visible_range: &Range<usize>, cx: &mut Context<Self>) {
        let Some(key) =
            self.viewport_sync
                .report_sentinel(&self.pager, &mut self.sentinel, visible_range)
        else {
            return;
        };

        // Visibility is reported during layout; issue the fetch outside of it.
        cx.spawn(async move |this, cx| {
            let _ = this.update(cx, |this, cx| this.handle_sentinel_visible(key, cx));
        })
        .detach();
    }

    fn settle_anchor(&mut self, window: &mut Window) {
        if self
            .viewport_sync
            .advance(&mut self.pager, &mut self.scroll_manager)
        {
            window.request_animation_frame();
        }
    }

    fn reset_layout(&mut self) {
        self.size_cache.clear();
        self.viewport_sync.reset();
        self.scroll_manager.reset();
    }

    fn update_content_width(&mut self, cx: &mut Context<Self>) {
        let list_width = self.scroll_manager.bounds().size.width;
        if list_width <= Pixels::ZERO {
            return;
        }

        let next_content_width = max_pixels(px(1.), list_width - LIST_HORIZONTAL_PADDING * 2);
        let width_changed = self.content_width.is_none_or(|current| {
            (f32::from(current) - f32::from(next_content_width)).abs()
                > CONTENT_WIDTH_CHANGE_EPSILON
        });

        if width_changed {
            self.content_width = Some(next_content_width);
            for entry in self.size_cache.values_mut() {
                entry.measured = false;
            }

            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn rebuild_rows(&mut self) {
        self.rows = history_rows(self.pager.view_state(), self.pager.messages().len());
        self.rebuild_item_sizes();
    }

    fn rebuild_item_sizes(&mut self) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let messages = self.pager.messages();
        let mut active_ids = HashSet::with_capacity(messages.len());
        let mut sizes = Vec::with_capacity(self.rows.len());

        for row in &self.rows {
            let height = match *row {
                HistoryRow::Sentinel(_) => SENTINEL_ROW_HEIGHT,
                HistoryRow::Message(index) => {
                    let Some(message) = messages.get(index) else {
                        continue;
                    };
                    let entry =
                        self.size_cache
                            .entry(message.message_id)
                            .or_insert_with(|| SizeCacheEntry {
                                height: estimate_message_height(
                                    message,
                                    message.is_outgoing(self.current_uid),
                                    content_width,
                                ),
                                measured: false,
                            });
                    if !entry.measured {
                        entry.height = estimate_message_height(
                            message,
                            message.is_outgoing(self.current_uid),
                            content_width,
                        );
                    }
                    active_ids.insert(message.message_id);
                    entry.height
                }
            };
            sizes.push(size(px(0.), height));
        }

        self.size_cache.retain(|id, _| active_ids.contains(id));
        self.item_sizes = Rc::new(sizes);
    }

    fn measure_visible_rows(
        &mut self,
        visible_range: Range<usize>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let available_space = size(
            AvailableSpace::Definite(content_width),
            AvailableSpace::MinContent,
        );
        let mut updated = false;

        for index in visible_range {
            let Some(HistoryRow::Message(message_index)) = self.rows.get(index).copied() else {
                continue;
            };
            let Some(message) = self.pager.messages().get(message_index).cloned() else {
                continue;
            };

            let mut row = render_message_row(&message, message.is_outgoing(self.current_uid), cx);
            let measured_height = row.layout_as_root(available_space, window, cx).height;
            let Some(entry) = self.size_cache.get_mut(&message.message_id) else {
                continue;
            };
            if !entry.measured || pixels_changed(entry.height, measured_height) {
                entry.height = measured_height;
                updated = true;
            }
            entry.measured = true;
        }

        if updated {
            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn render_row(&self, index: usize, cx: &mut Context<Self>) -> Option<AnyElement> {
        match *self.rows.get(index)? {
            HistoryRow::Sentinel(view) => Some(self.render_sentinel(view, cx)),
            HistoryRow::Message(message_index) => {
                let message = self.pager.messages().get(message_index)?;
                Some(render_message_row(
                    message,
                    message.is_outgoing(self.current_uid),
                    cx,
                ))
            }
        }
    }

    fn render_sentinel(&self, view: SentinelView, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let row = h_flex()
            .w_full()
            .h(SENTINEL_ROW_HEIGHT)
            .gap_2()
            .items_center()
            .justify_center();

        match view {
            SentinelView::Error(key) => row
                .id(ElementId::Name(key.to_string().into()))
                .child(
                    Label::new("Couldn't load older messages")
                        .text_xs()
                        .text_color(theme.danger),
                )
                .child(
                    Button::new("retry-older")
                        .ghost()
                        .small()
                        .child("Retry")
                        .on_click(cx.listener(|this, _, _, cx| this.retry(cx))),
                )
                .into_any_element(),
            SentinelView::Watching(key) => row
                .id(ElementId::Name(key.to_string().into()))
                .child(
                    Label::new("Loading older messages...")
                        .text_xs()
                        .text_color(theme.muted_foreground),
                )
                .into_any_element(),
            SentinelView::Loading | SentinelView::Hidden => row
                .id("history-sentinel")
                .child(
                    Label::new("Loading older messages...")
                        .text_xs()
                        .text_color(theme.muted_foreground),
                )
                .into_any_element(),
        }
    }

    fn render_placeholder(
        &self,
        message: impl Into<SharedString>,
        cx: &mut Context<Self>,
    ) -> AnyElement {
        let theme = cx.theme();

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .child(
                Label::new(message.into())
                    .text_sm()
                    .text_color(theme.foreground.opacity(0.55)),
            )
            .into_any_element()
    }

    fn render_initial_error(&self, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let details = self
            .pager
            .last_error()
            .map(|error| error.to_string())
            .unwrap_or_default();

        v_flex()
            .size_full()
            .gap_2()
            .items_center()
            .justify_center()
            .child(
                Label::new("Couldn't load this conversation")
                    .text_sm()
                    .text_color(theme.danger),
            )
            .child(
                Label::new(details)
                    .text_xs()
                    .text_color(theme.muted_foreground),
            )
            .child(
                Button::new("retry-initial")
                    .small()
                    .primary()
                    .child("Retry")
                    .on_click(cx.listener(|this, _, _, cx| this.retry(cx))),
            )
            .into_any_element()
    }

    fn render_history(&self, cx: &mut Context<Self>) -> AnyElement {
        if self.rows.is_empty() {
            return self.render_placeholder("No messages yet", cx);
        }

        v_virtual_list(
            cx.entity().clone(),
            "conversation-history",
            self.item_sizes.clone(),
            |this, visible_range, window, cx| {
                // Measure only visible rows so long histories keep O(visible) layout work.
                this.update_content_width(cx);
                this.measure_visible_rows(visible_range.clone(), window, cx);
                this.report_sentinel(&visible_range, cx);
                visible_range
                    .filter_map(|index| this.render_row(index, cx))
                    .collect::<Vec<_>>()
            },
        )
        .size_full()
        .px_4()
        .py_3()
        .gap_4()
        .track_scroll(self.scroll_manager.handle())
        .into_any_element()
    }
}

impl Render for ConversationView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        self.update_content_width(cx);
        self.settle_anchor(window);

        let content = if let Some(error) = self.source_error.clone() {
            self.render_placeholder(format!("History source unavailable: {error}"), cx)
        } else {
            match self.pager.view_state() {
                ViewState::Idle => self.render_placeholder("Select a conversation", cx),
                ViewState::LoadingInitial => self.render_placeholder("Loading messages...", cx),
                ViewState::InitialError => self.render_initial_error(cx),
                ViewState::Ready { .. } => self.render_history(cx),
            }
        };

        v_flex().size_full().min_h_0().child(content)
    }
}
