use crate::anchor::{AnchorMode, ScrollSurface, ViewportAnchor};
use crate::fetch::{FetchError, FetchOutcome};
use crate::identity::{ConversationIdentity, Generation, IdentityResolver, Resolution};
use crate::message::{ConversationSummary, Message};
use crate::query::{FetchQuery, FetchTicket, QueryKind};
use crate::store::{MergeReport, MessageStore};
use crate::trigger::{LazyLoadTrigger, SentinelKey, TriggerState, VisibilitySource};

/// What happened to a settled fetch handed to [`HistoryPager::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Issued under another generation, or no longer awaited. Nothing was touched.
    Discarded,
    Merged(MergeReport),
    Failed,
}

/// Top-of-list indicator shown above the oldest loaded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelView {
    /// End of history: nothing to show.
    Hidden,
    /// An older page is on its way; not observed.
    Loading,
    /// Placeholder observed for visibility.
    Watching(SentinelKey),
    /// Last older-page fetch failed; still observed so scrolling retries it.
    Error(SentinelKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// No conversation addressed.
    Idle,
    LoadingInitial,
    /// The initial page failed; shown in place of the message list.
    InitialError,
    Ready { sentinel: SentinelView },
}

#[derive(Debug, Clone)]
struct FailedFetch {
    query: FetchQuery,
    error: FetchError,
}

/// Paged message history for the conversation currently on screen.
///
/// The pager is driven from one event loop. It hands out [`FetchTicket`]s, the caller runs
/// them (see [`crate::run_ticket`]) and feeds the outcomes back through [`Self::apply`].
/// After the merged rows are committed to the view, [`Self::settle_viewport`] positions
/// the scroll container.
#[derive(Debug, Default)]
pub struct HistoryPager {
    resolver: IdentityResolver,
    store: MessageStore,
    sidebar_list: Option<Vec<ConversationSummary>>,
    end_of_history: bool,
    anchor: ViewportAnchor,
    trigger: LazyLoadTrigger,
    last_merged: Option<FetchQuery>,
    in_flight: Option<FetchTicket>,
    failed: Option<FailedFetch>,
}

impl HistoryPager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the sidebar cache, typically with the conversation list the caller already has.
    pub fn with_sidebar_list(mut self, sidebar_list: Vec<ConversationSummary>) -> Self {
        self.sidebar_list = Some(sidebar_list);
        self
    }

    pub fn identity(&self) -> Option<ConversationIdentity> {
        self.resolver.current()
    }

    pub fn generation(&self) -> Generation {
        self.resolver.generation()
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn sidebar_list(&self) -> Option<&[ConversationSummary]> {
        self.sidebar_list.as_deref()
    }

    pub fn is_end_of_history(&self) -> bool {
        self.end_of_history
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_loading_initial(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|ticket| ticket.query.kind() == QueryKind::Initial)
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.failed.as_ref().map(|failed| &failed.error)
    }

    pub fn trigger_state(&self) -> TriggerState {
        self.trigger.state()
    }

    /// Returns true while merged rows still wait for [`Self::settle_viewport`].
    pub fn has_pending_anchor(&self) -> bool {
        self.anchor.pending().is_some()
    }

    pub fn view_state(&self) -> ViewState {
        if self.identity().is_none_or(|identity| identity.is_empty()) {
            return ViewState::Idle;
        }
        if self.is_loading_initial() {
            return ViewState::LoadingInitial;
        }
        if self.last_merged.is_none() {
            return if self.failed.is_some() {
                ViewState::InitialError
            } else {
                ViewState::LoadingInitial
            };
        }

        let sentinel = if self.end_of_history {
            SentinelView::Hidden
        } else if self.in_flight.is_some() {
            SentinelView::Loading
        } else {
            match (self.trigger.sentinel(), self.failed.is_some()) {
                (Some(key), true) => SentinelView::Error(key),
                (Some(key), false) => SentinelView::Watching(key),
                (None, _) => SentinelView::Loading,
            }
        };

        ViewState::Ready { sentinel }
    }

    /// Resolves route inputs to an identity.
    ///
    /// A changed identity resets every piece of per-conversation state and mints a new
    /// generation before the initial query is built; the returned ticket is that query.
    /// An unchanged identity returns `None` and touches nothing.
    pub fn resolve(
        &mut self,
        chat_id: Option<u64>,
        uid: Option<u64>,
        source: &mut dyn VisibilitySource,
    ) -> Option<FetchTicket> {
        let identity = ConversationIdentity::new(chat_id, uid);
        let Resolution::Changed {
            identity,
            generation,
        } = self.resolver.resolve(identity)
        else {
            return None;
        };

        self.reset_conversation(source);
        if identity.is_empty() {
            return None;
        }

        let query = FetchQuery::initial(identity, self.wants_sidebar_list());
        Some(self.issue(generation, query))
    }

    /// Handles the sentinel becoming visible; returns the older-page ticket when it fires.
    pub fn sentinel_visible(
        &mut self,
        key: SentinelKey,
        source: &mut dyn VisibilitySource,
    ) -> Option<FetchTicket> {
        if self.in_flight.is_some() || !self.trigger.fire(key, source) {
            return None;
        }

        let (Some(previous), Some(cursor)) = (self.last_merged.as_ref(), self.store.cursor())
        else {
            // The trigger is only armed over a merged, non-empty store.
            self.rearm(source);
            return None;
        };

        let query = FetchQuery::older(previous, cursor);
        self.failed = None;
        Some(self.issue(self.resolver.generation(), query))
    }

    /// Re-issues the last failed query of the current conversation on user request.
    pub fn retry(&mut self, source: &mut dyn VisibilitySource) -> Option<FetchTicket> {
        if self.in_flight.is_some() {
            return None;
        }

        let failed = self.failed.take()?;
        match failed.query.kind() {
            QueryKind::Initial => self.trigger.suppress(source),
            QueryKind::Older => self.trigger.disarm(source),
        }
        Some(self.issue(self.resolver.generation(), failed.query))
    }

    /// Applies a settled fetch.
    ///
    /// `surface` is read, never written: the extent before the merge is recorded so that
    /// [`Self::settle_viewport`] can compensate once the new rows are laid out.
    pub fn apply(
        &mut self,
        outcome: FetchOutcome,
        surface: &dyn ScrollSurface,
        source: &mut dyn VisibilitySource,
    ) -> ApplyOutcome {
        let current = self.resolver.generation();
        if outcome.generation != current {
            tracing::debug!(
                stale = %outcome.generation,
                %current,
                page = outcome.query.page,
                "discarding response from previous conversation"
            );
            return ApplyOutcome::Discarded;
        }

        match self.in_flight.take() {
            Some(ticket) if ticket.query == outcome.query => {}
            awaited => {
                self.in_flight = awaited;
                tracing::debug!(page = outcome.query.page, "discarding response nobody awaits");
                return ApplyOutcome::Discarded;
            }
        }

        let FetchOutcome { query, result, .. } = outcome;
        match result {
            Ok(page) => {
                let kind = query.kind();
                self.anchor.prepare(AnchorMode::from(kind), surface);

                let end_of_history = page.is_last_page();
                if let Some(sidebar_list) = page.sidebar_list {
                    self.sidebar_list = Some(sidebar_list);
                }
                let report = self.store.merge(kind, page.rows);
                self.end_of_history = end_of_history;
                self.failed = None;

                tracing::debug!(
                    generation = %current,
                    page = query.page,
                    inserted = report.inserted,
                    duplicates = report.duplicates,
                    loaded = self.store.len(),
                    end_of_history,
                    "merged history page"
                );

                self.last_merged = Some(query);
                self.rearm(source);
                ApplyOutcome::Merged(report)
            }
            Err(error) => {
                tracing::warn!(generation = %current, page = query.page, %error, "history page failed");
                self.failed = Some(FailedFetch { query, error });
                self.rearm(source);
                ApplyOutcome::Failed
            }
        }
    }

    /// Positions the viewport after merged rows were committed to the rendered view.
    ///
    /// Returns true when an adjustment was applied.
    pub fn settle_viewport(&mut self, surface: &mut dyn ScrollSurface) -> bool {
        self.anchor.settle(surface).is_some()
    }

    /// Tears the conversation down, as when the view unmounts.
    ///
    /// Responses still in flight belong to a generation nobody holds and will be discarded.
    pub fn close(&mut self, source: &mut dyn VisibilitySource) {
        let generation = self.resolver.invalidate();
        self.reset_conversation(source);
        self.sidebar_list = None;
        tracing::debug!(%generation, "history pager closed");
    }

    fn reset_conversation(&mut self, source: &mut dyn VisibilitySource) {
        self.store.clear();
        self.end_of_history = false;
        self.anchor.reset();
        self.trigger.suppress(source);
        self.last_merged = None;
        self.in_flight = None;
        self.failed = None;
    }

    fn issue(&mut self, generation: Generation, query: FetchQuery) -> FetchTicket {
        let ticket = FetchTicket { generation, query };
        tracing::debug!(
            %generation,
            identity = %ticket.query.identity(),
            page = ticket.query.page,
            kind = ?ticket.query.kind(),
            want_sidebar_list = ticket.query.want_sidebar_list,
            "issuing history fetch"
        );
        self.in_flight = Some(ticket.clone());
        ticket
    }

    /// An empty cached list is requested again.
    fn wants_sidebar_list(&self) -> bool {
        self.sidebar_list.as_ref().is_none_or(Vec::is_empty)
    }

    fn rearm(&mut self, source: &mut dyn VisibilitySource) {
        let key = match &self.last_merged {
            Some(query)
                if !self.end_of_history
                    && !self.store.is_empty()
                    && !self.is_loading_initial() =>
            {
                SentinelKey {
                    generation: self.resolver.generation(),
                    page: query.page,
                }
            }
            _ => {
                self.trigger.suppress(source);
                return;
            }
        };

        self.trigger.arm(key, source);
    }
}
