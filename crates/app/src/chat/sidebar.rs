use std::rc::Rc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable, VirtualListScrollHandle,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    list::ListItem,
    v_flex, v_virtual_list,
};
use missive_history::{ConversationIdentity, ConversationSummary};

use crate::chat::events::ConversationSelected;
use crate::chat::message_row::format_dateline;
use crate::settings::HistorySource;

const SUMMARY_ROW_HEIGHT: f32 = 56.0;

/// Conversation list fed by the `chat_list` the history endpoint returns.
///
/// Rows keep server order; the search box filters by username and preview.
pub struct ConversationSidebar {
    search_input: Entity<InputState>,
    conversations: Vec<ConversationSummary>,
    /// Indices into `conversations` that pass the current search.
    visible: Rc<Vec<usize>>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    active: Option<ConversationIdentity>,
    source: HistorySource,
    scroll_handle: VirtualListScrollHandle,
}

impl EventEmitter<ConversationSelected> for ConversationSidebar {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebarSourceToggled;

impl EventEmitter<SidebarSourceToggled> for ConversationSidebar {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebarToggleClicked;

impl EventEmitter<SidebarToggleClicked> for ConversationSidebar {}

impl ConversationSidebar {
    pub fn new(source: HistorySource, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let search_input = cx.new(|cx| InputState::new(window, cx).placeholder("Search"));

        cx.subscribe_in(
            &search_input,
            window,
            |this, _, _event: &InputEvent, _window, cx| {
                this.refilter(cx);
                cx.notify();
            },
        )
        .detach();

        Self {
            search_input,
            conversations: Vec::new(),
            visible: Rc::new(Vec::new()),
            item_sizes: Rc::new(Vec::new()),
            active: None,
            source,
            scroll_handle: VirtualListScrollHandle::new(),
        }
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn active(&self) -> Option<ConversationIdentity> {
        self.active
    }

    /// Replaces the list; an unchanged list leaves the view untouched.
    pub fn set_conversations(
        &mut self,
        conversations: Vec<ConversationSummary>,
        cx: &mut Context<Self>,
    ) {
        if self.conversations == conversations {
            return;
        }

        self.conversations = conversations;
        self.refilter(cx);
        cx.notify();
    }

    /// Highlights the open conversation without emitting a selection.
    pub fn set_active(&mut self, identity: Option<ConversationIdentity>, cx: &mut Context<Self>) {
        if self.active != identity {
            self.active = identity;
            cx.notify();
        }
    }

    pub fn set_source(&mut self, source: HistorySource, cx: &mut Context<Self>) {
        if self.source != source {
            self.source = source;
            cx.notify();
        }
    }

    pub fn select_conversation(&mut self, identity: ConversationIdentity, cx: &mut Context<Self>) {
        self.active = Some(identity);
        cx.emit(ConversationSelected { identity });
        cx.notify();
    }

    fn refilter(&mut self, cx: &App) {
        let query = self.search_input.read(cx).value().to_string();
        let visible = filter_conversations(&self.conversations, &query);
        self.item_sizes = Rc::new(
            visible
                .iter()
                .map(|_| size(px(0.), px(SUMMARY_ROW_HEIGHT)))
                .collect(),
        );
        self.visible = Rc::new(visible);
    }

    fn render_header(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let unread = unread_count(&self.conversations);

        v_flex()
            .w_full()
            .gap_2()
            .px_3()
            .pt_2()
            .pb_2()
            .child(
                h_flex()
                    .justify_between()
                    .items_center()
                    .child(Label::new("Conversations").text_sm())
                    .when(unread > 0, |header| {
                        header.child(
                            Label::new(format!("{unread} unread"))
                                .text_xs()
                                .text_color(theme.primary),
                        )
                    }),
            )
            .child(Input::new(&self.search_input).w_full().small())
    }

    fn render_list(&self, cx: &mut Context<Self>) -> AnyElement {
        if self.visible.is_empty() {
            let theme = cx.theme();
            let message = if self.conversations.is_empty() {
                "Open a conversation to load the list"
            } else {
                "Nothing matches"
            };
            return v_flex()
                .flex_1()
                .items_center()
                .justify_center()
                .px_4()
                .child(
                    Label::new(message)
                        .text_sm()
                        .text_color(theme.muted_foreground),
                )
                .into_any_element();
        }

        let visible = self.visible.clone();

        v_virtual_list(
            cx.entity().clone(),
            "conversation-list",
            self.item_sizes.clone(),
            move |this, range, _window, cx| {
                range
                    .filter_map(|row| {
                        let summary = this.conversations.get(*visible.get(row)?)?;
                        let selected = this.active.is_some_and(|active| summary.matches(&active));
                        Some(render_summary_row(row, summary, selected, cx))
                    })
                    .collect::<Vec<_>>()
            },
        )
        .w_full()
        .flex_1()
        .track_scroll(&self.scroll_handle)
        .into_any_element()
    }

    fn render_footer(&self, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        h_flex()
            .w_full()
            .items_center()
            .justify_between()
            .px_3()
            .py_2()
            .border_t_1()
            .border_color(theme.border)
            .child(
                Button::new("sidebar-source")
                    .ghost()
                    .small()
                    .child(format!("Source: {}", self.source.label()))
                    .on_click(cx.listener(|_, _, _, cx| cx.emit(SidebarSourceToggled))),
            )
            .child(
                Button::new("sidebar-hide")
                    .ghost()
                    .small()
                    .icon(IconName::PanelLeftClose)
                    .on_click(cx.listener(|_, _, _, cx| cx.emit(SidebarToggleClicked))),
            )
    }
}

impl Render for ConversationSidebar {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        v_flex()
            .size_full()
            .min_w_0()
            .overflow_hidden()
            .bg(cx.theme().background)
            .child(self.render_header(cx))
            .child(self.render_list(cx))
            .child(self.render_footer(cx))
    }
}

fn render_summary_row(
    row: usize,
    summary: &ConversationSummary,
    selected: bool,
    cx: &mut Context<ConversationSidebar>,
) -> AnyElement {
    let theme = cx.theme();
    let identity = summary.identity();

    let title = h_flex()
        .w_full()
        .gap_2()
        .items_center()
        .child(
            div()
                .flex_1()
                .min_w_0()
                .truncate()
                .child(Label::new(summary.to_username.clone()).text_sm()),
        )
        .child(
            Label::new(format_dateline(summary.last_dateline))
                .text_xs()
                .text_color(theme.muted_foreground),
        )
        .when(summary.unread, |title| {
            title.child(div().size(px(8.)).rounded_full().bg(theme.primary))
        });

    let preview = div().w_full().truncate().child(
        Label::new(summary.last_message.clone())
            .text_xs()
            .text_color(theme.muted_foreground),
    );

    div()
        .w_full()
        .h(px(SUMMARY_ROW_HEIGHT))
        .px_2()
        .py_1()
        .child(
            ListItem::new(("conversation", row))
                .w_full()
                .h_full()
                .px_3()
                .rounded_md()
                .selected(selected)
                .on_click(cx.listener(move |this, _: &ClickEvent, _, cx| {
                    this.select_conversation(identity, cx);
                }))
                .child(v_flex().w_full().min_w_0().child(title).child(preview)),
        )
        .into_any_element()
}

/// Indices of the summaries matching `query`, in server order.
fn filter_conversations(conversations: &[ConversationSummary], query: &str) -> Vec<usize> {
    let needle = query.trim().to_lowercase();

    conversations
        .iter()
        .enumerate()
        .filter(|(_, summary)| {
            needle.is_empty()
                || summary.to_username.to_lowercase().contains(&needle)
                || summary.last_message.to_lowercase().contains(&needle)
        })
        .map(|(index, _)| index)
        .collect()
}

fn unread_count(conversations: &[ConversationSummary]) -> usize {
    conversations.iter().filter(|summary| summary.unread).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(conversation_id: u64, username: &str, unread: bool) -> ConversationSummary {
        ConversationSummary {
            conversation_id,
            to_uid: conversation_id + 100,
            to_username: username.to_string(),
            last_message: format!("last words from {username}"),
            last_dateline: 1_700_000_000,
            unread,
        }
    }

    #[test]
    fn empty_search_keeps_server_order() {
        let conversations = vec![
            summary(9, "zoe", false),
            summary(2, "amy", false),
            summary(5, "bob", false),
        ];

        assert_eq!(filter_conversations(&conversations, "   "), vec![0, 1, 2]);
    }

    #[test]
    fn search_matches_username_or_preview_case_insensitively() {
        let conversations = vec![summary(1, "Alice", false), summary(2, "bob", false)];

        assert_eq!(filter_conversations(&conversations, "  ALI "), vec![0]);
        assert_eq!(filter_conversations(&conversations, "words from bob"), vec![1]);
        assert!(filter_conversations(&conversations, "zed").is_empty());
    }

    #[test]
    fn counts_unread_conversations() {
        let conversations = vec![
            summary(1, "alice", true),
            summary(2, "bob", false),
            summary(3, "carol", true),
        ];

        assert_eq!(unread_count(&conversations), 2);
        assert_eq!(unread_count(&[]), 0);
    }
}
