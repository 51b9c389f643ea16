use gpui::*;
use gpui_component::{ActiveTheme, v_flex};
use missive_history::ConversationIdentity;

use crate::chat::events::{ConversationSelected, HistoryLoaded};
use crate::chat::{ConversationSidebar, ConversationView, SidebarSourceToggled, SidebarToggleClicked};
use crate::settings::{SettingsChanged, SettingsState};

/// Parent coordinator for the sidebar, the history view and settings.
pub struct ChatView {
    sidebar: Entity<ConversationSidebar>,
    conversation: Entity<ConversationView>,
    settings_state: Entity<SettingsState>,
}

impl EventEmitter<SidebarToggleClicked> for ChatView {}

impl ChatView {
    pub fn new(
        initial: Option<ConversationIdentity>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let settings_state = SettingsState::new(cx);
        let settings = settings_state.read(cx).settings();
        let source = settings.source;
        let sidebar = cx.new(|cx| ConversationSidebar::new(source, window, cx));
        let conversation = cx.new(|cx| ConversationView::new(settings, cx));

        cx.subscribe(&sidebar, |this, _, event: &ConversationSelected, cx| {
            this.open_conversation(event.identity, cx);
        })
        .detach();

        cx.subscribe(&sidebar, |this, _, _event: &SidebarSourceToggled, cx| {
            this.toggle_source(cx);
        })
        .detach();

        cx.subscribe(&sidebar, |_, _, _event: &SidebarToggleClicked, cx| {
            cx.emit(SidebarToggleClicked);
        })
        .detach();

        cx.subscribe(&conversation, |this, _, event: &HistoryLoaded, cx| {
            this.handle_history_loaded(event, cx);
        })
        .detach();

        cx.subscribe(&settings_state, |this, _, event: &SettingsChanged, cx| {
            this.handle_settings_changed(event, cx);
        })
        .detach();

        let mut this = Self {
            sidebar,
            conversation,
            settings_state,
        };

        if let Some(identity) = initial {
            this.open_conversation(identity, cx);
        }

        this
    }

    pub fn sidebar(&self) -> &Entity<ConversationSidebar> {
        &self.sidebar
    }

    pub fn conversation(&self) -> &Entity<ConversationView> {
        &self.conversation
    }

    pub fn settings_state(&self) -> &Entity<SettingsState> {
        &self.settings_state
    }

    pub fn open_conversation(&mut self, identity: ConversationIdentity, cx: &mut Context<Self>) {
        self.conversation
            .update(cx, |conversation, cx| conversation.open(identity, cx));
        self.sidebar
            .update(cx, |sidebar, cx| sidebar.set_active(Some(identity), cx));
        cx.notify();
    }

    pub fn reload_history(&mut self, cx: &mut Context<Self>) {
        self.conversation
            .update(cx, |conversation, cx| conversation.reload(cx));
    }

    pub fn toggle_source(&mut self, cx: &mut Context<Self>) {
        let result = self
            .settings_state
            .update(cx, |settings, cx| settings.toggle_source(cx));
        if let Err(error) = result {
            tracing::error!("failed to switch history source: {}", error);
        }
    }

    fn handle_history_loaded(&mut self, event: &HistoryLoaded, cx: &mut Context<Self>) {
        let identity = event.identity;
        let sidebar_list = event.sidebar_list.clone();

        self.sidebar.update(cx, |sidebar, cx| {
            if let Some(list) = sidebar_list {
                sidebar.set_conversations(list, cx);
            }
            sidebar.set_active(identity, cx);
        });
        cx.notify();
    }

    fn handle_settings_changed(&mut self, event: &SettingsChanged, cx: &mut Context<Self>) {
        event.settings.apply_theme(None, cx);
        cx.refresh_windows();

        let settings = event.settings.clone();
        let source = settings.source;
        self.sidebar
            .update(cx, |sidebar, cx| sidebar.set_source(source, cx));
        self.conversation
            .update(cx, |conversation, cx| conversation.set_source(settings, cx));

        tracing::info!(source = source.label(), "reloaded history source with new settings");
        cx.notify();
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                div()
                    .id("chat-view-history")
                    .flex_1()
                    .min_h_0()
                    .child(self.conversation.clone()),
            )
    }
}
