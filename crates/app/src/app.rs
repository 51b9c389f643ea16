use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::notification::NotificationList;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};
use missive_history::{ConversationIdentity, HistoryPager, ViewState};

use crate::chat::{ChatView, SidebarToggleClicked};

pub const SIDEBAR_WIDTH: f32 = 280.0;
/// Room for the macOS traffic lights drawn over the transparent titlebar.
#[cfg(target_os = "macos")]
const TITLE_BAR_LEADING_INSET: f32 = 78.0;
#[cfg(not(target_os = "macos"))]
const TITLE_BAR_LEADING_INSET: f32 = 12.0;

gpui::actions!(shell, [ToggleSidebar, ReloadHistory, Quit]);

/// One-line summary of the open conversation for the title bar.
pub fn history_status(pager: &HistoryPager) -> Option<String> {
    let loaded = pager.messages().len();
    match pager.view_state() {
        ViewState::Idle | ViewState::InitialError => None,
        ViewState::LoadingInitial => Some("Loading...".to_string()),
        ViewState::Ready { .. } if pager.is_loading() => {
            Some(format!("{loaded} messages, loading older..."))
        }
        ViewState::Ready { .. } if pager.is_end_of_history() => {
            Some(format!("{loaded} messages, all loaded"))
        }
        ViewState::Ready { .. } => Some(format!("{loaded} messages")),
    }
}

/// Window root: the conversation sidebar beside the history view, under a title bar.
pub struct MissiveShell {
    notification_list: Entity<NotificationList>,
    chat_view: Entity<ChatView>,
    sidebar_visible: bool,
}

impl MissiveShell {
    pub fn new(
        initial: Option<ConversationIdentity>,
        notification_list: Entity<NotificationList>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let chat_view = cx.new(|cx| ChatView::new(initial, window, cx));

        cx.subscribe(&chat_view, |this, _, _: &SidebarToggleClicked, cx| {
            this.toggle_sidebar(cx);
        })
        .detach();

        Self {
            notification_list,
            chat_view,
            sidebar_visible: true,
        }
    }

    fn toggle_sidebar(&mut self, cx: &mut Context<Self>) {
        self.sidebar_visible = !self.sidebar_visible;
        cx.notify();
    }

    fn reload_history(&mut self, cx: &mut Context<Self>) {
        self.chat_view
            .update(cx, |chat_view, cx| chat_view.reload_history(cx));
    }

    fn render_title_bar(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let conversation = self.chat_view.read(cx).conversation().read(cx);
        let title = conversation
            .title()
            .unwrap_or_else(|| SharedString::from("Missive"));
        let status = history_status(conversation.pager());

        h_flex()
            .id("title-bar")
            .window_control_area(WindowControlArea::Drag)
            .w_full()
            .h(px(38.))
            .flex_shrink_0()
            .pl(px(TITLE_BAR_LEADING_INSET))
            .pr_3()
            .gap_3()
            .items_center()
            .border_b_1()
            .border_color(theme.border)
            .when(!self.sidebar_visible, |bar| {
                bar.child(
                    Button::new("show-sidebar")
                        .ghost()
                        .small()
                        .icon(IconName::PanelLeftOpen)
                        .on_click(cx.listener(|this, _, _, cx| this.toggle_sidebar(cx))),
                )
            })
            .child(
                div()
                    .flex_1()
                    .min_w_0()
                    .truncate()
                    .text_sm()
                    .child(title),
            )
            .when_some(status, |bar, status| {
                bar.child(
                    Label::new(status)
                        .text_xs()
                        .text_color(theme.muted_foreground),
                )
            })
            .child(
                Button::new("reload-history")
                    .ghost()
                    .small()
                    .child("Reload")
                    .on_click(cx.listener(|this, _, _, cx| this.reload_history(cx))),
            )
    }
}

impl Render for MissiveShell {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let sidebar = self.chat_view.read(cx).sidebar().clone();

        v_flex()
            .size_full()
            .bg(theme.background)
            .on_action(cx.listener(|this, _: &ToggleSidebar, _, cx| this.toggle_sidebar(cx)))
            .on_action(cx.listener(|this, _: &ReloadHistory, _, cx| this.reload_history(cx)))
            .child(self.render_title_bar(cx))
            .child(
                h_flex()
                    .flex_1()
                    .min_h_0()
                    .overflow_hidden()
                    .when(self.sidebar_visible, |body| {
                        body.child(
                            div()
                                .h_full()
                                .w(px(SIDEBAR_WIDTH))
                                .flex_shrink_0()
                                .border_r_1()
                                .border_color(theme.border)
                                .child(sidebar),
                        )
                    })
                    .child(
                        div()
                            .flex_1()
                            .h_full()
                            .min_w_0()
                            .child(self.chat_view.clone()),
                    ),
            )
            .child(self.notification_list.clone())
    }
}
