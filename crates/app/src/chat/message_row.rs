use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{ActiveTheme, label::Label, v_flex};
use missive_history::{Message, SentinelView, ViewState};

pub const DEFAULT_CONTENT_WIDTH: Pixels = px(680.);
pub const LIST_HORIZONTAL_PADDING: Pixels = px(16.);
pub const SENTINEL_ROW_HEIGHT: Pixels = px(36.);
const BUBBLE_MAX_WIDTH: Pixels = px(540.);
const BUBBLE_PADDING_X: Pixels = px(14.);
const BUBBLE_PADDING_Y: Pixels = px(10.);
const AUTHOR_LABEL_HEIGHT: Pixels = px(16.);
const ROW_GAP: Pixels = px(4.);
const DATELINE_HEIGHT: Pixels = px(14.);
const ESTIMATED_TEXT_LINE_HEIGHT: Pixels = px(18.);
const ESTIMATED_CHAR_WIDTH: f32 = 7.0;

/// One row of the history list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRow {
    /// Loading/error indicator above the oldest message.
    Sentinel(SentinelView),
    /// Index into the pager's messages.
    Message(usize),
}

/// Rows for `state`; the sentinel, when shown, is always row zero.
pub fn history_rows(state: ViewState, message_count: usize) -> Vec<HistoryRow> {
    let ViewState::Ready { sentinel } = state else {
        return Vec::new();
    };

    let mut rows = Vec::with_capacity(message_count + 1);
    if sentinel != SentinelView::Hidden {
        rows.push(HistoryRow::Sentinel(sentinel));
    }
    rows.extend((0..message_count).map(HistoryRow::Message));
    rows
}

pub fn estimate_message_height(message: &Message, outgoing: bool, content_width: Pixels) -> Pixels {
    let bubble_width = min_pixels(content_width, BUBBLE_MAX_WIDTH);
    let text_width = max_pixels(px(1.), bubble_width - BUBBLE_PADDING_X * 2);
    let bubble_height = estimate_text_height(&message.text, text_width) + BUBBLE_PADDING_Y * 2;
    let author_height = if outgoing {
        Pixels::ZERO
    } else {
        AUTHOR_LABEL_HEIGHT + ROW_GAP
    };

    author_height + bubble_height + ROW_GAP + DATELINE_HEIGHT
}

fn estimate_text_height(content: &str, width: Pixels) -> Pixels {
    if content.is_empty() {
        return ESTIMATED_TEXT_LINE_HEIGHT;
    }

    let chars_per_line = (f32::from(width) / ESTIMATED_CHAR_WIDTH).floor().max(1.0) as usize;

    let mut line_count = 0usize;
    for line in content.lines() {
        let char_count = line.chars().count().max(1);
        line_count += char_count.div_ceil(chars_per_line);
    }

    if content.ends_with('\n') {
        line_count += 1;
    }

    ESTIMATED_TEXT_LINE_HEIGHT * line_count.max(1)
}

/// Renders a message bubble; outgoing messages sit on the right without an author label.
pub fn render_message_row(message: &Message, outgoing: bool, cx: &App) -> AnyElement {
    let theme = cx.theme();
    let text = if message.text.is_empty() {
        " ".to_string()
    } else {
        message.text.clone()
    };
    let (bubble_bg, bubble_fg) = if outgoing {
        (theme.accent, theme.accent_foreground)
    } else {
        (theme.muted, theme.foreground)
    };

    v_flex()
        .w_full()
        .gap_1()
        .map(|column| {
            if outgoing {
                column.items_end()
            } else {
                column.items_start()
            }
        })
        .when(!outgoing, |column| {
            column.child(
                Label::new(message.author.clone())
                    .text_xs()
                    .text_color(theme.muted_foreground),
            )
        })
        .child(
            div()
                .max_w(BUBBLE_MAX_WIDTH)
                .px(BUBBLE_PADDING_X)
                .py(BUBBLE_PADDING_Y)
                .rounded_lg()
                .bg(bubble_bg)
                .text_color(bubble_fg)
                .child(Label::new(text).text_sm()),
        )
        .child(
            Label::new(format_dateline(message.dateline))
                .text_xs()
                .text_color(theme.foreground.opacity(0.5)),
        )
        .into_any_element()
}

/// Formats unix seconds as `YYYY-MM-DD HH:MM` in UTC.
pub fn format_dateline(dateline: i64) -> String {
    let days = dateline.div_euclid(86_400);
    let seconds_of_day = dateline.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);

    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}",
        seconds_of_day / 3_600,
        seconds_of_day % 3_600 / 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let shifted = days + 719_468;
    let era = shifted.div_euclid(146_097);
    let day_of_era = shifted.rem_euclid(146_097);
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_index = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * month_index + 2) / 5 + 1) as u32;
    let month = if month_index < 10 {
        month_index + 3
    } else {
        month_index - 9
    } as u32;
    let year = year_of_era + era * 400 + i64::from(month <= 2);

    (year, month, day)
}

pub fn max_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) >= f32::from(b) { a } else { b }
}

fn min_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) <= f32::from(b) { a } else { b }
}

pub fn pixels_changed(a: Pixels, b: Pixels) -> bool {
    (f32::from(a) - f32::from(b)).abs() > 0.5
}
