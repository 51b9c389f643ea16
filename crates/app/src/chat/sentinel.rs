use std::ops::Range;

use missive_history::{SentinelKey, VisibilitySource};

/// Row index of the "loading older" sentinel; it always precedes the messages.
pub const SENTINEL_ROW: usize = 0;

/// Visibility source backed by the virtual list's visible range.
///
/// A sentinel is reported when its row enters the visible range. Re-subscribing the key that
/// was already reported, as after a failed page, does not report again until the row has
/// left the visible range and come back. A new key is reported even if the row never left.
#[derive(Debug, Default)]
pub struct SentinelWatch {
    watched: Option<SentinelKey>,
    /// Last key reported while the sentinel row stayed in view.
    reported: Option<SentinelKey>,
}

impl SentinelWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watched(&self) -> Option<SentinelKey> {
        self.watched
    }

    /// Returns the watched sentinel when its row entered the visible range.
    pub fn report(&mut self, visible_rows: &Range<usize>) -> Option<SentinelKey> {
        if !visible_rows.contains(&SENTINEL_ROW) {
            self.reported = None;
            return None;
        }

        let key = self.watched?;
        if self.reported == Some(key) {
            return None;
        }
        self.reported = Some(key);
        Some(key)
    }
}

impl VisibilitySource for SentinelWatch {
    fn subscribe(&mut self, key: SentinelKey) {
        self.watched = Some(key);
    }

    fn unsubscribe(&mut self, key: SentinelKey) {
        if self.watched == Some(key) {
            self.watched = None;
        }
    }
}
