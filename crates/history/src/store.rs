use std::collections::HashSet;

use crate::message::{Message, MessageId};
use crate::query::{Cursor, QueryKind};

/// Counts produced by one merge, reported to logs and callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Loaded messages of the current conversation, oldest at the head.
///
/// Entries are unique by `message_id` and keep arrival order: initial pages replace the
/// content, older pages are prepended.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, message_id: MessageId) -> bool {
        self.ids.contains(&message_id)
    }

    pub fn oldest(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn newest(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Cursor for the next older page; `None` until something has been merged.
    pub fn cursor(&self) -> Option<Cursor> {
        self.oldest().map(Cursor::of)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    pub fn merge(&mut self, kind: QueryKind, rows: Vec<Message>) -> MergeReport {
        match kind {
            QueryKind::Initial => self.replace_with_page(rows),
            QueryKind::Older => self.prepend_page(rows),
        }
    }

    /// Replaces the whole content with a newest-first page.
    pub fn replace_with_page(&mut self, rows: Vec<Message>) -> MergeReport {
        self.clear();
        let (fresh, duplicates) = self.take_unseen_oldest_first(rows);
        let inserted = fresh.len();
        self.messages = fresh;

        MergeReport {
            inserted,
            duplicates,
        }
    }

    /// Prepends a newest-first page of older history, dropping rows already loaded.
    pub fn prepend_page(&mut self, rows: Vec<Message>) -> MergeReport {
        let (fresh, duplicates) = self.take_unseen_oldest_first(rows);
        let inserted = fresh.len();
        self.messages.splice(0..0, fresh);

        MergeReport {
            inserted,
            duplicates,
        }
    }

    fn take_unseen_oldest_first(&mut self, rows: Vec<Message>) -> (Vec<Message>, usize) {
        let mut duplicates = 0;
        let mut fresh = Vec::with_capacity(rows.len());

        for message in rows.into_iter().rev() {
            // Overlapping pages are expected when rows share a dateline with the cursor.
            if self.ids.insert(message.message_id) {
                fresh.push(message);
            } else {
                duplicates += 1;
            }
        }

        (fresh, duplicates)
    }
}
