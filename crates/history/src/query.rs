//! Derivation of fetch requests from identity and store state.
//!
//! Everything here is pure: building a query never touches the store or the network.

use crate::identity::{ConversationIdentity, Generation};
use crate::message::{Message, MessageId};

/// Page number carried by every initial load.
pub const INITIAL_PAGE: u32 = 1;

/// Position of the oldest loaded message; older pages start strictly before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    pub dateline: i64,
    pub message_id: MessageId,
}

impl Cursor {
    pub fn of(message: &Message) -> Self {
        Self {
            dateline: message.dateline,
            message_id: message.message_id,
        }
    }

    /// Returns true when `message` sorts strictly before this cursor.
    pub fn is_after(&self, message: &Message) -> bool {
        (message.dateline, message.message_id) < (self.dateline, self.message_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Initial,
    Older,
}

/// One request for a page of history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchQuery {
    pub chat_id: Option<u64>,
    pub uid: Option<u64>,
    pub want_sidebar_list: bool,
    pub newer: bool,
    pub cursor: Option<Cursor>,
    pub page: u32,
}

impl FetchQuery {
    /// Newest-first load of a freshly resolved conversation.
    pub fn initial(identity: ConversationIdentity, want_sidebar_list: bool) -> Self {
        Self {
            chat_id: identity.chat_id,
            uid: identity.uid,
            want_sidebar_list,
            newer: false,
            cursor: None,
            page: INITIAL_PAGE,
        }
    }

    /// Next older page after `previous`, starting before `oldest`.
    ///
    /// A cursor only exists for a non-empty store, so an older query can never be built
    /// before the first page has been merged.
    pub fn older(previous: &FetchQuery, oldest: Cursor) -> Self {
        Self {
            chat_id: previous.chat_id,
            uid: previous.uid,
            want_sidebar_list: false,
            newer: false,
            cursor: Some(oldest),
            page: previous.page.saturating_add(1),
        }
    }

    pub fn kind(&self) -> QueryKind {
        if self.page == INITIAL_PAGE && self.cursor.is_none() {
            QueryKind::Initial
        } else {
            QueryKind::Older
        }
    }

    pub fn identity(&self) -> ConversationIdentity {
        ConversationIdentity::new(self.chat_id, self.uid)
    }
}

/// A query bound to the generation that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: Generation,
    pub query: FetchQuery,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_query_has_no_cursor() {
        let query = FetchQuery::initial(ConversationIdentity::chat(5), true);

        assert_eq!(query.kind(), QueryKind::Initial);
        assert_eq!(query.page, INITIAL_PAGE);
        assert!(query.want_sidebar_list);
        assert!(!query.newer);
        assert_eq!(query.identity(), ConversationIdentity::chat(5));
    }

    #[test]
    fn older_query_uses_oldest_message_and_drops_sidebar() {
        let initial = FetchQuery::initial(ConversationIdentity::user(9), true);
        let oldest = Message::new(MessageId::new(41), 9, "bob", "first", 1_000);

        let older = FetchQuery::older(&initial, Cursor::of(&oldest));

        assert_eq!(older.kind(), QueryKind::Older);
        assert_eq!(
            older.cursor,
            Some(Cursor {
                dateline: 1_000,
                message_id: MessageId::new(41),
            })
        );
        assert!(!older.want_sidebar_list);
        assert_eq!(older.page, 2);
        assert_eq!(older.identity(), ConversationIdentity::user(9));

        let next = FetchQuery::older(&older, Cursor::of(&oldest));
        assert_eq!(next.page, 3);
    }

    #[test]
    fn cursor_orders_by_dateline_then_id() {
        let cursor = Cursor {
            dateline: 100,
            message_id: MessageId::new(10),
        };

        assert!(cursor.is_after(&Message::new(MessageId::new(11), 1, "a", "", 99)));
        assert!(cursor.is_after(&Message::new(MessageId::new(9), 1, "a", "", 100)));
        assert!(!cursor.is_after(&Message::new(MessageId::new(10), 1, "a", "", 100)));
        assert!(!cursor.is_after(&Message::new(MessageId::new(1), 1, "a", "", 101)));
    }
}
