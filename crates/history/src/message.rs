use std::fmt;

use crate::identity::ConversationIdentity;

/// Server-assigned message identifier, unique within one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// One private message as delivered by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: MessageId,
    pub author_id: u64,
    pub author: String,
    pub text: String,
    /// Unix seconds.
    pub dateline: i64,
}

impl Message {
    pub fn new(
        message_id: MessageId,
        author_id: u64,
        author: impl Into<String>,
        text: impl Into<String>,
        dateline: i64,
    ) -> Self {
        Self {
            message_id,
            author_id,
            author: author.into(),
            text: text.into(),
            dateline,
        }
    }

    /// Returns true when the message was written by `current_uid`.
    ///
    /// Rendering uses this to pick the bubble side; it has no effect on paging.
    pub fn is_outgoing(&self, current_uid: Option<u64>) -> bool {
        current_uid.is_some_and(|uid| uid == self.author_id)
    }
}

/// Sidebar entry describing one conversation of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conversation_id: u64,
    pub to_uid: u64,
    pub to_username: String,
    pub last_message: String,
    pub last_dateline: i64,
    pub unread: bool,
}

impl ConversationSummary {
    /// Returns true when this entry is the thread addressed by `identity`.
    pub fn matches(&self, identity: &ConversationIdentity) -> bool {
        identity.chat_id == Some(self.conversation_id) || identity.uid == Some(self.to_uid)
    }

    /// Identity that opens this conversation by its thread id.
    pub fn identity(&self) -> ConversationIdentity {
        ConversationIdentity::chat(self.conversation_id)
    }
}

/// One page of history as returned by a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageResult {
    /// Newest first, in server order.
    pub rows: Vec<Message>,
    pub sidebar_list: Option<Vec<ConversationSummary>>,
    pub total: u64,
    pub page_size: u64,
}

impl PageResult {
    /// Mirrors the server's end-of-history rule: the whole remaining history fits in one page.
    pub fn is_last_page(&self) -> bool {
        self.total <= self.page_size
    }
}
