use missive_history::{ConversationIdentity, ConversationSummary};

/// Emitted when sidebar selection changes the open conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationSelected {
    pub identity: ConversationIdentity,
}

/// Emitted after a page is merged into the open conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLoaded {
    pub identity: Option<ConversationIdentity>,
    /// Cached conversation list, once the server has sent one.
    pub sidebar_list: Option<Vec<ConversationSummary>>,
}
