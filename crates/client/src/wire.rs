//! JSON shapes of the forum's `messages/chat` endpoint.

use missive_history::{ConversationSummary, Message, MessageId, PageResult};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct WirePage {
    #[serde(default)]
    rows: Vec<WireMessage>,
    #[serde(default)]
    chat_list: Option<Vec<WireConversation>>,
    total: u64,
    page_size: u64,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    message_id: u64,
    author_id: u64,
    #[serde(default)]
    author: String,
    #[serde(rename = "message")]
    text: String,
    dateline: i64,
}

#[derive(Debug, Deserialize)]
struct WireConversation {
    conversation_id: u64,
    to_uid: u64,
    #[serde(default)]
    to_username: String,
    #[serde(default)]
    last_message: String,
    #[serde(default)]
    last_dateline: i64,
    #[serde(default, deserialize_with = "flag")]
    unread: bool,
}

/// The forum reports flags either as booleans or as `0`/`1`.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
    })
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Message::new(
            MessageId::new(wire.message_id),
            wire.author_id,
            wire.author,
            wire.text,
            wire.dateline,
        )
    }
}

impl From<WireConversation> for ConversationSummary {
    fn from(wire: WireConversation) -> Self {
        ConversationSummary {
            conversation_id: wire.conversation_id,
            to_uid: wire.to_uid,
            to_username: wire.to_username,
            last_message: wire.last_message,
            last_dateline: wire.last_dateline,
            unread: wire.unread,
        }
    }
}

impl From<WirePage> for PageResult {
    fn from(wire: WirePage) -> Self {
        PageResult {
            rows: wire.rows.into_iter().map(Message::from).collect(),
            sidebar_list: wire
                .chat_list
                .map(|list| list.into_iter().map(ConversationSummary::from).collect()),
            total: wire.total,
            page_size: wire.page_size,
        }
    }
}
