use missive_history::ConversationIdentity;

/// Parses a conversation route such as `chat/5` or `user/7`.
///
/// Ids are parsed leniently; a route naming an unknown kind yields `None`.
pub fn parse_route(raw: &str) -> Option<ConversationIdentity> {
    let (kind, id) = raw.trim().trim_start_matches('/').split_once('/')?;

    match kind {
        "chat" => Some(ConversationIdentity::from_route(Some(id), None)),
        "user" => Some(ConversationIdentity::from_route(None, Some(id))),
        _ => None,
    }
}
