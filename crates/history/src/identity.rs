use std::fmt;

/// Identifies which message thread is displayed.
///
/// Callers are expected to set exactly one field: `chat_id` opens an existing thread,
/// `uid` opens (or starts) the thread with that user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConversationIdentity {
    pub chat_id: Option<u64>,
    pub uid: Option<u64>,
}

impl ConversationIdentity {
    pub const fn new(chat_id: Option<u64>, uid: Option<u64>) -> Self {
        Self { chat_id, uid }
    }

    pub const fn chat(chat_id: u64) -> Self {
        Self::new(Some(chat_id), None)
    }

    pub const fn user(uid: u64) -> Self {
        Self::new(None, Some(uid))
    }

    /// Builds an identity from raw route parameters.
    ///
    /// Parsing is lenient: a missing parameter, or one without a leading integer, maps to `None`.
    pub fn from_route(chat_id: Option<&str>, uid: Option<&str>) -> Self {
        Self::new(parse_route_param(chat_id), parse_route_param(uid))
    }

    /// Returns true when no thread is addressed; empty identities are never fetched.
    pub fn is_empty(&self) -> bool {
        self.chat_id.is_none() && self.uid.is_none()
    }
}

impl fmt::Display for ConversationIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.chat_id, self.uid) {
            (Some(chat_id), None) => write!(formatter, "chat/{chat_id}"),
            (None, Some(uid)) => write!(formatter, "user/{uid}"),
            (Some(chat_id), Some(uid)) => write!(formatter, "chat/{chat_id}+user/{uid}"),
            (None, None) => write!(formatter, "none"),
        }
    }
}

fn parse_route_param(raw: Option<&str>) -> Option<u64> {
    let trimmed = raw?.trim_start();
    let digits_end = trimmed
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..digits_end].parse().ok()
}

/// Fetch epoch bound to one resolved identity.
///
/// Every in-flight fetch carries the generation current at issue time; responses carrying
/// any other value are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub const ZERO: Self = Self(0);

    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "g{}", self.0)
    }
}

/// Outcome of feeding route inputs to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Unchanged,
    Changed {
        identity: ConversationIdentity,
        generation: Generation,
    },
}

/// Detects conversation switches and mints a new generation for each one.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    current: Option<ConversationIdentity>,
    generation: Generation,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<ConversationIdentity> {
        self.current
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn resolve(&mut self, identity: ConversationIdentity) -> Resolution {
        if self.current == Some(identity) {
            return Resolution::Unchanged;
        }

        self.current = Some(identity);
        self.generation = self.generation.next();
        tracing::debug!(%identity, generation = %self.generation, "conversation identity changed");

        Resolution::Changed {
            identity,
            generation: self.generation,
        }
    }

    /// Forgets the current identity and mints a generation nobody holds.
    pub fn invalidate(&mut self) -> Generation {
        self.current = None;
        self.generation = self.generation.next();
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_params_parse_leading_integers() {
        assert_eq!(
            ConversationIdentity::from_route(Some("12"), None),
            ConversationIdentity::chat(12)
        );
        assert_eq!(
            ConversationIdentity::from_route(None, Some(" 34abc")),
            ConversationIdentity::user(34)
        );
        assert!(ConversationIdentity::from_route(Some("abc"), Some("")).is_empty());
        assert!(ConversationIdentity::from_route(Some("-3"), None).is_empty());
    }

    #[test]
    fn unchanged_identity_keeps_generation() {
        let mut resolver = IdentityResolver::new();
        let first = resolver.resolve(ConversationIdentity::chat(5));
        let generation = resolver.generation();

        assert!(matches!(first, Resolution::Changed { .. }));
        assert_eq!(
            resolver.resolve(ConversationIdentity::chat(5)),
            Resolution::Unchanged
        );
        assert_eq!(resolver.generation(), generation);
    }

    #[test]
    fn any_field_change_mints_generation() {
        let mut resolver = IdentityResolver::new();
        resolver.resolve(ConversationIdentity::chat(5));
        let before = resolver.generation();

        let changed = resolver.resolve(ConversationIdentity::new(Some(5), Some(9)));

        assert_ne!(resolver.generation(), before);
        assert_eq!(
            changed,
            Resolution::Changed {
                identity: ConversationIdentity::new(Some(5), Some(9)),
                generation: resolver.generation(),
            }
        );
    }

    #[test]
    fn invalidate_forgets_identity() {
        let mut resolver = IdentityResolver::new();
        resolver.resolve(ConversationIdentity::chat(5));
        let before = resolver.generation();

        let minted = resolver.invalidate();

        assert_ne!(minted, before);
        assert_eq!(resolver.current(), None);
        assert!(matches!(
            resolver.resolve(ConversationIdentity::chat(5)),
            Resolution::Changed { .. }
        ));
    }
}
