//! Bidirectional, cursor-paged message history for one conversation at a time.
//!
//! [`HistoryPager`] ties the pieces together: it resolves the addressed conversation,
//! derives fetch queries, merges pages into the [`MessageStore`], anchors the viewport and
//! drives the one-shot [`LazyLoadTrigger`]. Fetching itself is behind [`HistoryFetcher`].

#![deny(unsafe_code)]

pub mod anchor;
pub mod fetch;
pub mod identity;
pub mod message;
pub mod pager;
pub mod query;
pub mod store;
pub mod trigger;

pub use anchor::{AnchorMode, AnchorState, ScrollSurface, ViewportAnchor};
pub use fetch::{BoxFuture, FetchError, FetchOutcome, FetchResult, HistoryFetcher, run_ticket};
pub use identity::{ConversationIdentity, Generation, IdentityResolver, Resolution};
pub use message::{ConversationSummary, Message, MessageId, PageResult};
pub use pager::{ApplyOutcome, HistoryPager, SentinelView, ViewState};
pub use query::{Cursor, FetchQuery, FetchTicket, INITIAL_PAGE, QueryKind};
pub use store::{MergeReport, MessageStore};
pub use trigger::{LazyLoadTrigger, SentinelKey, TriggerState, VisibilitySource};
