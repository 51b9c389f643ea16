/// Paged history of one conversation.
pub mod conversation;
/// Event contracts for chat module wiring.
pub mod events;
pub mod message_row;
pub mod scroll_manager;
pub mod sentinel;
pub mod sidebar;
pub mod source;
pub mod view;
pub mod viewport_sync;

pub use conversation::ConversationView;
pub use events::{ConversationSelected, HistoryLoaded};
pub use scroll_manager::ScrollManager;
pub use sentinel::SentinelWatch;
pub use sidebar::{ConversationSidebar, SidebarSourceToggled, SidebarToggleClicked};
pub use source::{SourceError, open_history_source};
pub use view::ChatView;
pub use viewport_sync::{AnchorFrame, ViewportSync};
