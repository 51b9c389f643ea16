#![deny(unsafe_code)]

/// Window shell: sidebar, conversation area and toolbars.
pub mod app;
/// Conversation list and paged history view.
pub mod chat;
pub mod route;
/// Settings persistence.
pub mod settings;
