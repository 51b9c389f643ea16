//! Local SQLite archive of private-message history.

pub mod archiving;
pub mod error;
pub mod sqlite;

pub use archiving::ArchivingFetcher;
pub use error::{StorageError, StorageResult};
pub use sqlite::{ARCHIVE_FETCHER_ID, DEFAULT_ARCHIVE_PAGE_SIZE, RecordReport, SqliteArchive};
