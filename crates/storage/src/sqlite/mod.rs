use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use missive_history::{
    BoxFuture, ConversationIdentity, ConversationSummary, FetchError, FetchQuery, FetchResult,
    HistoryFetcher, Message, MessageId, PageResult,
};
use snafu::{OptionExt, ResultExt, ensure};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::error::{
    CreateSqliteDirectorySnafu, InvariantViolationSnafu, SqliteConnectOptionsSnafu,
    SqliteConnectSnafu, SqliteMigrateSnafu, SqlitePragmaSnafu, SqliteQuerySnafu, StorageError,
    StorageResult, UnknownConversationSnafu,
};

pub const ARCHIVE_FETCHER_ID: &str = "archive";
pub const DEFAULT_ARCHIVE_PAGE_SIZE: u64 = 20;

/// Counts written by one [`SqliteArchive::record_page`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordReport {
    pub messages: u64,
    pub summaries: u64,
}

/// Local SQLite copy of fetched history, served back with the forum's paging rules.
#[derive(Debug, Clone)]
pub struct SqliteArchive {
    pool: SqlitePool,
    database_url: String,
    page_size: u64,
}

impl SqliteArchive {
    pub async fn open(database_location: &str) -> StorageResult<Self> {
        ensure_database_directory(database_location)?;

        let database_url = normalize_database_url(database_location);
        let connect_options = SqliteConnectOptions::from_str(&database_url)
            .context(SqliteConnectOptionsSnafu {
                stage: "sqlite-open-parse-url",
                database_url: database_url.clone(),
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5_000));

        // One long-lived connection: an in-memory database lives exactly as long as it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await
            .context(SqliteConnectSnafu {
                stage: "sqlite-open-connect",
                database_url: database_url.clone(),
            })?;

        let _: String = sqlx::query_scalar("PRAGMA journal_mode = WAL;")
            .fetch_one(&pool)
            .await
            .context(SqlitePragmaSnafu {
                stage: "sqlite-open-pragma-journal-mode",
                pragma: "journal_mode",
            })?;
        sqlx::query("PRAGMA busy_timeout = 5000;")
            .execute(&pool)
            .await
            .context(SqlitePragmaSnafu {
                stage: "sqlite-open-pragma-busy-timeout",
                pragma: "busy_timeout",
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context(SqliteMigrateSnafu {
                stage: "sqlite-open-migrate",
            })?;

        tracing::info!(%database_url, "message archive opened");
        Ok(Self {
            pool,
            database_url,
            page_size: DEFAULT_ARCHIVE_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: u64) -> StorageResult<Self> {
        ensure!(
            page_size > 0,
            InvariantViolationSnafu {
                stage: "archive-page-size",
                details: "archive page size must be positive".to_string(),
            }
        );
        self.page_size = page_size;
        Ok(self)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Stores a fetched page for `identity`.
    ///
    /// Sidebar summaries are written first so that a `uid`-addressed page can be placed in
    /// the conversation the same response just described.
    pub async fn record_page(
        &self,
        identity: ConversationIdentity,
        page: &PageResult,
    ) -> StorageResult<RecordReport> {
        let mut tx = self.pool.begin().await.context(SqliteQuerySnafu {
            stage: "record-page-begin",
        })?;
        let mut report = RecordReport::default();

        for summary in page.sidebar_list.iter().flatten() {
            sqlx::query(
                "INSERT INTO conversations (conversation_id, to_uid, to_username, last_message, last_dateline, unread) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (conversation_id) DO UPDATE SET \
                 to_uid = excluded.to_uid, to_username = excluded.to_username, \
                 last_message = excluded.last_message, last_dateline = excluded.last_dateline, \
                 unread = excluded.unread",
            )
            .bind(u64_to_i64(summary.conversation_id, "record-summary-id")?)
            .bind(u64_to_i64(summary.to_uid, "record-summary-to-uid")?)
            .bind(&summary.to_username)
            .bind(&summary.last_message)
            .bind(summary.last_dateline)
            .bind(summary.unread)
            .execute(&mut *tx)
            .await
            .context(SqliteQuerySnafu {
                stage: "record-page-upsert-summary",
            })?;
            report.summaries += 1;
        }

        if !page.rows.is_empty() {
            let conversation_id = resolve_conversation(&mut *tx, identity)
                .await?
                .context(UnknownConversationSnafu {
                    stage: "record-page-resolve",
                    identity,
                })?;

            for message in &page.rows {
                let written = sqlx::query(
                    "INSERT INTO messages (conversation_id, message_id, author_id, author, body, dateline) \
                     VALUES (?, ?, ?, ?, ?, ?) \
                     ON CONFLICT (conversation_id, message_id) DO UPDATE SET \
                     author_id = excluded.author_id, author = excluded.author, \
                     body = excluded.body, dateline = excluded.dateline",
                )
                .bind(conversation_id)
                .bind(u64_to_i64(message.message_id.0, "record-message-id")?)
                .bind(u64_to_i64(message.author_id, "record-message-author-id")?)
                .bind(&message.author)
                .bind(&message.text)
                .bind(message.dateline)
                .execute(&mut *tx)
                .await
                .context(SqliteQuerySnafu {
                    stage: "record-page-upsert-message",
                })?;
                report.messages += written.rows_affected();
            }
        }

        tx.commit().await.context(SqliteQuerySnafu {
            stage: "record-page-commit",
        })?;

        tracing::debug!(
            %identity,
            messages = report.messages,
            summaries = report.summaries,
            "recorded history page"
        );
        Ok(report)
    }

    /// Archived conversations, most recently active first.
    pub async fn conversation_summaries(&self) -> StorageResult<Vec<ConversationSummary>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            "SELECT conversation_id, to_uid, to_username, last_message, last_dateline, unread \
             FROM conversations ORDER BY last_dateline DESC, conversation_id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context(SqliteQuerySnafu {
            stage: "conversation-summaries",
        })?;

        rows.into_iter().map(conversation_row_to_summary).collect()
    }

    /// Serves `query` from the archive.
    ///
    /// Rows are strictly older than the cursor by `(dateline, message_id)`, newest first.
    /// `total` counts every archived row the query could still reach, so a page that
    /// exhausts the archive reports `total <= page_size`.
    pub async fn fetch_page(&self, query: &FetchQuery) -> StorageResult<PageResult> {
        let sidebar_list = if query.want_sidebar_list {
            Some(self.conversation_summaries().await?)
        } else {
            None
        };

        let mut connection = self.pool.acquire().await.context(SqliteQuerySnafu {
            stage: "fetch-page-acquire",
        })?;
        let Some(conversation_id) = resolve_conversation(&mut *connection, query.identity()).await?
        else {
            return Ok(PageResult {
                rows: Vec::new(),
                sidebar_list,
                total: 0,
                page_size: self.page_size,
            });
        };

        // Without a cursor every row qualifies; i64::MAX sorts after any stored row.
        let (dateline, message_id) = match query.cursor {
            Some(cursor) => (
                cursor.dateline,
                u64_to_i64(cursor.message_id.0, "fetch-page-cursor")?,
            ),
            None => (i64::MAX, i64::MAX),
        };

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ? \
             AND (dateline < ? OR (dateline = ? AND message_id < ?))",
        )
        .bind(conversation_id)
        .bind(dateline)
        .bind(dateline)
        .bind(message_id)
        .fetch_one(&mut *connection)
        .await
        .context(SqliteQuerySnafu {
            stage: "fetch-page-count",
        })?;

        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT message_id, author_id, author, body, dateline FROM messages \
             WHERE conversation_id = ? AND (dateline < ? OR (dateline = ? AND message_id < ?)) \
             ORDER BY dateline DESC, message_id DESC LIMIT ?",
        )
        .bind(conversation_id)
        .bind(dateline)
        .bind(dateline)
        .bind(message_id)
        .bind(u64_to_i64(self.page_size, "fetch-page-limit")?)
        .fetch_all(&mut *connection)
        .await
        .context(SqliteQuerySnafu {
            stage: "fetch-page-rows",
        })?;

        Ok(PageResult {
            rows: rows
                .into_iter()
                .map(message_row_to_message)
                .collect::<StorageResult<_>>()?,
            sidebar_list,
            total: i64_to_u64(total, "fetch-page-total")?,
            page_size: self.page_size,
        })
    }
}

impl HistoryFetcher for SqliteArchive {
    fn id(&self) -> &str {
        ARCHIVE_FETCHER_ID
    }

    fn fetch<'a>(&'a self, query: &'a FetchQuery) -> BoxFuture<'a, FetchResult<PageResult>> {
        Box::pin(async move { self.fetch_page(query).await.map_err(FetchError::from) })
    }
}

#[derive(Debug, FromRow)]
struct ConversationRow {
    conversation_id: i64,
    to_uid: i64,
    to_username: String,
    last_message: String,
    last_dateline: i64,
    unread: bool,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    message_id: i64,
    author_id: i64,
    author: String,
    body: String,
    dateline: i64,
}

fn conversation_row_to_summary(row: ConversationRow) -> StorageResult<ConversationSummary> {
    Ok(ConversationSummary {
        conversation_id: i64_to_u64(row.conversation_id, "conversation-row-id")?,
        to_uid: i64_to_u64(row.to_uid, "conversation-row-to-uid")?,
        to_username: row.to_username,
        last_message: row.last_message,
        last_dateline: row.last_dateline,
        unread: row.unread,
    })
}

fn message_row_to_message(row: MessageRow) -> StorageResult<Message> {
    Ok(Message::new(
        MessageId::new(i64_to_u64(row.message_id, "message-row-id")?),
        i64_to_u64(row.author_id, "message-row-author-id")?,
        row.author,
        row.body,
        row.dateline,
    ))
}

/// Maps an identity to an archived conversation id: `chat_id` directly, `uid` through the
/// recorded conversation list.
async fn resolve_conversation(
    connection: &mut SqliteConnection,
    identity: ConversationIdentity,
) -> StorageResult<Option<i64>> {
    if let Some(chat_id) = identity.chat_id {
        return u64_to_i64(chat_id, "resolve-conversation-chat-id").map(Some);
    }
    let Some(uid) = identity.uid else {
        return Ok(None);
    };

    sqlx::query_scalar(
        "SELECT conversation_id FROM conversations WHERE to_uid = ? \
         ORDER BY last_dateline DESC LIMIT 1",
    )
    .bind(u64_to_i64(uid, "resolve-conversation-uid")?)
    .fetch_optional(&mut *connection)
    .await
    .context(SqliteQuerySnafu {
        stage: "resolve-conversation-by-uid",
    })
}

fn i64_to_u64(value: i64, stage: &'static str) -> StorageResult<u64> {
    value
        .try_into()
        .map_err(|_| StorageError::InvariantViolation {
            stage,
            details: format!("negative sqlite integer '{value}' cannot map to u64"),
        })
}

fn u64_to_i64(value: u64, stage: &'static str) -> StorageResult<i64> {
    value
        .try_into()
        .map_err(|_| StorageError::InvariantViolation {
            stage,
            details: format!("u64 '{value}' cannot map to sqlite i64"),
        })
}

fn ensure_database_directory(database_location: &str) -> StorageResult<()> {
    if database_location.starts_with("sqlite:") || database_location == ":memory:" {
        return Ok(());
    }

    let path = Path::new(database_location);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(CreateSqliteDirectorySnafu {
            stage: "sqlite-open-create-directory",
            path: parent.display().to_string(),
        })?;
    }

    Ok(())
}

fn normalize_database_url(database_location: &str) -> String {
    if database_location.starts_with("sqlite:") {
        return database_location.to_string();
    }

    if database_location == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    format!("sqlite://{database_location}")
}

#[cfg(test)]
mod tests {
    use missive_history::{
        Cursor, HistoryPager, ScrollSurface, SentinelKey, SentinelView, ViewState,
        VisibilitySource, run_ticket,
    };

    use super::*;

    fn message(id: u64, dateline: i64) -> Message {
        Message::new(MessageId::new(id), id % 2, "author", format!("m{id}"), dateline)
    }

    fn summary(conversation_id: u64, to_uid: u64, last_dateline: i64) -> ConversationSummary {
        ConversationSummary {
            conversation_id,
            to_uid,
            to_username: format!("user-{to_uid}"),
            last_message: String::new(),
            last_dateline,
            unread: false,
        }
    }

    /// Newest-first page of ids `low..=high`, one minute apart.
    fn page(low: u64, high: u64) -> PageResult {
        PageResult {
            rows: (low..=high).rev().map(|id| message(id, id as i64 * 60)).collect(),
            sidebar_list: None,
            total: 0,
            page_size: 0,
        }
    }

    async fn archive(page_size: u64) -> SqliteArchive {
        SqliteArchive::open(":memory:")
            .await
            .expect("open in-memory archive")
            .with_page_size(page_size)
            .expect("positive page size")
    }

    fn ids(page: &PageResult) -> Vec<u64> {
        page.rows.iter().map(|m| m.message_id.0).collect()
    }

    #[tokio::test]
    async fn initial_page_returns_newest_rows_first() {
        let archive = archive(3).await;
        archive
            .record_page(ConversationIdentity::chat(5), &page(1, 7))
            .await
            .expect("record");

        let result = archive
            .fetch_page(&FetchQuery::initial(ConversationIdentity::chat(5), false))
            .await
            .expect("fetch");

        assert_eq!(ids(&result), vec![7, 6, 5]);
        assert_eq!(result.total, 7);
        assert_eq!(result.page_size, 3);
        assert!(!result.is_last_page());
    }

    #[tokio::test]
    async fn older_page_starts_strictly_before_cursor() {
        let archive = archive(3).await;
        archive
            .record_page(ConversationIdentity::chat(5), &page(1, 7))
            .await
            .expect("record");
        let initial = FetchQuery::initial(ConversationIdentity::chat(5), false);
        let older = FetchQuery::older(&initial, Cursor::of(&message(2, 120)));

        let result = archive.fetch_page(&older).await.expect("fetch");

        assert_eq!(ids(&result), vec![1]);
        assert!(result.is_last_page());
    }

    #[tokio::test]
    async fn rows_sharing_a_dateline_order_by_message_id() {
        let archive = archive(10).await;
        let same_minute = PageResult {
            rows: vec![message(12, 600), message(11, 600), message(10, 600)],
            ..PageResult::default()
        };
        archive
            .record_page(ConversationIdentity::chat(1), &same_minute)
            .await
            .expect("record");
        let initial = FetchQuery::initial(ConversationIdentity::chat(1), false);
        let older = FetchQuery::older(&initial, Cursor::of(&message(11, 600)));

        let result = archive.fetch_page(&older).await.expect("fetch");

        assert_eq!(ids(&result), vec![10]);
    }

    #[tokio::test]
    async fn uid_identity_resolves_through_recorded_summaries() {
        let archive = archive(10).await;
        let mut first = page(1, 4);
        first.sidebar_list = Some(vec![summary(5, 42, 240), summary(6, 43, 100)]);

        let report = archive
            .record_page(ConversationIdentity::user(42), &first)
            .await
            .expect("record");
        assert_eq!(
            report,
            RecordReport {
                messages: 4,
                summaries: 2
            }
        );

        let by_chat = archive
            .fetch_page(&FetchQuery::initial(ConversationIdentity::chat(5), true))
            .await
            .expect("fetch");
        assert_eq!(ids(&by_chat), vec![4, 3, 2, 1]);
        let sidebar = by_chat.sidebar_list.expect("sidebar requested");
        assert_eq!(
            sidebar.iter().map(|s| s.conversation_id).collect::<Vec<_>>(),
            vec![5, 6]
        );
    }

    #[tokio::test]
    async fn unknown_uid_cannot_be_recorded() {
        let archive = archive(10).await;

        let error = archive
            .record_page(ConversationIdentity::user(9), &page(1, 2))
            .await
            .expect_err("no conversation for uid");

        assert!(matches!(error, StorageError::UnknownConversation { .. }));
    }

    #[tokio::test]
    async fn unknown_conversation_serves_empty_last_page() {
        let archive = archive(10).await;

        let result = archive
            .fetch_page(&FetchQuery::initial(ConversationIdentity::user(9), false))
            .await
            .expect("fetch");

        assert!(result.rows.is_empty());
        assert!(result.is_last_page());
    }

    #[tokio::test]
    async fn recording_same_page_twice_keeps_one_copy() {
        let archive = archive(10).await;
        let identity = ConversationIdentity::chat(3);
        archive.record_page(identity, &page(1, 5)).await.expect("record");
        archive.record_page(identity, &page(4, 8)).await.expect("record");

        let result = archive
            .fetch_page(&FetchQuery::initial(identity, false))
            .await
            .expect("fetch");

        assert_eq!(ids(&result), vec![8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn archive_file_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let location = dir.path().join("nested").join("archive.sqlite3");
        let location = location.to_str().expect("utf-8 path");
        {
            let archive = SqliteArchive::open(location).await.expect("open");
            archive
                .record_page(ConversationIdentity::chat(2), &page(1, 3))
                .await
                .expect("record");
            archive.pool().close().await;
        }

        let reopened = SqliteArchive::open(location).await.expect("reopen");
        let result = reopened
            .fetch_page(&FetchQuery::initial(ConversationIdentity::chat(2), false))
            .await
            .expect("fetch");

        assert_eq!(ids(&result), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn zero_page_size_is_rejected() {
        let archive = SqliteArchive::open(":memory:").await.expect("open");

        assert!(archive.with_page_size(0).is_err());
    }

    struct NoVisibility;

    impl VisibilitySource for NoVisibility {
        fn subscribe(&mut self, _key: SentinelKey) {}
        fn unsubscribe(&mut self, _key: SentinelKey) {}
    }

    #[tokio::test]
    async fn pager_pages_through_archive_until_end_of_history() {
        struct Surface(f32);

        impl ScrollSurface for Surface {
            fn content_extent(&self) -> f32 {
                self.0
            }
            fn viewport_extent(&self) -> f32 {
                100.0
            }
            fn offset(&self) -> f32 {
                0.0
            }
            fn set_offset(&mut self, _offset: f32) {}
        }

        let archive = archive(4).await;
        archive
            .record_page(ConversationIdentity::chat(8), &page(1, 10))
            .await
            .expect("record");
        let mut pager = HistoryPager::new();
        let mut visibility = NoVisibility;
        let surface = Surface(0.0);

        let mut ticket = pager.resolve(Some(8), None, &mut visibility);
        while let Some(current) = ticket.take() {
            let outcome = run_ticket(&archive, current).await;
            pager.apply(outcome, &surface, &mut visibility);
            if let ViewState::Ready {
                sentinel: SentinelView::Watching(key),
            } = pager.view_state()
            {
                ticket = pager.sentinel_visible(key, &mut visibility);
            }
        }

        let loaded: Vec<u64> = pager.messages().iter().map(|m| m.message_id.0).collect();
        assert_eq!(loaded, (1..=10).collect::<Vec<_>>());
        assert!(pager.is_end_of_history());
    }
}
