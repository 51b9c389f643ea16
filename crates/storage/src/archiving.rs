use missive_history::{BoxFuture, FetchQuery, FetchResult, HistoryFetcher, PageResult};

use crate::sqlite::SqliteArchive;

/// Passes fetches through to `upstream` and keeps a copy of every page it returns.
pub struct ArchivingFetcher<F> {
    upstream: F,
    archive: SqliteArchive,
}

impl<F> ArchivingFetcher<F> {
    pub fn new(upstream: F, archive: SqliteArchive) -> Self {
        Self { upstream, archive }
    }

    pub fn archive(&self) -> &SqliteArchive {
        &self.archive
    }
}

impl<F: HistoryFetcher> HistoryFetcher for ArchivingFetcher<F> {
    fn id(&self) -> &str {
        self.upstream.id()
    }

    fn fetch<'a>(&'a self, query: &'a FetchQuery) -> BoxFuture<'a, FetchResult<PageResult>> {
        Box::pin(async move {
            let page = self.upstream.fetch(query).await?;
            let identity = query.identity();
            // The archive is a convenience copy; losing a page must not fail the view.
            if let Err(error) = self.archive.record_page(identity, &page).await {
                tracing::warn!(%identity, page = query.page, %error, "failed to archive history page");
            }
            Ok(page)
        })
    }
}

#[cfg(test)]
mod tests {
    use missive_history::{ConversationIdentity, FetchError, Message, MessageId};

    use super::*;

    struct StaticFetcher(FetchResult<PageResult>);

    impl HistoryFetcher for StaticFetcher {
        fn id(&self) -> &str {
            "static"
        }

        fn fetch<'a>(&'a self, _query: &'a FetchQuery) -> BoxFuture<'a, FetchResult<PageResult>> {
            Box::pin(async move { self.0.clone() })
        }
    }

    fn two_rows() -> PageResult {
        PageResult {
            rows: vec![
                Message::new(MessageId::new(2), 1, "kim", "second", 120),
                Message::new(MessageId::new(1), 2, "lee", "first", 60),
            ],
            sidebar_list: None,
            total: 2,
            page_size: 10,
        }
    }

    #[tokio::test]
    async fn successful_pages_land_in_archive() {
        let archive = SqliteArchive::open(":memory:").await.expect("open");
        let fetcher = ArchivingFetcher::new(StaticFetcher(Ok(two_rows())), archive);
        let query = FetchQuery::initial(ConversationIdentity::chat(4), false);

        let page = fetcher.fetch(&query).await.expect("upstream page");

        assert_eq!(page, two_rows());
        assert_eq!(fetcher.id(), "static");
        let archived = fetcher.archive().fetch_page(&query).await.expect("archived");
        assert_eq!(archived.rows, two_rows().rows);
    }

    #[tokio::test]
    async fn archive_failure_does_not_fail_fetch() {
        let archive = SqliteArchive::open(":memory:").await.expect("open");
        let fetcher = ArchivingFetcher::new(StaticFetcher(Ok(two_rows())), archive);
        // No summary maps this uid to a conversation, so recording fails.
        let query = FetchQuery::initial(ConversationIdentity::user(77), false);

        assert_eq!(fetcher.fetch(&query).await, Ok(two_rows()));
    }

    #[tokio::test]
    async fn upstream_errors_pass_through() {
        let archive = SqliteArchive::open(":memory:").await.expect("open");
        let failure = FetchError::Network {
            stage: "test",
            details: "offline".to_string(),
        };
        let fetcher = ArchivingFetcher::new(StaticFetcher(Err(failure.clone())), archive);

        let result = fetcher
            .fetch(&FetchQuery::initial(ConversationIdentity::chat(4), false))
            .await;

        assert_eq!(result, Err(failure));
    }
}
