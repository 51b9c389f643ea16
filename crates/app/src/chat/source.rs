use std::path::Path;
use std::sync::Arc;

use missive_client::{ClientError, HttpHistoryFetcher};
use missive_history::HistoryFetcher;
use missive_storage::{ArchivingFetcher, SqliteArchive, StorageError};
use snafu::{ResultExt, Snafu};

use crate::settings::{HistorySource, ViewerSettings};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SourceError {
    #[snafu(display("failed to build the history client on `{stage}`: {source}"))]
    Client {
        stage: &'static str,
        source: ClientError,
    },
    #[snafu(display("failed to open the message archive on `{stage}`: {source}"))]
    Archive {
        stage: &'static str,
        source: StorageError,
    },
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Builds the fetcher the settings describe.
///
/// Needs a tokio runtime: opening the archive connects and migrates it.
pub async fn open_history_source(
    settings: Arc<ViewerSettings>,
) -> SourceResult<Arc<dyn HistoryFetcher>> {
    match settings.source {
        HistorySource::Remote => {
            let remote = HttpHistoryFetcher::new(settings.client_config()).context(ClientSnafu {
                stage: "open-remote-source",
            })?;
            tracing::info!(url = remote.history_url(), "using remote history source");

            match &settings.archive_path {
                Some(path) => {
                    let archive = open_archive(path, settings.archive_page_size).await?;
                    Ok(Arc::new(ArchivingFetcher::new(remote, archive)))
                }
                None => Ok(Arc::new(remote)),
            }
        }
        HistorySource::Archive => {
            let archive =
                open_archive(&settings.archive_location(), settings.archive_page_size).await?;
            Ok(Arc::new(archive))
        }
    }
}

async fn open_archive(path: &Path, page_size: u64) -> SourceResult<SqliteArchive> {
    SqliteArchive::open(&path.to_string_lossy())
        .await
        .context(ArchiveSnafu {
            stage: "open-archive",
        })?
        .with_page_size(page_size)
        .context(ArchiveSnafu {
            stage: "configure-archive-page-size",
        })
}

#[cfg(test)]
mod tests {
    use missive_history::{ConversationIdentity, FetchQuery};

    use super::*;

    #[tokio::test]
    async fn archive_source_serves_an_empty_archive() {
        let directory = tempfile::tempdir().expect("create temp dir");
        let settings = ViewerSettings {
            source: HistorySource::Archive,
            archive_path: Some(directory.path().join("archive.sqlite3")),
            ..ViewerSettings::default()
        };

        let fetcher = open_history_source(Arc::new(settings))
            .await
            .expect("open archive source");
        let page = fetcher
            .fetch(&FetchQuery::initial(ConversationIdentity::chat(1), false))
            .await
            .expect("fetch from empty archive");

        assert_eq!(fetcher.id(), missive_storage::ARCHIVE_FETCHER_ID);
        assert!(page.rows.is_empty());
        assert!(page.is_last_page());
    }

    #[tokio::test]
    async fn remote_source_without_archive_is_plain_http() {
        let fetcher = open_history_source(Arc::new(ViewerSettings::default()))
            .await
            .expect("open remote source");

        assert_eq!(fetcher.id(), missive_client::HTTP_FETCHER_ID);
    }

    #[tokio::test]
    async fn remote_source_rejects_non_http_endpoints() {
        let settings = ViewerSettings {
            endpoint: "ftp://chat.example.test".to_string(),
            ..ViewerSettings::default()
        };

        let error = match open_history_source(Arc::new(settings)).await {
            Ok(_) => panic!("ftp endpoint accepted"),
            Err(error) => error,
        };

        assert!(matches!(error, SourceError::Client { .. }));
    }
}
