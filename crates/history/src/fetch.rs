use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;

use crate::identity::Generation;
use crate::message::PageResult;
use crate::query::{FetchQuery, FetchTicket};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type FetchResult<T> = Result<T, FetchError>;

/// Failure of one page round trip. Both kinds are shown as the same inline indicator.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    /// Transport failure, including timeouts.
    #[snafu(display("network error on `{stage}`: {details}"))]
    Network {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("server error on `{stage}` (status {status:?}): {details}"))]
    Server {
        stage: &'static str,
        status: Option<u16>,
        details: String,
    },
}

impl FetchError {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Network { stage, .. } | Self::Server { stage, .. } => *stage,
        }
    }
}

/// Performs one request/response round trip for a page of history.
///
/// Implementations must not serve a cached response for a query they have not fetched;
/// pagination cursors rely on fresh server state.
pub trait HistoryFetcher: Send + Sync {
    fn id(&self) -> &str;
    fn fetch<'a>(&'a self, query: &'a FetchQuery) -> BoxFuture<'a, FetchResult<PageResult>>;
}

/// A settled fetch, still tagged with the generation that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub generation: Generation,
    pub query: FetchQuery,
    pub result: FetchResult<PageResult>,
}

/// Awaits the fetch for `ticket`.
///
/// The outcome is not checked against the current generation here; that happens when it
/// is applied, so this can run on any executor.
pub async fn run_ticket(fetcher: &dyn HistoryFetcher, ticket: FetchTicket) -> FetchOutcome {
    let result = fetcher.fetch(&ticket.query).await;
    if let Err(error) = &result {
        tracing::warn!(
            fetcher = fetcher.id(),
            generation = %ticket.generation,
            page = ticket.query.page,
            %error,
            "history fetch failed"
        );
    }

    FetchOutcome {
        generation: ticket.generation,
        query: ticket.query,
        result,
    }
}
