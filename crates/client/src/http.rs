use std::time::Duration;

use missive_history::{BoxFuture, FetchError, FetchQuery, FetchResult, HistoryFetcher, PageResult};
use snafu::{ResultExt, ensure};

use crate::error::{
    BuildHttpClientSnafu, ClientResult, DecodePageSnafu, InvalidEndpointSnafu, ReadBodySnafu,
    SendRequestSnafu, UnexpectedStatusSnafu,
};
use crate::wire::WirePage;

pub const HTTP_FETCHER_ID: &str = "http";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const HISTORY_PATH: &str = "messages/chat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the forum API, e.g. `https://bbs.example.org/api`.
    pub endpoint: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Fetches history pages from the forum REST API.
#[derive(Debug, Clone)]
pub struct HttpHistoryFetcher {
    http: reqwest::Client,
    history_url: String,
    auth_token: Option<String>,
}

impl HttpHistoryFetcher {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let endpoint = config.endpoint.trim_end_matches('/');
        ensure!(
            endpoint.starts_with("http://") || endpoint.starts_with("https://"),
            InvalidEndpointSnafu {
                stage: "http-fetcher-new",
                endpoint: config.endpoint.clone(),
            }
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context(BuildHttpClientSnafu {
                stage: "build-client",
            })?;

        Ok(Self {
            http,
            history_url: format!("{endpoint}/{HISTORY_PATH}"),
            auth_token: config.auth_token.filter(|token| !token.is_empty()),
        })
    }

    pub fn history_url(&self) -> &str {
        &self.history_url
    }

    pub async fn fetch_page(&self, query: &FetchQuery) -> ClientResult<PageResult> {
        let mut request = self.http.get(&self.history_url).query(&query_params(query));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(
            url = %self.history_url,
            chat_id = ?query.chat_id,
            uid = ?query.uid,
            page = query.page,
            "requesting history page"
        );

        let response = request.send().await.context(SendRequestSnafu {
            stage: "send-history-request",
        })?;
        let status = response.status();
        let body = response.bytes().await.context(ReadBodySnafu {
            stage: "read-history-response",
        })?;

        if !status.is_success() {
            return UnexpectedStatusSnafu {
                stage: "history-http-status",
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }
            .fail();
        }

        let page: WirePage = serde_json::from_slice(&body).context(DecodePageSnafu {
            stage: "decode-history-page",
            status: status.as_u16(),
        })?;

        Ok(page.into())
    }
}

impl HistoryFetcher for HttpHistoryFetcher {
    fn id(&self) -> &str {
        HTTP_FETCHER_ID
    }

    fn fetch<'a>(&'a self, query: &'a FetchQuery) -> BoxFuture<'a, FetchResult<PageResult>> {
        Box::pin(async move { self.fetch_page(query).await.map_err(FetchError::from) })
    }
}

fn query_params(query: &FetchQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(7);
    if let Some(chat_id) = query.chat_id {
        params.push(("chat_id", chat_id.to_string()));
    }
    if let Some(uid) = query.uid {
        params.push(("uid", uid.to_string()));
    }
    if query.want_sidebar_list {
        params.push(("chat_list", "1".to_string()));
    }
    params.push(("newer", u8::from(query.newer).to_string()));
    if let Some(cursor) = query.cursor {
        params.push(("dateline", cursor.dateline.to_string()));
        params.push(("message_id", cursor.message_id.to_string()));
    }
    params.push(("page", query.page.to_string()));
    params
}
