use missive_history::FetchError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    #[snafu(display("history endpoint '{endpoint}' is not an http(s) URL"))]
    InvalidEndpoint {
        stage: &'static str,
        endpoint: String,
    },
    #[snafu(display("failed to build http client on `{stage}`, {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request failed on `{stage}`, {source}"))]
    SendRequest {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to read response body on `{stage}`, {source}"))]
    ReadBody {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("history endpoint returned status {status}: {body}"))]
    UnexpectedStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode history page (status {status}), {source}"))]
    DecodePage {
        stage: &'static str,
        status: u16,
        source: serde_json::Error,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Transport failures are network errors; anything the server actually answered is not.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::SendRequest { .. } | Self::ReadBody { .. })
    }
}

impl From<ClientError> for FetchError {
    fn from(error: ClientError) -> Self {
        let details = error.to_string();
        match error {
            ClientError::SendRequest { stage, .. } | ClientError::ReadBody { stage, .. } => {
                FetchError::Network { stage, details }
            }
            ClientError::UnexpectedStatus { stage, status, .. }
            | ClientError::DecodePage { stage, status, .. } => FetchError::Server {
                stage,
                status: Some(status),
                details,
            },
            ClientError::InvalidEndpoint { stage, .. }
            | ClientError::BuildHttpClient { stage, .. } => FetchError::Server {
                stage,
                status: None,
                details,
            },
        }
    }
}
