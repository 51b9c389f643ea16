//! HTTP access to the forum's private-message history.

pub mod error;
pub mod http;
mod wire;

pub use error::{ClientError, ClientResult};
pub use http::{ClientConfig, DEFAULT_REQUEST_TIMEOUT, HTTP_FETCHER_ID, HttpHistoryFetcher};
