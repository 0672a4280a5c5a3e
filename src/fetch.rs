//! Thread fetch — the backend collaborator behind every refresh.
//!
//! `ThreadFetcher` is the seam the view-model depends on; `HttpThreadFetcher`
//! is the REST implementation against `GET {base}/threadDetails/{id}`.
//! Parsing is a pure function for testability.
//!
//! ERROR HANDLING
//! ==============
//! `FetchError` is `Clone` so one failed attempt can be delivered to every
//! subscriber waiting on it. Retrying is the caller's decision.

use tracing::debug;

use crate::config::ClientConfig;
use crate::model::{Thread, ThreadId};

#[cfg(test)]
#[path = "fetch_test.rs"]
mod tests;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("thread request failed: {0}")]
    Transport(String),

    #[error("thread {thread_id} not found")]
    NotFound { thread_id: ThreadId },

    /// The backend answered with a non-success status.
    #[error("thread request returned status {status}")]
    Status { status: u16, body: String },

    #[error("thread response parse failed: {0}")]
    Decode(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// FETCHER TRAIT
// =============================================================================

/// Source of whole-thread state. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ThreadFetcher: Send + Sync {
    /// Fetch the current state of `thread_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] on transport failure, a missing thread, a
    /// non-success status or an undecodable body.
    async fn fetch_thread(&self, thread_id: ThreadId) -> Result<Thread, FetchError>;
}

// =============================================================================
// HTTP FETCHER
// =============================================================================

pub struct HttpThreadFetcher {
    http: reqwest::Client,
    base_url: String,
}

impl HttpThreadFetcher {
    /// # Errors
    ///
    /// Returns [`FetchError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request)
            .connect_timeout(config.timeouts.connect)
            .build()
            .map_err(|e| FetchError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone() })
    }

    #[must_use]
    pub fn thread_url(&self, thread_id: ThreadId) -> String {
        format!("{}/threadDetails/{thread_id}", self.base_url)
    }
}

#[async_trait::async_trait]
impl ThreadFetcher for HttpThreadFetcher {
    async fn fetch_thread(&self, thread_id: ThreadId) -> Result<Thread, FetchError> {
        let url = self.thread_url(thread_id);
        debug!(%thread_id, %url, "fetching thread");

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        match status {
            200..=299 => parse_thread(&text),
            404 => Err(FetchError::NotFound { thread_id }),
            _ => Err(FetchError::Status { status, body: text }),
        }
    }
}

fn parse_thread(json: &str) -> Result<Thread, FetchError> {
    serde_json::from_str(json).map_err(|e| FetchError::Decode(e.to_string()))
}
