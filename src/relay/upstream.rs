//! Outbound call to the fixed upstream endpoint.
//!
//! # Responsibilities
//! - Perform exactly one outbound request per inbound request
//! - Enforce the per-request deadline on the network operation
//! - Decode the payload and fail closed on any shape mismatch

use std::time::Duration;

use url::Url;

use crate::relay::records::Repository;

/// How much of a malformed body is carried into the error for logging.
const SNIPPET_LEN: usize = 256;

/// Why a relay attempt failed. Both classes map to 502 at the HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode upstream payload: {source}: {snippet:?}")]
    Decode {
        source: serde_json::Error,
        snippet: String,
    },
}

/// Client for the single upstream endpoint.
pub struct UpstreamRelay {
    client: reqwest::Client,
    url: Url,
}

impl UpstreamRelay {
    /// Build the relay client for a fixed upstream URL.
    pub fn new(url: Url) -> Result<Self, RelayError> {
        // The upstream rejects anonymous agents, so identify ourselves.
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self { client, url })
    }

    /// Fetch and decode the upstream listing.
    ///
    /// A single attempt: no retries. The deadline is attached to the request
    /// itself, so the underlying network operation is aborted when it fires
    /// even if the caller has stopped listening.
    pub async fn fetch(&self, deadline: Duration) -> Result<Vec<Repository>, RelayError> {
        let response = self
            .client
            .get(self.url.clone())
            .timeout(deadline)
            .send()
            .await?;

        // Status is deliberately not inspected: an upstream error body is not
        // an array of records and fails the decode below, which is the
        // fail-closed path for every unexpected payload.
        let body = response.bytes().await?;

        let records: Vec<Repository> =
            serde_json::from_slice(&body).map_err(|source| RelayError::Decode {
                source,
                snippet: body_snippet(&body),
            })?;

        Ok(records)
    }

    /// The fixed upstream URL this relay forwards to.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn body_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut snippet: String = text.chars().take(SNIPPET_LEN).collect();
    if text.chars().count() > SNIPPET_LEN {
        snippet.push('…');
    }
    snippet
}
