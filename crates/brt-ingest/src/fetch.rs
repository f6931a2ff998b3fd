//! Feed fetcher
//!
//! One GET per run against the configured feed URL. Any non-2xx status or a
//! body that is not a snapshot-shaped JSON object aborts the run; there is
//! no retry.

use brt_common::Snapshot;
use reqwest::Client;
use tracing::{error, info};

use crate::config::FeedConfig;
use crate::error::{IngestError, IngestResult};

const USER_AGENT: &str = concat!("brt-ingest/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one feed endpoint
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    url: String,
}

impl Fetcher {
    pub fn new(config: &FeedConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(client, &config.url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download and decode the current feed state
    pub async fn fetch(&self) -> IngestResult<Snapshot> {
        info!(url = %self.url, "Fetching GPS feed");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| self.request_failed(source))?;

        let status = response.status();
        if !status.is_success() {
            error!(url = %self.url, %status, "Feed request rejected");
            return Err(IngestError::UpstreamHttp {
                url: self.url.clone(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| self.request_failed(source))?;

        let snapshot = Snapshot::from_slice(&body).map_err(|e| {
            error!(url = %self.url, error = %e, "Feed body rejected");
            IngestError::UpstreamFormat(e)
        })?;

        info!(
            url = %self.url,
            bytes = body.len(),
            vehicles = snapshot.vehicle_count(),
            "Feed fetched"
        );
        Ok(snapshot)
    }

    fn request_failed(&self, source: reqwest::Error) -> IngestError {
        error!(url = %self.url, error = %source, "Feed request failed");
        IngestError::UpstreamRequest {
            url: self.url.clone(),
            source,
        }
    }
}
