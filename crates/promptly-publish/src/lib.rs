//! Renderers and publishers for finished reports.
//!
//! Each destination pairs a pure render function with a network send. A
//! send never fails the caller: transport problems and non-2xx responses
//! are logged and reported as `false`.

pub mod chat;
pub mod dashboard;

use async_trait::async_trait;
use promptly_core::error::{Result, SummaryError};
use promptly_core::types::StandardReport;
use serde_json::Value;
use std::time::Duration;

pub use chat::ChatPublisher;
pub use dashboard::DashboardPublisher;

/// A publish destination for a [`StandardReport`].
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Destination name for logs.
    fn name(&self) -> &str;

    /// Render and deliver the report. `true` means delivered or skipped.
    async fn publish(&self, report: &StandardReport) -> bool;
}

/// Sends a JSON body to a URL.
#[async_trait]
pub trait JsonPoster: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<()>;
}

/// [`JsonPoster`] over a `reqwest` client with a fixed timeout.
pub struct HttpPoster {
    client: reqwest::Client,
}

impl HttpPoster {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("promptly-summary/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonPoster for HttpPoster {
    async fn post_json(&self, url: &str, body: &Value) -> Result<()> {
        self.client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| SummaryError::Transport(format!("Request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| SummaryError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Format a metric with exactly two decimals.
pub(crate) fn fmt_metric(value: f64) -> String {
    format!("{:.2}", value)
}
