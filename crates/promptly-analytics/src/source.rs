use async_trait::async_trait;
use promptly_core::config::SourceConfig;
use promptly_core::error::{Result, SummaryError};
use promptly_core::types::AnalyticsBatch;
use std::time::Duration;
use tracing::{debug, warn};

/// Where analytics batches come from.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Fetch the last `days` days of analytics, or `None` on any failure.
    async fn fetch(&self, days: u32) -> Option<AnalyticsBatch>;
}

/// Fetches analytics from the prompt-history HTTP endpoint.
pub struct HttpAnalyticsSource {
    client: reqwest::Client,
    url: String,
}

impl HttpAnalyticsSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("promptly-summary/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    async fn try_fetch(&self, days: u32) -> Result<AnalyticsBatch> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("days", days)])
            .send()
            .await
            .map_err(|e| SummaryError::Transport(format!("Request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| SummaryError::Transport(e.to_string()))?;

        let batch: AnalyticsBatch = response
            .json()
            .await
            .map_err(|e| SummaryError::Transport(format!("Invalid analytics body: {}", e)))?;
        Ok(batch)
    }
}

#[async_trait]
impl AnalyticsSource for HttpAnalyticsSource {
    async fn fetch(&self, days: u32) -> Option<AnalyticsBatch> {
        match self.try_fetch(days).await {
            Ok(batch) => {
                debug!(
                    "Fetched {} entries (total_count {}) for {} days",
                    batch.entries.len(),
                    batch.total_count,
                    days
                );
                Some(batch)
            }
            Err(e) => {
                warn!("Fetching analytics from {} failed: {}", self.url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde::Deserialize;
    use serde_json::{json, Value};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn source(url: String) -> HttpAnalyticsSource {
        HttpAnalyticsSource::new(&SourceConfig {
            url,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[derive(Deserialize)]
    struct DaysQuery {
        days: u32,
    }

    async fn history(Query(q): Query<DaysQuery>) -> Json<Value> {
        Json(json!({
            "entries": [{
                "original_prompt": "make it faster",
                "improved_prompt": "Profile the hot loop in render() and remove the allocation",
                "original_score": 2.0,
                "improved_score": 8.0,
                "score_improvement": 6.0
            }],
            "total_count": q.days * 10
        }))
    }

    #[tokio::test]
    async fn test_fetch_passes_days_and_decodes() {
        let base = spawn(Router::new().route("/prompt-history", get(history))).await;
        let batch = source(format!("{}/prompt-history", base)).fetch(7).await.unwrap();
        assert_eq!(batch.total_count, 70);
        assert_eq!(batch.entries.len(), 1);
        assert_eq!(batch.entries[0].improved_score, 8.0);
    }

    #[tokio::test]
    async fn test_fetch_non_2xx_is_none() {
        let router = Router::new().route(
            "/prompt-history",
            get(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = spawn(router).await;
        assert!(source(format!("{}/prompt-history", base)).fetch(7).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_bad_body_is_none() {
        let router = Router::new().route("/prompt-history", get(|| async { "not json" }));
        let base = spawn(router).await;
        assert!(source(format!("{}/prompt-history", base)).fetch(7).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_none() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(source(format!("http://{}/prompt-history", addr)).fetch(7).await.is_none());
    }
}
