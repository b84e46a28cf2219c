//! Orchestration of one summary run.
//!
//! `Fetching → Analyzing → Publishing → Done`, leaving early from the first
//! two states. Every collaborator reports success or failure as a value; this
//! is the only place those values become a run outcome.

use std::sync::Arc;

use promptly_analytics::selector;
use promptly_analytics::AnalyticsSource;
use promptly_core::config::SelectionConfig;
use promptly_core::error::SummaryError;
use promptly_core::prompt::SYSTEM_PROMPT;
use promptly_core::{normalize, Generator, StandardReport};
use promptly_publish::Publisher;
use tracing::{debug, info};

use crate::exit::ErrCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Fetching,
    Analyzing,
    Publishing,
    Done,
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Done,
    FetchFailed,
    /// The generation reply could not be parsed into a report.
    AnalysisFailed(String),
    /// The generation service could not produce a reply.
    GenerationFailed(String),
    /// The generation service rejected the credential.
    CredentialRejected(String),
    /// Both destinations failed.
    PublishFailed,
    /// Only the dashboard failed.
    DashboardPublishFailed,
}

impl RunOutcome {
    pub fn exit_code(&self) -> ErrCode {
        match self {
            RunOutcome::Done => ErrCode::Success,
            RunOutcome::FetchFailed => ErrCode::FetchError,
            RunOutcome::AnalysisFailed(_) | RunOutcome::GenerationFailed(_) => {
                ErrCode::AnalysisError
            }
            RunOutcome::CredentialRejected(_) => ErrCode::MissingApiKey,
            RunOutcome::PublishFailed => ErrCode::PublishError,
            RunOutcome::DashboardPublishFailed => ErrCode::DashboardPublishError,
        }
    }

    /// One-line diagnostic for failed runs.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            RunOutcome::Done => None,
            RunOutcome::FetchFailed => Some("fetch error: could not load analytics".into()),
            RunOutcome::AnalysisFailed(e) => Some(format!("parse error: {}", e)),
            RunOutcome::GenerationFailed(e) => Some(format!("generation error: {}", e)),
            RunOutcome::CredentialRejected(e) => Some(e.clone()),
            RunOutcome::PublishFailed => Some("publish error: every destination failed".into()),
            RunOutcome::DashboardPublishFailed => {
                Some("publish error: metrics dashboard failed".into())
            }
        }
    }

    /// Combine the two publish results.
    pub fn from_publish(chat_ok: bool, dashboard_ok: bool) -> Self {
        match (chat_ok, dashboard_ok) {
            (false, false) => RunOutcome::PublishFailed,
            (true, false) => RunOutcome::DashboardPublishFailed,
            _ => RunOutcome::Done,
        }
    }
}

pub struct Pipeline {
    source: Arc<dyn AnalyticsSource>,
    generator: Arc<dyn Generator>,
    chat: Arc<dyn Publisher>,
    dashboard: Arc<dyn Publisher>,
    selection: SelectionConfig,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn AnalyticsSource>,
        generator: Arc<dyn Generator>,
        chat: Arc<dyn Publisher>,
        dashboard: Arc<dyn Publisher>,
        selection: SelectionConfig,
    ) -> Self {
        Self {
            source,
            generator,
            chat,
            dashboard,
            selection,
        }
    }

    pub async fn run(&self, days: u32) -> RunOutcome {
        info!("{:?}: analytics for the last {} days", RunState::Fetching, days);
        let Some(batch) = self.source.fetch(days).await else {
            return RunOutcome::FetchFailed;
        };

        info!(
            "{:?}: {} entries via {}",
            RunState::Analyzing,
            batch.entries.len(),
            self.generator.name()
        );
        let report = match self.analyze(batch).await {
            Ok(report) => report,
            Err(e) if e.is_credential() => return RunOutcome::CredentialRejected(e.to_string()),
            Err(e @ SummaryError::MalformedReport(_)) => {
                return RunOutcome::AnalysisFailed(e.to_string())
            }
            Err(e) => return RunOutcome::GenerationFailed(e.to_string()),
        };

        info!(
            "{:?}: {} and {}",
            RunState::Publishing,
            self.chat.name(),
            self.dashboard.name()
        );
        // Both sends happen before the outcome is decided.
        let chat_ok = self.chat.publish(&report).await;
        let dashboard_ok = self.dashboard.publish(&report).await;

        let outcome = RunOutcome::from_publish(chat_ok, dashboard_ok);
        if outcome == RunOutcome::Done {
            info!("{:?}", RunState::Done);
        }
        outcome
    }

    async fn analyze(
        &self,
        batch: promptly_core::AnalyticsBatch,
    ) -> Result<StandardReport, SummaryError> {
        let summary = selector::select(
            batch,
            self.selection.top_n,
            self.selection.max_prompt_length,
        );
        debug!(
            "Averages over selection: original {:.2}, improved {:.2}, improvement {:.2}",
            summary.avg_original_score, summary.avg_improved_score, summary.avg_score_improvement
        );

        let message = serde_json::to_string(&summary)?;
        let reply = self.generator.generate(SYSTEM_PROMPT, &message).await?;
        normalize(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use promptly_core::error::Result;
    use promptly_core::{AnalyticEntry, AnalyticsBatch, AnalyticsSummary};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const REPORT: &str = r#"{
        "summary": "Context was the main gap.",
        "common_mistakes": ["No context"],
        "successful_patterns": ["Added constraints"],
        "developer_tips": ["Say what you tried"],
        "metrics": {"avg_original_score": 3.0, "avg_improved_score": 8.0, "avg_score_improvement": 5.0},
        "encouragement": "Nice work."
    }"#;

    struct FakeSource {
        batch: Option<AnalyticsBatch>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalyticsSource for FakeSource {
        async fn fetch(&self, _days: u32) -> Option<AnalyticsBatch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch.clone()
        }
    }

    enum Reply {
        Text(&'static str),
        AuthError,
        Unreachable,
    }

    struct FakeGenerator {
        reply: Reply,
        calls: AtomicUsize,
        received: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        fn name(&self) -> &str {
            "fake"
        }

        async fn generate(&self, system: &str, user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.received
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            match self.reply {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::AuthError => Err(SummaryError::Auth {
                    service: "fake".into(),
                    message: "HTTP 401".into(),
                }),
                Reply::Unreachable => Err(SummaryError::Transport("connection refused".into())),
            }
        }
    }

    struct FakePublisher {
        name: &'static str,
        ok: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        fn name(&self) -> &str {
            self.name
        }

        async fn publish(&self, _report: &StandardReport) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ok
        }
    }

    struct Harness {
        source: Arc<FakeSource>,
        generator: Arc<FakeGenerator>,
        chat: Arc<FakePublisher>,
        dashboard: Arc<FakePublisher>,
        pipeline: Pipeline,
    }

    fn entry(original: f64, improved: f64) -> AnalyticEntry {
        AnalyticEntry {
            original_prompt: "refactor this".into(),
            improved_prompt: "Refactor parse_header to return Result instead of panicking".into(),
            original_score: original,
            improved_score: improved,
            score_improvement: improved - original,
        }
    }

    fn harness(
        batch: Option<AnalyticsBatch>,
        reply: Reply,
        chat_ok: bool,
        dashboard_ok: bool,
    ) -> Harness {
        let source = Arc::new(FakeSource {
            batch,
            calls: AtomicUsize::new(0),
        });
        let generator = Arc::new(FakeGenerator {
            reply,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        });
        let chat = Arc::new(FakePublisher {
            name: "chat",
            ok: chat_ok,
            calls: AtomicUsize::new(0),
        });
        let dashboard = Arc::new(FakePublisher {
            name: "dashboard",
            ok: dashboard_ok,
            calls: AtomicUsize::new(0),
        });
        let pipeline = Pipeline::new(
            source.clone(),
            generator.clone(),
            chat.clone(),
            dashboard.clone(),
            SelectionConfig {
                top_n: 1,
                max_prompt_length: 1000,
            },
        );
        Harness {
            source,
            generator,
            chat,
            dashboard,
            pipeline,
        }
    }

    fn sample_batch() -> Option<AnalyticsBatch> {
        Some(AnalyticsBatch {
            entries: vec![entry(4.0, 6.0), entry(2.0, 9.0)],
            total_count: 30,
        })
    }

    fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_run() {
        let h = harness(None, Reply::Text(REPORT), true, true);
        let outcome = h.pipeline.run(7).await;

        assert_eq!(outcome, RunOutcome::FetchFailed);
        assert_eq!(outcome.exit_code(), ErrCode::FetchError);
        assert_eq!(calls(&h.source.calls), 1);
        assert_eq!(calls(&h.generator.calls), 0);
        assert_eq!(calls(&h.chat.calls), 0);
        assert_eq!(calls(&h.dashboard.calls), 0);
    }

    #[tokio::test]
    async fn test_successful_run() {
        let h = harness(sample_batch(), Reply::Text(REPORT), true, true);
        let outcome = h.pipeline.run(7).await;

        assert_eq!(outcome, RunOutcome::Done);
        assert_eq!(outcome.exit_code(), ErrCode::Success);
        assert!(outcome.diagnostic().is_none());
        assert_eq!(calls(&h.chat.calls), 1);
        assert_eq!(calls(&h.dashboard.calls), 1);
    }

    #[tokio::test]
    async fn test_generator_receives_summary_of_selection() {
        let h = harness(sample_batch(), Reply::Text(REPORT), true, true);
        h.pipeline.run(7).await;

        let received = h.generator.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, SYSTEM_PROMPT);

        let summary: AnalyticsSummary = serde_json::from_str(&received[0].1).unwrap();
        // Full entry list, averages from the single top entry.
        assert_eq!(summary.entries().len(), 2);
        assert_eq!(summary.total_count(), 30);
        assert_eq!(summary.avg_original_score, 2.0);
        assert_eq!(summary.avg_improved_score, 9.0);
        assert_eq!(summary.avg_score_improvement, 7.0);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_analysis_failure() {
        let h = harness(
            sample_batch(),
            Reply::Text("Here is your report: {}"),
            true,
            true,
        );
        let outcome = h.pipeline.run(7).await;

        assert!(matches!(outcome, RunOutcome::AnalysisFailed(_)));
        assert_eq!(outcome.exit_code(), ErrCode::AnalysisError);
        assert!(outcome.diagnostic().unwrap().starts_with("parse error"));
        assert_eq!(calls(&h.chat.calls), 0);
        assert_eq!(calls(&h.dashboard.calls), 0);
    }

    #[tokio::test]
    async fn test_generation_transport_failure_is_analysis_failure() {
        let h = harness(sample_batch(), Reply::Unreachable, true, true);
        let outcome = h.pipeline.run(7).await;
        assert!(matches!(outcome, RunOutcome::GenerationFailed(_)));
        assert_eq!(outcome.exit_code(), ErrCode::AnalysisError);
        let diagnostic = outcome.diagnostic().unwrap();
        assert!(diagnostic.starts_with("generation error"), "{}", diagnostic);
        assert!(!diagnostic.contains("parse error"));
        assert_eq!(calls(&h.dashboard.calls), 0);
    }

    #[tokio::test]
    async fn test_rejected_credential_aborts() {
        let h = harness(sample_batch(), Reply::AuthError, true, true);
        let outcome = h.pipeline.run(7).await;

        assert!(matches!(outcome, RunOutcome::CredentialRejected(_)));
        assert_eq!(outcome.exit_code(), ErrCode::MissingApiKey);
        assert_eq!(calls(&h.chat.calls), 0);
    }

    #[tokio::test]
    async fn test_both_publishers_fail() {
        let h = harness(sample_batch(), Reply::Text(REPORT), false, false);
        let outcome = h.pipeline.run(7).await;

        assert_eq!(outcome, RunOutcome::PublishFailed);
        assert_eq!(outcome.exit_code(), ErrCode::PublishError);
        assert_eq!(calls(&h.chat.calls), 1);
        assert_eq!(calls(&h.dashboard.calls), 1);
    }

    #[tokio::test]
    async fn test_dashboard_only_failure() {
        let h = harness(sample_batch(), Reply::Text(REPORT), true, false);
        let outcome = h.pipeline.run(7).await;
        assert_eq!(outcome, RunOutcome::DashboardPublishFailed);
        assert_eq!(outcome.exit_code(), ErrCode::DashboardPublishError);
    }

    #[tokio::test]
    async fn test_chat_failure_still_publishes_dashboard() {
        let h = harness(sample_batch(), Reply::Text(REPORT), false, true);
        let outcome = h.pipeline.run(7).await;

        assert_eq!(outcome, RunOutcome::Done);
        assert_eq!(calls(&h.dashboard.calls), 1);
    }
}
