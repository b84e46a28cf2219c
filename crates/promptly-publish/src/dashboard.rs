//! HTML rendering for the metrics dashboard.

use async_trait::async_trait;
use promptly_core::types::StandardReport;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::{fmt_metric, JsonPoster, Publisher};

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn list_items(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("<li>{}</li>", escape(item)))
        .collect()
}

fn list_section(out: &mut String, class: &str, title: &str, items: &[String]) {
    out.push_str(&format!(
        "  <section class=\"{}\">\n    <h2>{}</h2>\n    <ul>{}</ul>\n  </section>\n",
        class,
        title,
        list_items(items)
    ));
}

/// Render a report as a single HTML fragment.
///
/// Header, then five sections in fixed order: executive summary, common
/// mistakes, successful patterns, developer tips, impact analysis. Output is
/// a pure function of the report.
pub fn render_html(report: &StandardReport) -> String {
    let m = &report.metrics;
    let mut out = String::new();

    out.push_str("<div class=\"promptly-report\">\n");
    out.push_str("  <h1>📊 Weekly Promptly Analysis</h1>\n");

    out.push_str(&format!(
        "  <section class=\"executive-summary\">\n    <h2>Executive Summary</h2>\n    <p>{}</p>\n  </section>\n",
        escape(&report.summary)
    ));
    list_section(
        &mut out,
        "common-mistakes",
        "Common Mistakes in Original Prompts",
        &report.common_mistakes,
    );
    list_section(
        &mut out,
        "successful-patterns",
        "Patterns in Successful Improvements",
        &report.successful_patterns,
    );
    list_section(
        &mut out,
        "developer-tips",
        "Developer Tips 💡",
        &report.developer_tips,
    );

    out.push_str("  <section class=\"impact-analysis\">\n    <h2>Impact Analysis 📈</h2>\n    <ul>");
    out.push_str(&format!(
        "<li><strong>Average Original Score:</strong> {}</li>\
         <li><strong>Average Improved Score:</strong> {}</li>\
         <li><strong>Average Score Improvement:</strong> {}</li>",
        fmt_metric(m.avg_original_score),
        fmt_metric(m.avg_improved_score),
        fmt_metric(m.avg_score_improvement),
    ));
    out.push_str("</ul>\n");
    out.push_str(&format!(
        "    <p class=\"encouragement\"><em>{}</em> 🎯</p>\n  </section>\n",
        escape(&report.encouragement)
    ));
    out.push_str("</div>\n");
    out
}

/// Posts reports to the dashboard endpoint. Always configured, never skips.
pub struct DashboardPublisher {
    url: String,
    poster: Arc<dyn JsonPoster>,
}

impl DashboardPublisher {
    pub fn new(url: impl Into<String>, poster: Arc<dyn JsonPoster>) -> Self {
        Self {
            url: url.into(),
            poster,
        }
    }
}

#[async_trait]
impl Publisher for DashboardPublisher {
    fn name(&self) -> &str {
        "dashboard"
    }

    async fn publish(&self, report: &StandardReport) -> bool {
        info!("Sending report to metrics dashboard");
        let body = json!({ "text": render_html(report) });
        match self.poster.post_json(&self.url, &body).await {
            Ok(()) => {
                info!("Published to metrics dashboard");
                true
            }
            Err(e) => {
                tracing::error!("Failed to publish to metrics dashboard: {}", e);
                false
            }
        }
    }
}
