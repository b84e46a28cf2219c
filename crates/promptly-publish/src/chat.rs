//! Block-based chat webhook rendering and delivery.

use async_trait::async_trait;
use promptly_core::types::StandardReport;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{fmt_metric, JsonPoster, Publisher};

const HEADER: &str = "📊 Weekly Promptly Analysis";
const FALLBACK_TEXT: &str = "Weekly Promptly Analysis Report";

/// Body posted to the chat webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Notification fallback shown where blocks are not rendered.
    pub text: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Header { text: TextObject },
    Section { text: TextObject },
    Divider,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub kind: TextKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    PlainText,
    Mrkdwn,
}

impl Block {
    fn header(text: &str) -> Self {
        Block::Header {
            text: TextObject {
                kind: TextKind::PlainText,
                text: text.to_string(),
                emoji: Some(true),
            },
        }
    }

    fn section(text: impl Into<String>) -> Self {
        Block::Section {
            text: TextObject {
                kind: TextKind::Mrkdwn,
                text: text.into(),
                emoji: None,
            },
        }
    }
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("• {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a report as chat blocks.
pub fn render_blocks(report: &StandardReport) -> ChatMessage {
    let m = &report.metrics;
    let impact = format!(
        "• *Average Original Score:* {}\n• *Average Improved Score:* {}\n• *Average Score Improvement:* {}",
        fmt_metric(m.avg_original_score),
        fmt_metric(m.avg_improved_score),
        fmt_metric(m.avg_score_improvement),
    );

    let blocks = vec![
        Block::header(HEADER),
        Block::section("*Executive Summary*"),
        Block::section(report.summary.as_str()),
        Block::Divider,
        Block::section("*Common Mistakes in Original Prompts*"),
        Block::section(bullets(&report.common_mistakes)),
        Block::section("*Patterns in Successful Improvements*"),
        Block::section(bullets(&report.successful_patterns)),
        Block::Divider,
        Block::section("*Developer Tips* 💡"),
        Block::section(bullets(&report.developer_tips)),
        Block::Divider,
        Block::section("*Impact Analysis* 📈"),
        Block::section(impact),
        Block::section(format!("_{}_ 🎯", report.encouragement)),
    ];

    ChatMessage {
        text: FALLBACK_TEXT.to_string(),
        blocks,
    }
}

/// Posts reports to a chat webhook. Without a webhook it skips and succeeds.
pub struct ChatPublisher {
    webhook: Option<String>,
    poster: Arc<dyn JsonPoster>,
}

impl ChatPublisher {
    pub fn new(webhook: Option<String>, poster: Arc<dyn JsonPoster>) -> Self {
        Self { webhook, poster }
    }
}

#[async_trait]
impl Publisher for ChatPublisher {
    fn name(&self) -> &str {
        "chat"
    }

    async fn publish(&self, report: &StandardReport) -> bool {
        let Some(webhook) = &self.webhook else {
            warn!("Skipping chat publish (no webhook configured)");
            return true;
        };

        info!("Sending report to chat webhook");
        let body = match serde_json::to_value(render_blocks(report)) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to encode chat message: {}", e);
                return false;
            }
        };

        match self.poster.post_json(webhook, &body).await {
            Ok(()) => {
                info!("Published to chat");
                true
            }
            Err(e) => {
                tracing::error!("Failed to publish to chat: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_report, CountingPoster};

    fn section_text(block: &Block) -> &str {
        match block {
            Block::Section { text } | Block::Header { text } => &text.text,
            Block::Divider => "",
        }
    }

    #[test]
    fn test_block_layout() {
        let message = render_blocks(&sample_report());
        assert_eq!(message.text, FALLBACK_TEXT);
        assert_eq!(message.blocks.len(), 15);
        assert!(matches!(message.blocks[0], Block::Header { .. }));
        let dividers: Vec<usize> = message
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == Block::Divider)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(dividers, vec![3, 8, 11]);
        assert_eq!(
            section_text(&message.blocks[2]),
            "Most prompts lacked context about the codebase."
        );
    }

    #[test]
    fn test_lists_are_bulleted() {
        let message = render_blocks(&sample_report());
        assert_eq!(
            section_text(&message.blocks[5]),
            "• Omitting the language or framework.\n• Asking several unrelated things at once."
        );
        assert_eq!(
            section_text(&message.blocks[7]),
            "• Stating the expected output format."
        );
    }

    #[test]
    fn test_metrics_two_decimals() {
        let message = render_blocks(&sample_report());
        assert_eq!(
            section_text(&message.blocks[13]),
            "• *Average Original Score:* 4.00\n• *Average Improved Score:* 8.46\n• *Average Score Improvement:* 4.44"
        );
        assert_eq!(
            section_text(&message.blocks[14]),
            "_Promptly doubled prompt quality this week._ 🎯"
        );
    }

    #[test]
    fn test_empty_list_renders_empty_section() {
        let mut report = sample_report();
        report.developer_tips.clear();
        let message = render_blocks(&report);
        assert_eq!(section_text(&message.blocks[10]), "");
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(render_blocks(&sample_report())).unwrap();
        assert_eq!(value["blocks"][0]["type"], "header");
        assert_eq!(value["blocks"][0]["text"]["type"], "plain_text");
        assert_eq!(value["blocks"][0]["text"]["emoji"], true);
        assert_eq!(value["blocks"][1]["type"], "section");
        assert_eq!(value["blocks"][1]["text"]["type"], "mrkdwn");
        assert!(value["blocks"][1]["text"].get("emoji").is_none());
        assert_eq!(value["blocks"][3], serde_json::json!({"type": "divider"}));
    }

    #[tokio::test]
    async fn test_missing_webhook_skips_without_network() {
        let poster = Arc::new(CountingPoster::default());
        let publisher = ChatPublisher::new(None, poster.clone());
        assert!(publisher.publish(&sample_report()).await);
        assert_eq!(poster.count(), 0);
    }

    #[tokio::test]
    async fn test_publish_posts_blocks_to_webhook() {
        let poster = Arc::new(CountingPoster::default());
        let publisher =
            ChatPublisher::new(Some("https://hooks.example.com/T1".into()), poster.clone());
        assert!(publisher.publish(&sample_report()).await);
        assert_eq!(poster.count(), 1);

        let sent = poster.sent.lock().unwrap();
        assert_eq!(sent[0].0, "https://hooks.example.com/T1");
        assert_eq!(sent[0].1["text"], FALLBACK_TEXT);
        assert_eq!(sent[0].1["blocks"].as_array().unwrap().len(), 15);
    }

    #[tokio::test]
    async fn test_transport_failure_is_false() {
        let poster = Arc::new(CountingPoster::failing());
        let publisher =
            ChatPublisher::new(Some("https://hooks.example.com/T1".into()), poster.clone());
        assert!(!publisher.publish(&sample_report()).await);
        assert_eq!(poster.count(), 1);
    }
}
