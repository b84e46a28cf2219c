use serde::{Deserialize, Serialize};

/// One original/improved prompt pair with its before/after quality scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticEntry {
    pub original_prompt: String,
    pub improved_prompt: String,
    pub original_score: f64,
    pub improved_score: f64,
    pub score_improvement: f64,
}

impl AnalyticEntry {
    /// Score gained by the improved prompt, used for ranking.
    pub fn delta(&self) -> f64 {
        self.improved_score - self.original_score
    }
}

/// Raw analytics as returned by the source.
///
/// `total_count` is the universe count reported by the source and may be
/// larger than `entries.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsBatch {
    pub entries: Vec<AnalyticEntry>,
    pub total_count: u64,
}

/// A batch together with averages over its selected subset.
///
/// Serializes flat, so the generation service sees
/// `{entries, total_count, avg_original_score, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    #[serde(flatten)]
    pub batch: AnalyticsBatch,
    pub avg_original_score: f64,
    pub avg_improved_score: f64,
    pub avg_score_improvement: f64,
}

impl AnalyticsSummary {
    pub fn entries(&self) -> &[AnalyticEntry] {
        &self.batch.entries
    }

    pub fn total_count(&self) -> u64 {
        self.batch.total_count
    }
}

/// Aggregate scores echoed back by the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportMetrics {
    pub avg_original_score: f64,
    pub avg_improved_score: f64,
    pub avg_score_improvement: f64,
}

/// The fixed-shape analysis result consumed by every publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StandardReport {
    pub summary: String,
    pub common_mistakes: Vec<String>,
    pub successful_patterns: Vec<String>,
    pub developer_tips: Vec<String>,
    pub metrics: ReportMetrics,
    pub encouragement: String,
}
