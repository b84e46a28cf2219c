//! Ranking and aggregation of analytics entries.
//!
//! Entries with over-long prompts are dropped, the rest are ranked by how
//! much the improved prompt gained, and averages are taken over the top N.
//! The raw entry list passes through untouched; only the averages reflect
//! the selection.

use promptly_core::types::{AnalyticEntry, AnalyticsBatch, AnalyticsSummary};

/// Default number of entries kept for aggregation.
pub const DEFAULT_TOP_N: usize = 50;
/// Default prompt length limit, in characters.
pub const DEFAULT_MAX_PROMPT_LENGTH: usize = 1000;

/// Pick the entries used for aggregation, most improved first.
///
/// Entries whose original or improved prompt is longer than
/// `max_prompt_length` characters are skipped. Ties keep input order.
pub fn rank(
    entries: &[AnalyticEntry],
    top_n: usize,
    max_prompt_length: usize,
) -> Vec<&AnalyticEntry> {
    let mut ranked: Vec<&AnalyticEntry> = entries
        .iter()
        .filter(|e| {
            e.original_prompt.chars().count() <= max_prompt_length
                && e.improved_prompt.chars().count() <= max_prompt_length
        })
        .collect();

    // Stable, so equal deltas stay in input order.
    ranked.sort_by(|a, b| b.delta().total_cmp(&a.delta()));
    ranked.truncate(top_n);
    ranked
}

/// Attach averages over the selected subset to `batch`.
///
/// An empty selection yields `0.0` for every average.
pub fn select(batch: AnalyticsBatch, top_n: usize, max_prompt_length: usize) -> AnalyticsSummary {
    debug_assert!(top_n > 0 && max_prompt_length > 0);

    let selected = rank(&batch.entries, top_n, max_prompt_length);
    let (avg_original_score, avg_improved_score, avg_score_improvement) = if selected.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let count = selected.len() as f64;
        (
            selected.iter().map(|e| e.original_score).sum::<f64>() / count,
            selected.iter().map(|e| e.improved_score).sum::<f64>() / count,
            selected.iter().map(|e| e.score_improvement).sum::<f64>() / count,
        )
    };

    tracing::debug!(
        "Selected {} of {} entries (total_count {})",
        selected.len(),
        batch.entries.len(),
        batch.total_count
    );

    AnalyticsSummary {
        batch,
        avg_original_score,
        avg_improved_score,
        avg_score_improvement,
    }
}
