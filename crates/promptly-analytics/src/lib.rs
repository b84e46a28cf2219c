//! Analytics fetching and selection for promptly-summary.
//!
//! Fetches raw prompt-improvement analytics and reduces them to the
//! averages sent to the generation service.

pub mod selector;
pub mod source;

pub use selector::{rank, select};
pub use source::{AnalyticsSource, HttpAnalyticsSource};
