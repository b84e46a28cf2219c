pub mod config;
pub mod error;
pub mod generation;
pub mod prompt;
pub mod report;
pub mod types;

pub use config::{AppConfig, Credentials};
pub use error::SummaryError;
pub use generation::Generator;
pub use report::normalize;
pub use types::{AnalyticEntry, AnalyticsBatch, AnalyticsSummary, ReportMetrics, StandardReport};
