use std::process::ExitCode;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrCode {
    Success = 0,
    /// Failure outside the run's own states (e.g. HTTP client setup).
    Internal = 1,
    /// Same code clap uses for usage errors.
    InvalidArgs = 2,
    FetchError = 3,
    MissingApiKey = 4,
    MissingWebhook = 5,
    /// Both publish destinations failed.
    PublishError = 6,
    /// Only the dashboard failed.
    DashboardPublishError = 7,
    AnalysisError = 8,
}

impl From<ErrCode> for ExitCode {
    fn from(code: ErrCode) -> Self {
        ExitCode::from(code as u8)
    }
}
