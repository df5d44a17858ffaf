//! All application errors, categorized by domain.

/// Errors raised anywhere in the pattern miner: CLI parsing, config
/// loading, quote ingestion, and the mining invariants themselves.
///
/// Every variant is fatal at the invocation level — there is no recoverable
/// path once one of these is raised; the entry point prints it and exits
/// non-zero.
#[derive(Debug, thiserror::Error)]
pub enum MiningError {
    #[error("argument error: {0}")]
    Argument(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<csv::Error> for MiningError {
    fn from(err: csv::Error) -> Self {
        MiningError::Format(err.to_string())
    }
}

impl From<serde_json::Error> for MiningError {
    fn from(err: serde_json::Error) -> Self {
        MiningError::Config(err.to_string())
    }
}
