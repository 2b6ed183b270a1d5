//! Domain error types.

/// A parse error with position information for filter predicates.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for sigstats.
#[derive(Debug, thiserror::Error)]
pub enum SigstatsError {
    #[error("invalid data in {path}: {reason}")]
    DataFormat { path: String, reason: String },

    #[error("gain/loss ratio is undefined: {gain_count} gains and no losses")]
    UndefinedRatio { gain_count: usize },

    #[error("event has no numeric field '{field}'")]
    MissingField { field: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    FilterParse(#[from] ParseError),

    #[error("document store error: {reason}")]
    Store { reason: String },

    #[error("document store query error: {reason}")]
    StoreQuery { reason: String },

    #[error("invalid dataset: {reason}")]
    Dataset { reason: String },

    #[error("training failed: {0}")]
    Training(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SigstatsError> for std::process::ExitCode {
    fn from(err: &SigstatsError) -> Self {
        let code: u8 = match err {
            SigstatsError::Io(_) => 1,
            SigstatsError::ConfigParse { .. }
            | SigstatsError::ConfigMissing { .. }
            | SigstatsError::ConfigInvalid { .. } => 2,
            SigstatsError::Store { .. } | SigstatsError::StoreQuery { .. } => 3,
            SigstatsError::FilterParse(_) => 4,
            SigstatsError::DataFormat { .. }
            | SigstatsError::Dataset { .. }
            | SigstatsError::Training(_) => 5,
            SigstatsError::UndefinedRatio { .. } | SigstatsError::MissingField { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
