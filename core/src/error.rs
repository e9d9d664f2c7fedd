use std::path::PathBuf;

/// Failures a caller may want to tell apart. Carried inside `anyhow::Error`;
/// recover with `err.downcast_ref::<AnalysisError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// The analysis root or configuration is unusable. Fatal, raised before
    /// any file is loaded.
    ConfigurationError { path: PathBuf, reason: String },
    /// A file could not be parsed. Recorded, never fatal.
    ParseFailure { path: PathBuf },
    /// A file blew its node or depth budget. Recorded, never fatal.
    ResourceExhausted { path: PathBuf, limit: &'static str },
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::ConfigurationError { path, reason } => {
                write!(f, "configuration error: {}: {reason}", path.display())
            }
            AnalysisError::ParseFailure { path } => write!(f, "failed to parse {}", path.display()),
            AnalysisError::ResourceExhausted { path, limit } => {
                write!(f, "resource exhausted in {} ({limit})", path.display())
            }
        }
    }
}

impl std::error::Error for AnalysisError {}
