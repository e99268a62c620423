use thiserror::Error;

/// Errors returned by feature stream operations.
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("features: source not found: {path}")]
    NotFound { path: String },

    #[error("features: malformed data in {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("features: source index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("features: unknown source name: {name}")]
    UnknownSource { name: String },

    #[error("features: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("features: {reason}")]
    Capacity { reason: String },

    #[error("features: write outside historic window: index {index}, window {low}..={high}")]
    HistoryViolation { index: u64, low: u64, high: u64 },

    #[error("features: invalid mask: {reason}")]
    InvalidMask { reason: String },

    #[error("features: invalid flags string: {reason}")]
    InvalidFlags { reason: String },

    #[error("features: io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FeatureError {
    /// Wraps an io::Error for the given path, mapping `NotFound` to the
    /// dedicated variant so callers can distinguish a missing source from
    /// a failing read.
    pub(crate) fn from_io(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            FeatureError::NotFound {
                path: path.to_string(),
            }
        } else {
            FeatureError::Io {
                path: path.to_string(),
                source: err,
            }
        }
    }

    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        FeatureError::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for feature stream operations.
pub type FeatureResult<T> = Result<T, FeatureError>;
