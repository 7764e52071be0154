use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading discourse data or writing features.
#[derive(Debug, Error)]
pub enum DsenseError {
    /// An I/O operation on a data or feature file failed.
    #[error("i/o error on {path:?}: {source}")]
    Io {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be decoded.
    #[error("malformed json in {path:?}: {source}")]
    Json {
        /// The file being decoded.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A bracketed parse tree string could not be parsed.
    #[error("malformed parse tree: {0}")]
    MalformedTree(String),

    /// A relation references a document missing from `parses.json`.
    #[error("document {0} not found in parses")]
    MissingDocument(String),

    /// A relation token points outside its sentence or document.
    #[error("token reference out of range in relation {relation_id}: {detail}")]
    TokenOutOfRange {
        /// The offending relation.
        relation_id: u64,
        /// What was out of range.
        detail: String,
    },

    /// The requested experiment name is not registered.
    #[error("unknown experiment: {0:?}")]
    UnknownExperiment(String),

    /// A regex pattern failed to compile (should not happen with static patterns).
    #[error("regex compilation error: {0}")]
    RegexError(#[from] regex::Error),
}

impl DsenseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for dsense operations.
pub type Result<T> = std::result::Result<T, DsenseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = DsenseError::UnknownExperiment("experiment9".into());
        assert_eq!(err.to_string(), "unknown experiment: \"experiment9\"");

        let err = DsenseError::MissingDocument("wsj_0001".into());
        assert!(err.to_string().contains("wsj_0001"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DsenseError>();
    }
}
