use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building models or training them.
#[derive(Debug, Error)]
pub enum TrainerError {
    /// A tensor operation failed.
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Matrices of one partition disagree on their row count.
    #[error("row count mismatch in {partition} partition: {detail}")]
    ShapeMismatch {
        /// `train`, `dev` or `test`.
        partition: &'static str,
        /// Which matrices disagree.
        detail: String,
    },

    /// Input or output counts disagree between partitions, or between the
    /// model and its data.
    #[error("arity mismatch: {0}")]
    ArityMismatch(String),

    /// The training partition holds fewer rows than one minibatch.
    #[error("training partition has {rows} rows, fewer than one minibatch of {minibatch_size}")]
    EmptyTrainingSet {
        /// Rows in the training partition.
        rows: usize,
        /// Configured minibatch size.
        minibatch_size: usize,
    },

    /// A model or trainer was configured with unusable values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A saved tensor file lacks an expected entry.
    #[error("tensor {name:?} missing from {path:?}")]
    MissingTensor {
        /// Expected tensor name.
        name: String,
        /// The file that was read.
        path: PathBuf,
    },
}

/// Convenience type alias for results in dsense-trainer.
pub type Result<T> = std::result::Result<T, TrainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrainerError::EmptyTrainingSet {
            rows: 3,
            minibatch_size: 100,
        };
        assert_eq!(
            err.to_string(),
            "training partition has 3 rows, fewer than one minibatch of 100"
        );

        let err = TrainerError::ShapeMismatch {
            partition: "dev",
            detail: "x1 has 4 rows, expected 5".into(),
        };
        assert!(err.to_string().contains("dev partition"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TrainerError>();
    }
}
