//! Error types for the tandem classifier.

use std::fmt;

use thiserror::Error;

use crate::cascade::Node;

pub type Result<T> = std::result::Result<T, TandemError>;

#[derive(Error, Debug)]
pub enum TandemError {
    /// Missing or malformed feature/label file, or rows that do not line up.
    #[error("input error: {0}")]
    Input(String),

    /// Invalid fold counts, infeasible stratification, mismatched lengths.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying classifier could not be fitted.
    #[error("model error: {0}")]
    Model(String),

    #[error("failed to write results: {0}")]
    Output(String),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<TandemError>,
    },
}

/// The category of an error, looking through any stage tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Configuration,
    Model,
    Output,
}

impl TandemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TandemError::Input(_) => ErrorKind::Input,
            TandemError::Configuration(_) => ErrorKind::Configuration,
            TandemError::Model(_) => ErrorKind::Model,
            TandemError::Output(_) => ErrorKind::Output,
            TandemError::Stage { source, .. } => source.kind(),
        }
    }

    pub fn in_stage(self, stage: Stage) -> Self {
        TandemError::Stage {
            stage,
            source: Box::new(self),
        }
    }
}

/// Pipeline stage an error surfaced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Partitioning(Node),
    Training(Node),
    Inference,
    Scoring,
    Saving,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Loading => write!(f, "loading"),
            Stage::Partitioning(node) => write!(f, "partitioning for {node}"),
            Stage::Training(node) => write!(f, "training {node}"),
            Stage::Inference => write!(f, "tandem inference"),
            Stage::Scoring => write!(f, "scoring"),
            Stage::Saving => write!(f, "saving"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_looks_through_stage() {
        let err = TandemError::Configuration("k = 1".to_string())
            .in_stage(Stage::Partitioning(Node::Induced));

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(
            err.to_string(),
            "partitioning for induced node failed: configuration error: k = 1"
        );
    }
}
