//! Run configuration: which data set to use and how each node is trained.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cascade::Node;
use crate::dataset::HEMODYNAMIC_FEATURES;
use crate::grid_search::ParameterGrid;
use crate::partition::Shuffle;
use crate::support_vector_machine::SvcLearner;

/// Chooses the input/output file set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Bundled demonstration data with deterministic fold splitting.
    Example,
    Subject(u32),
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "example" | "0" => Ok(Selector::Example),
            other => other
                .parse::<u32>()
                .map(Selector::Subject)
                .map_err(|_| format!("expected a subject number or 'example', got '{other}'")),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Example => write!(f, "example"),
            Selector::Subject(subject) => write!(f, "subject {subject}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub features: PathBuf,
    pub labels: PathBuf,
    pub results: PathBuf,
}

impl DataPaths {
    pub fn resolve(root: &Path, selector: Selector) -> Self {
        match selector {
            Selector::Example => Self {
                features: root.join("example/data/example_data.csv"),
                labels: root.join("example/data/example_target.csv"),
                results: root.join("example/results/example_output.csv"),
            },
            Selector::Subject(subject) => Self {
                features: root.join(format!("data/subject{subject}_data.csv")),
                labels: root.join(format!("data/subject{subject}_target.csv")),
                results: root.join(format!("results/subject{subject}_output.csv")),
            },
        }
    }
}

/// Fold counts for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFolds {
    /// Hold-out split; about `1 / split` of the subset is held out.
    pub split: usize,
    /// Stratified cross-validation inside the grid search.
    pub training: usize,
}

/// Partitioning and search settings for training the cascade on an
/// in-memory dataset. The learner is passed separately.
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    pub top: NodeFolds,
    pub non_induced: NodeFolds,
    pub induced: NodeFolds,
    pub shuffle: Shuffle,
    pub grid: ParameterGrid,
}

impl Default for CascadeConfig {
    /// Split fold counts hold out about 15% of each subset.
    fn default() -> Self {
        Self {
            top: NodeFolds {
                split: 7,
                training: 7,
            },
            non_induced: NodeFolds {
                split: 5,
                training: 2,
            },
            induced: NodeFolds {
                split: 6,
                training: 5,
            },
            shuffle: Shuffle::Random,
            grid: ParameterGrid::default(),
        }
    }
}

impl CascadeConfig {
    pub fn folds(&self, node: Node) -> NodeFolds {
        match node {
            Node::Top => self.top,
            Node::NonInduced => self.non_induced,
            Node::Induced => self.induced,
        }
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: Shuffle) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn with_grid(mut self, grid: ParameterGrid) -> Self {
        self.grid = grid;
        self
    }

    #[must_use]
    pub fn with_folds(mut self, node: Node, folds: NodeFolds) -> Self {
        match node {
            Node::Top => self.top = folds,
            Node::NonInduced => self.non_induced = folds,
            Node::Induced => self.induced = folds,
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub selector: Selector,
    pub paths: DataPaths,
    pub expected_features: usize,
    pub cascade: CascadeConfig,
    pub learner: SvcLearner,
}

impl RunConfig {
    /// The example selector splits deterministically, subjects randomly.
    pub fn new(root: &Path, selector: Selector) -> Self {
        let shuffle = match selector {
            Selector::Example => Shuffle::Deterministic,
            Selector::Subject(_) => Shuffle::Random,
        };

        Self {
            selector,
            paths: DataPaths::resolve(root, selector),
            expected_features: HEMODYNAMIC_FEATURES,
            cascade: CascadeConfig::default().with_shuffle(shuffle),
            learner: SvcLearner::default(),
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.cascade.shuffle = Shuffle::from_seed(seed);
        self
    }
}
