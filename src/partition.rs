//! Node subsets and the randomized hold-out split.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::cascade::Node;
use crate::dataset::Dataset;
use crate::error::{Result, TandemError};

/// Examples belonging to `node`, relabeled for its binary problem.
pub fn node_subset(dataset: &Dataset, node: Node) -> Dataset {
    dataset
        .filter(|label| node.accepts(label))
        .relabel(|label| node.remap(label))
}

/// How the examples are shuffled before being grouped into folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shuffle {
    /// Same permutation on every run.
    Deterministic,
    /// Fresh entropy on every call.
    Random,
}

impl Shuffle {
    /// Seed 0 selects the deterministic mode.
    pub fn from_seed(seed: u64) -> Self {
        if seed == 0 {
            Shuffle::Deterministic
        } else {
            Shuffle::Random
        }
    }

    fn rng(self) -> ChaCha8Rng {
        match self {
            Shuffle::Deterministic => ChaCha8Rng::seed_from_u64(0),
            Shuffle::Random => ChaCha8Rng::from_entropy(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FoldSplit {
    pub train: Dataset,
    pub test: Dataset,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Shuffles the examples into `folds` near-equal groups and holds out the
/// last group for testing, so roughly `1 / folds` of the set is held out.
pub fn holdout_split(dataset: &Dataset, folds: usize, shuffle: Shuffle) -> Result<FoldSplit> {
    let n_samples = dataset.len();

    if folds < 2 {
        return Err(TandemError::Configuration(format!(
            "fold count must be at least 2, got {folds}"
        )));
    }
    if folds > n_samples {
        return Err(TandemError::Configuration(format!(
            "fold count {folds} exceeds the {n_samples} available examples"
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut shuffle.rng());

    // earlier folds absorb the remainder, the last one has n / k examples
    let test_size = n_samples / folds;
    let test_indices = indices.split_off(n_samples - test_size);
    let train_indices = indices;

    Ok(FoldSplit {
        train: dataset.select(&train_indices),
        test: dataset.select(&test_indices),
        train_indices,
        test_indices,
    })
}
