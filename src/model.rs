use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::dataset::Label;
use crate::error::Result;

/// A fitted decision function.
pub trait Classifier {
    fn predict(&self, features: &DVector<f64>) -> Label;

    fn predict_all(&self, features: &DMatrix<f64>) -> Vec<Label> {
        (0..features.nrows())
            .map(|i| self.predict(&features.row(i).transpose()))
            .collect()
    }
}

/// Tunable parameters of a kernel margin classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperparameters {
    /// Soft-margin penalty (C).
    pub regularization: f64,
    /// RBF kernel scale (gamma).
    pub gamma: f64,
}

impl fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C={:e}, gamma={:e}", self.regularization, self.gamma)
    }
}

/// Fits a binary classifier for a fixed choice of hyperparameters.
///
/// `labels` holds exactly two distinct values; the fitted model answers with
/// one of them.
pub trait Learner {
    type Model: Classifier;

    fn fit(
        &self,
        hyperparameters: Hyperparameters,
        features: &DMatrix<f64>,
        labels: &[Label],
    ) -> Result<Self::Model>;
}
