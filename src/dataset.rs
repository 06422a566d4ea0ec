use nalgebra::{DMatrix, DVector};

use crate::error::{Result, TandemError};

/// Number of hemodynamic measurements per example: mean deoxyhemoglobin
/// for nine voxels followed by mean oxyhemoglobin for the same voxels.
pub const HEMODYNAMIC_FEATURES: usize = 18;

/// Class label. The full problem uses 0..=3, cascade nodes use a pair of them.
pub type Label = u8;

/// Examples stored row-wise, with one label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: DMatrix<f64>,
    labels: Vec<Label>,
}

impl Dataset {
    pub fn new(features: DMatrix<f64>, labels: Vec<Label>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(TandemError::Input(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }

        Ok(Self { features, labels })
    }

    /// Builds a dataset from feature rows, rejecting ragged input.
    pub fn from_rows(rows: &[Vec<f64>], labels: Vec<Label>) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);

        if let Some(index) = rows.iter().position(|row| row.len() != width) {
            return Err(TandemError::Input(format!(
                "row {index} has {} features, expected {width}",
                rows[index].len()
            )));
        }

        let data: Vec<f64> = rows.iter().flatten().copied().collect();

        Self::new(DMatrix::from_row_slice(rows.len(), width, &data), labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> &DMatrix<f64> {
        &self.features
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Feature vector of one example.
    pub fn example(&self, index: usize) -> DVector<f64> {
        self.features.row(index).transpose()
    }

    /// Copies the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Keeps the examples accepted by `keep`, preserving order.
    pub fn filter(&self, keep: impl Fn(Label) -> bool) -> Self {
        let indices: Vec<usize> = (0..self.len()).filter(|&i| keep(self.labels[i])).collect();

        self.select(&indices)
    }

    pub fn relabel(&self, remap: impl Fn(Label) -> Label) -> Self {
        Self {
            features: self.features.clone(),
            labels: self.labels.iter().map(|&label| remap(label)).collect(),
        }
    }
}
