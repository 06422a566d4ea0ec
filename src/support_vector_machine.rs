use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};

use crate::dataset::Label;
use crate::error::{Result, TandemError};
use crate::model::{Classifier, Hyperparameters, Learner};

const SUPPORT_THRESHOLD: f64 = 1e-8;

/// Soft-margin SVM with an RBF kernel, trained by simplified SMO.
/// Labels are +1/-1.
#[derive(Debug, Clone)]
pub struct SupportVectorMachine {
    gamma: f64,
    regularization: f64,
    error_tolerance: f64,
    max_iterations: usize,
    max_passes: usize,
    bias: f64,
    support_vectors: Option<DMatrix<f64>>,
    // alpha_i * y_i for each support vector
    support_coefficients: Option<DVector<f64>>,
}

impl SupportVectorMachine {
    pub fn new(
        gamma: f64,
        regularization: f64,
        tolerance: f64,
        max_iterations: usize,
        max_passes: usize,
    ) -> Self {
        Self {
            gamma,
            regularization,
            error_tolerance: tolerance,
            max_iterations,
            max_passes,
            bias: 0.0,
            support_vectors: None,
            support_coefficients: None,
        }
    }

    fn kernel_function(&self, first_sample: &DVector<f64>, second_sample: &DVector<f64>) -> f64 {
        (-self.gamma * (first_sample - second_sample).norm_squared()).exp()
    }

    fn kernel_matrix(&self, samples: &DMatrix<f64>) -> DMatrix<f64> {
        let rows: Vec<DVector<f64>> = (0..samples.nrows())
            .map(|i| samples.row(i).transpose())
            .collect();

        let n = rows.len();
        let mut kernel = DMatrix::zeros(n, n);
        for i in 0..n {
            kernel[(i, i)] = 1.0;
            for j in (i + 1)..n {
                let value = self.kernel_function(&rows[i], &rows[j]);
                kernel[(i, j)] = value;
                kernel[(j, i)] = value;
            }
        }

        kernel
    }

    fn get_error(
        &self,
        kernel: &DMatrix<f64>,
        labels: &DVector<f64>,
        alphas: &DVector<f64>,
        i: usize,
    ) -> f64 {
        let mut f_i = self.bias;
        for j in 0..labels.len() {
            if alphas[j] > 0.0 {
                f_i += alphas[j] * labels[j] * kernel[(i, j)];
            }
        }
        f_i - labels[i]
    }

    /// Number of full passes over the samples.
    #[allow(clippy::similar_names)]
    pub fn fit(&mut self, samples: &DMatrix<f64>, labels: &DVector<f64>) -> usize {
        let n = samples.nrows();
        let kernel = self.kernel_matrix(samples);
        let mut alphas = DVector::zeros(n);
        let mut iteration = 0;
        let mut passes = 0;

        self.bias = 0.0;

        while iteration < self.max_iterations && passes < self.max_passes {
            let mut alpha_pairs_changed = 0;
            passes += 1;

            for i in 0..n {
                let sample_error = self.get_error(&kernel, labels, &alphas, i);

                if (labels[i] * sample_error < -self.error_tolerance
                    && alphas[i] < self.regularization)
                    || (labels[i] * sample_error > self.error_tolerance && alphas[i] > 0.0)
                {
                    let j = (i + 1) % n;
                    if j == i {
                        continue;
                    }
                    let error_j = self.get_error(&kernel, labels, &alphas, j);

                    let prev_alpha_i = alphas[i];
                    let prev_alpha_j = alphas[j];

                    let (l, h) = if (labels[i] - labels[j]).abs() > f64::EPSILON {
                        (
                            f64::max(0.0, alphas[j] - alphas[i]),
                            f64::min(
                                self.regularization,
                                self.regularization + alphas[j] - alphas[i],
                            ),
                        )
                    } else {
                        (
                            f64::max(0.0, alphas[i] + alphas[j] - self.regularization),
                            f64::min(self.regularization, alphas[i] + alphas[j]),
                        )
                    };

                    if l >= h {
                        continue;
                    }

                    let eta = 2.0 * kernel[(i, j)] - kernel[(i, i)] - kernel[(j, j)];
                    if eta >= 0.0 {
                        continue;
                    }

                    alphas[j] -= labels[j] * (sample_error - error_j) / eta;
                    alphas[j] = alphas[j].clamp(l, h);

                    if (alphas[j] - prev_alpha_j).abs() < 1e-5 {
                        continue;
                    }

                    alphas[i] += labels[i] * labels[j] * (prev_alpha_j - alphas[j]);

                    let delta_i = labels[i] * (alphas[i] - prev_alpha_i);
                    let delta_j = labels[j] * (alphas[j] - prev_alpha_j);

                    let first_bias_candidate = self.bias
                        - sample_error
                        - delta_i * kernel[(i, i)]
                        - delta_j * kernel[(i, j)];
                    let second_bias_candidate = self.bias
                        - error_j
                        - delta_i * kernel[(i, j)]
                        - delta_j * kernel[(j, j)];

                    if 0.0 < alphas[i] && alphas[i] < self.regularization {
                        self.bias = first_bias_candidate;
                    } else if 0.0 < alphas[j] && alphas[j] < self.regularization {
                        self.bias = second_bias_candidate;
                    } else {
                        self.bias = f64::midpoint(first_bias_candidate, second_bias_candidate);
                    }

                    alpha_pairs_changed += 1;
                }
            }

            if alpha_pairs_changed == 0 {
                iteration += 1;
            } else {
                iteration = 0;
            }
        }

        let support_indices: Vec<usize> = (0..n)
            .filter(|&i| alphas[i] > SUPPORT_THRESHOLD)
            .collect();

        self.support_vectors = Some(samples.select_rows(&support_indices));
        self.support_coefficients = Some(DVector::from_iterator(
            support_indices.len(),
            support_indices.iter().map(|&i| alphas[i] * labels[i]),
        ));

        passes
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, DMatrix::nrows)
    }

    pub fn decision_function(&self, features: &DVector<f64>) -> f64 {
        let mut score = self.bias;

        if let (Some(support_vectors), Some(coefficients)) =
            (&self.support_vectors, &self.support_coefficients)
        {
            for i in 0..support_vectors.nrows() {
                score += coefficients[i]
                    * self.kernel_function(&support_vectors.row(i).transpose(), features);
            }
        }

        score
    }

    pub fn predict(&self, features: &DVector<f64>) -> f64 {
        if self.decision_function(features) >= 0.0 {
            1.0
        } else {
            -1.0
        }
    }
}

/// A fitted SVM answering in the labels it was trained on.
#[derive(Debug, Clone)]
pub struct SupportVectorClassifier {
    machine: SupportVectorMachine,
    negative: Label,
    positive: Label,
}

impl SupportVectorClassifier {
    pub fn classes(&self) -> (Label, Label) {
        (self.negative, self.positive)
    }

    pub fn machine(&self) -> &SupportVectorMachine {
        &self.machine
    }
}

impl Classifier for SupportVectorClassifier {
    fn predict(&self, features: &DVector<f64>) -> Label {
        if self.machine.predict(features) > 0.0 {
            self.positive
        } else {
            self.negative
        }
    }
}

/// Fits [`SupportVectorClassifier`]s. The smaller label maps to -1.
#[derive(Debug, Clone, Copy)]
pub struct SvcLearner {
    pub tolerance: f64,
    /// Consecutive passes without an update before stopping.
    pub max_iterations: usize,
    pub max_passes: usize,
}

impl Default for SvcLearner {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            max_iterations: 10,
            max_passes: 500,
        }
    }
}

impl Learner for SvcLearner {
    type Model = SupportVectorClassifier;

    fn fit(
        &self,
        hyperparameters: Hyperparameters,
        features: &DMatrix<f64>,
        labels: &[Label],
    ) -> Result<Self::Model> {
        if features.nrows() != labels.len() {
            return Err(TandemError::Model(format!(
                "{} training rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }

        let classes: Vec<Label> = labels
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let [negative, positive] = *classes.as_slice() else {
            return Err(TandemError::Model(format!(
                "binary training needs exactly two classes, found {classes:?}"
            )));
        };

        if !(hyperparameters.regularization > 0.0 && hyperparameters.gamma > 0.0) {
            return Err(TandemError::Model(format!(
                "hyperparameters must be positive ({hyperparameters})"
            )));
        }

        let signs = DVector::from_iterator(
            labels.len(),
            labels
                .iter()
                .map(|&label| if label == positive { 1.0 } else { -1.0 }),
        );

        let mut machine = SupportVectorMachine::new(
            hyperparameters.gamma,
            hyperparameters.regularization,
            self.tolerance,
            self.max_iterations,
            self.max_passes,
        );
        let passes = machine.fit(features, &signs);

        tracing::trace!(
            %hyperparameters,
            passes,
            support_vectors = machine.n_support_vectors(),
            "fitted svm"
        );

        Ok(SupportVectorClassifier {
            machine,
            negative,
            positive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters() -> (DMatrix<f64>, Vec<Label>) {
        let features = DMatrix::from_row_slice(
            8,
            2,
            &[
                0.0, 0.0, 0.2, 0.1, 0.1, 0.3, 0.3, 0.2, //
                3.0, 3.0, 3.2, 2.9, 2.8, 3.1, 3.1, 3.3,
            ],
        );

        (features, vec![2, 2, 2, 2, 3, 3, 3, 3])
    }

    const PARAMS: Hyperparameters = Hyperparameters {
        regularization: 10.0,
        gamma: 0.5,
    };

    #[test]
    fn test_svm_separates_clusters_with_original_labels() {
        let (features, labels) = two_clusters();
        let model = SvcLearner::default()
            .fit(PARAMS, &features, &labels)
            .unwrap();

        assert_eq!(model.classes(), (2, 3));
        assert_eq!(model.predict_all(&features), labels);
        assert!(model.machine().n_support_vectors() > 0);

        assert_eq!(model.predict(&DVector::from_vec(vec![0.1, 0.1])), 2);
        assert_eq!(model.predict(&DVector::from_vec(vec![3.0, 3.1])), 3);
    }

    #[test]
    fn test_svm_fit_is_deterministic() {
        let (features, labels) = two_clusters();
        let learner = SvcLearner::default();

        let first = learner.fit(PARAMS, &features, &labels).unwrap();
        let second = learner.fit(PARAMS, &features, &labels).unwrap();
        let probe = DVector::from_vec(vec![1.4, 1.6]);

        assert_eq!(
            first.machine().decision_function(&probe),
            second.machine().decision_function(&probe)
        );
    }

    #[test]
    fn test_single_class_is_a_model_error() {
        let (features, _) = two_clusters();
        let labels = vec![1; 8];

        let result = SvcLearner::default().fit(PARAMS, &features, &labels);

        assert!(matches!(result, Err(TandemError::Model(_))));
    }

    #[test]
    fn test_three_classes_is_a_model_error() {
        let (features, _) = two_clusters();
        let labels = vec![0, 0, 1, 1, 2, 2, 3, 3];

        let result = SvcLearner::default().fit(PARAMS, &features, &labels);

        assert!(matches!(result, Err(TandemError::Model(_))));
    }
}
