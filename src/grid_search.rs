//! Exhaustive hyperparameter search validated by stratified k-fold
//! cross-validation.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::DVector;
use rayon::prelude::*;

use crate::dataset::{Dataset, Label};
use crate::error::{Result, TandemError};
use crate::model::{Classifier, Hyperparameters, Learner};
use crate::scoring::correct_predictions;

/// Powers of ten from `10^lowest` to `10^highest`.
pub fn geometric(lowest: i32, highest: i32) -> Vec<f64> {
    (lowest..=highest).map(|exponent| 10f64.powi(exponent)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    pub regularization: Vec<f64>,
    pub gamma: Vec<f64>,
}

impl Default for ParameterGrid {
    /// C over 10^-2..10^8 and gamma over 10^-5..10^3, 99 combinations.
    fn default() -> Self {
        Self {
            regularization: geometric(-2, 8),
            gamma: geometric(-5, 3),
        }
    }
}

impl ParameterGrid {
    /// Every combination, regularization outer and gamma inner.
    pub fn combinations(&self) -> Vec<Hyperparameters> {
        self.regularization
            .iter()
            .flat_map(|&regularization| {
                self.gamma.iter().map(move |&gamma| Hyperparameters {
                    regularization,
                    gamma,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.regularization.len() * self.gamma.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validation folds that each keep the class proportions of `labels`.
///
/// Members of every class are dealt round-robin over the folds in their
/// original order, classes taken in ascending label order.
pub fn stratified_folds(labels: &[Label], folds: usize) -> Result<Vec<Vec<usize>>> {
    if folds < 2 {
        return Err(TandemError::Configuration(format!(
            "cross-validation needs at least 2 folds, got {folds}"
        )));
    }

    let mut classes: BTreeMap<Label, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        classes.entry(label).or_default().push(index);
    }

    if let Some((label, members)) = classes
        .iter()
        .min_by_key(|(_, members)| members.len())
        .filter(|(_, members)| members.len() < folds)
    {
        return Err(TandemError::Configuration(format!(
            "cannot stratify into {folds} folds: class {label} has only {} examples",
            members.len()
        )));
    }

    let mut result = vec![Vec::new(); folds];
    for members in classes.values() {
        for (position, &index) in members.iter().enumerate() {
            result[position % folds].push(index);
        }
    }
    for fold in &mut result {
        fold.sort_unstable();
    }

    Ok(result)
}

/// A classifier together with the search result that produced it.
#[derive(Debug, Clone)]
pub struct TrainedModel<M> {
    pub model: M,
    pub hyperparameters: Hyperparameters,
    /// Mean validation accuracy of the selected combination.
    pub validation_accuracy: f64,
}

impl<M: Classifier> Classifier for TrainedModel<M> {
    fn predict(&self, features: &DVector<f64>) -> Label {
        self.model.predict(features)
    }
}

#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: ParameterGrid,
    folds: usize,
}

impl GridSearch {
    pub fn new(grid: ParameterGrid, folds: usize) -> Self {
        Self { grid, folds }
    }

    /// Scores every combination, then refits the best one on all of `training`.
    pub fn fit<L>(&self, learner: &L, training: &Dataset) -> Result<TrainedModel<L::Model>>
    where
        L: Learner + Sync,
    {
        let distinct = training
            .labels()
            .iter()
            .collect::<BTreeSet<_>>()
            .len();
        if distinct != 2 {
            return Err(TandemError::Model(format!(
                "binary training subset has {distinct} distinct classes"
            )));
        }
        if self.grid.is_empty() {
            return Err(TandemError::Configuration(
                "hyperparameter grid is empty".to_string(),
            ));
        }

        let folds = stratified_folds(training.labels(), self.folds)?;
        let (scales, common) = fold_scales(&folds);
        let combinations = self.grid.combinations();

        let scores = combinations
            .par_iter()
            .map(|&hyperparameters| {
                cross_validate(learner, training, &folds, &scales, hyperparameters)
            })
            .collect::<Result<Vec<u64>>>()?;

        let denominator = (common * folds.len() as u64) as f64;
        let (best, score) = select_best(&scores);
        let hyperparameters = combinations[best];
        let validation_accuracy = score as f64 / denominator;

        let accuracies: Vec<f64> = scores.iter().map(|&score| score as f64 / denominator).collect();
        tracing::debug!(?accuracies, "grid scores");
        tracing::info!(
            %hyperparameters,
            validation_accuracy,
            combinations = combinations.len(),
            folds = self.folds,
            "selected hyperparameters"
        );

        let model = learner.fit(hyperparameters, training.features(), training.labels())?;

        Ok(TrainedModel {
            model,
            hyperparameters,
            validation_accuracy,
        })
    }
}

/// First index holding the highest score.
fn select_best(scores: &[u64]) -> (usize, u64) {
    let mut best = (0, 0);
    for (index, &score) in scores.iter().enumerate() {
        if score > best.1 {
            best = (index, score);
        }
    }
    best
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Puts every fold accuracy over the least common multiple of the fold
/// sizes. Returns the per-fold scale and that common denominator.
fn fold_scales(folds: &[Vec<usize>]) -> (Vec<u64>, u64) {
    let common = folds
        .iter()
        .map(|fold| fold.len() as u64)
        .fold(1, |lcm, size| lcm / gcd(lcm, size) * size);
    let scales = folds
        .iter()
        .map(|fold| common / fold.len() as u64)
        .collect();

    (scales, common)
}

/// Sum of the fold accuracies, each scaled to the common denominator.
/// Equal means compare equal.
fn cross_validate<L: Learner>(
    learner: &L,
    training: &Dataset,
    folds: &[Vec<usize>],
    scales: &[u64],
    hyperparameters: Hyperparameters,
) -> Result<u64> {
    let mut total = 0;

    for (fold_index, validation_indices) in folds.iter().enumerate() {
        let fit_indices: Vec<usize> = folds
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != fold_index)
            .flat_map(|(_, fold)| fold.iter().copied())
            .collect();

        let fit_set = training.select(&fit_indices);
        let validation = training.select(validation_indices);

        let model = learner.fit(hyperparameters, fit_set.features(), fit_set.labels())?;
        let correct =
            correct_predictions(&model.predict_all(validation.features()), validation.labels())?;
        total += correct as u64 * scales[fold_index];
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nalgebra::DMatrix;

    use super::*;
    use crate::support_vector_machine::SvcLearner;

    /// Threshold on the first feature; only the combination with
    /// `regularization == good` places the threshold correctly.
    struct ThresholdLearner {
        good: f64,
        fits: AtomicUsize,
    }

    struct Threshold {
        at: f64,
        below: Label,
        above: Label,
    }

    impl Classifier for Threshold {
        fn predict(&self, features: &DVector<f64>) -> Label {
            if features[0] < self.at {
                self.below
            } else {
                self.above
            }
        }
    }

    impl Learner for ThresholdLearner {
        type Model = Threshold;

        fn fit(
            &self,
            hyperparameters: Hyperparameters,
            _features: &DMatrix<f64>,
            labels: &[Label],
        ) -> Result<Threshold> {
            self.fits.fetch_add(1, Ordering::Relaxed);
            let below = *labels.iter().min().unwrap();
            let above = *labels.iter().max().unwrap();
            #[allow(clippy::float_cmp)]
            let at = if hyperparameters.regularization == self.good {
                5.0
            } else {
                100.0
            };

            Ok(Threshold { at, below, above })
        }
    }

    fn line_dataset() -> Dataset {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let labels = (0..10).map(|i| if i < 5 { 2 } else { 3 }).collect();

        Dataset::from_rows(&rows, labels).unwrap()
    }

    #[test]
    fn test_default_grid_shape() {
        let grid = ParameterGrid::default();
        let combinations = grid.combinations();

        assert_eq!(grid.regularization.len(), 11);
        assert_eq!(grid.gamma.len(), 9);
        assert_eq!(combinations.len(), 99);

        assert!((combinations[0].regularization - 1e-2).abs() < 1e-15);
        assert!((combinations[0].gamma - 1e-5).abs() < 1e-20);
        assert!((combinations[1].gamma - 1e-4).abs() < 1e-19);
        assert!((combinations[9].regularization - 1e-1).abs() < 1e-15);
        assert!((combinations[98].regularization - 1e8).abs() < 1e-6);
        assert!((combinations[98].gamma - 1e3).abs() < 1e-9);
    }

    #[test]
    fn test_stratified_folds_preserve_proportions() {
        let labels = [0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1];
        let folds = stratified_folds(&labels, 4).unwrap();

        assert_eq!(folds.len(), 4);
        for fold in &folds {
            let zeros = fold.iter().filter(|&&i| labels[i] == 0).count();
            let ones = fold.len() - zeros;
            assert_eq!((zeros, ones), (1, 2));
        }

        let mut all: Vec<usize> = folds.concat();
        all.sort_unstable();
        assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_infeasible_stratification_rejected() {
        let labels = [2, 2, 2, 2, 3, 3];

        assert!(stratified_folds(&labels, 2).is_ok());
        assert!(matches!(
            stratified_folds(&labels, 3),
            Err(TandemError::Configuration(_))
        ));
        assert!(matches!(
            stratified_folds(&labels, 1),
            Err(TandemError::Configuration(_))
        ));
    }

    #[test]
    fn test_search_picks_best_combination_and_refits() {
        let learner = ThresholdLearner {
            good: 1.0,
            fits: AtomicUsize::new(0),
        };
        let grid = ParameterGrid {
            regularization: vec![0.1, 1.0, 10.0],
            gamma: vec![0.5, 2.0],
        };

        let trained = GridSearch::new(grid, 5)
            .fit(&learner, &line_dataset())
            .unwrap();

        assert!((trained.hyperparameters.regularization - 1.0).abs() < f64::EPSILON);
        // both gammas tie; the first one in grid order wins
        assert!((trained.hyperparameters.gamma - 0.5).abs() < f64::EPSILON);
        assert!((trained.validation_accuracy - 1.0).abs() < f64::EPSILON);
        assert_eq!(learner.fits.load(Ordering::Relaxed), 6 * 5 + 1);
        assert_eq!(
            trained.predict_all(line_dataset().features()),
            line_dataset().labels()
        );
    }

    #[test]
    fn test_ties_resolve_to_first_in_grid_order() {
        assert_eq!(select_best(&[5, 9, 9, 1]), (1, 9));
        assert_eq!(select_best(&[7, 7]).0, 0);
        assert_eq!(select_best(&[0, 0, 0]).0, 0);
    }

    #[test]
    fn test_fold_scales_share_a_denominator() {
        let folds = vec![vec![0; 4], vec![0; 6], vec![0; 4]];

        assert_eq!(fold_scales(&folds), (vec![3, 2, 3], 12));
    }

    /// Labels 2 below index 15 and 3 from it; the examples listed in
    /// `wrong` get the other label.
    struct Flipping {
        wrong: Vec<usize>,
    }

    impl Classifier for Flipping {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        fn predict(&self, features: &DVector<f64>) -> Label {
            let index = features[0] as usize;
            let label = if index < 15 { 2 } else { 3 };
            if self.wrong.contains(&index) {
                5 - label
            } else {
                label
            }
        }
    }

    /// Regularization 1 misses one example of fold 1 and three of fold 2;
    /// any other value misses three of fold 1 and one of fold 2.
    struct FlippingLearner;

    impl Learner for FlippingLearner {
        type Model = Flipping;

        fn fit(
            &self,
            hyperparameters: Hyperparameters,
            _features: &DMatrix<f64>,
            _labels: &[Label],
        ) -> Result<Flipping> {
            #[allow(clippy::float_cmp)]
            let wrong = if hyperparameters.regularization == 1.0 {
                vec![1, 2, 5, 8]
            } else {
                vec![1, 4, 7, 2]
            };

            Ok(Flipping { wrong })
        }
    }

    #[test]
    fn test_equal_mean_accuracy_keeps_first_combination() {
        // example i lands in validation fold i % 3, ten per fold
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let labels = (0..30).map(|i| if i < 15 { 2 } else { 3 }).collect();
        let dataset = Dataset::from_rows(&rows, labels).unwrap();
        let grid = ParameterGrid {
            regularization: vec![1.0, 2.0],
            gamma: vec![1.0],
        };

        let trained = GridSearch::new(grid, 3).fit(&FlippingLearner, &dataset).unwrap();

        assert!((trained.hyperparameters.regularization - 1.0).abs() < f64::EPSILON);
        assert!((trained.validation_accuracy - 26.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_training_is_a_model_error() {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let dataset = Dataset::from_rows(&rows, vec![1; 6]).unwrap();

        let result =
            GridSearch::new(ParameterGrid::default(), 2).fit(&SvcLearner::default(), &dataset);

        assert!(matches!(result, Err(TandemError::Model(_))));
    }

    #[test]
    fn test_fold_count_above_class_size_rejected() {
        let result = GridSearch::new(ParameterGrid::default(), 6)
            .fit(&SvcLearner::default(), &line_dataset());

        assert!(matches!(result, Err(TandemError::Configuration(_))));
    }

    #[test]
    fn test_svm_search_on_separable_data() {
        let grid = ParameterGrid {
            regularization: geometric(-1, 1),
            gamma: geometric(-2, 0),
        };

        let trained = GridSearch::new(grid, 2)
            .fit(&SvcLearner::default(), &line_dataset())
            .unwrap();

        assert!(trained.validation_accuracy > 0.5);
        assert_eq!(trained.model.classes(), (2, 3));
    }
}
