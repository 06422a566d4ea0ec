//! End-to-end run: partition, train the three nodes, classify in tandem,
//! score and save.

use std::time::{Duration, Instant};

use tracing::{info, info_span, warn};

use crate::cascade::{
    Node, TandemClassifier, INDUCED_LIE, INDUCED_TRUTH, NON_INDUCED_LIE, NON_INDUCED_TRUTH,
};
use crate::config::{CascadeConfig, RunConfig};
use crate::dataset::{Dataset, Label};
use crate::error::{Result, Stage};
use crate::grid_search::{GridSearch, TrainedModel};
use crate::model::{Classifier, Hyperparameters, Learner};
use crate::parse::{load_dataset, save_predictions};
use crate::partition::{holdout_split, node_subset};
use crate::scoring::misclassification_rate;

#[derive(Debug, Clone)]
pub struct NodeReport {
    pub node: Node,
    pub train_size: usize,
    pub test_size: usize,
    pub hyperparameters: Hyperparameters,
    pub validation_accuracy: f64,
    /// Misclassification percentage on the node's held-out portion.
    pub holdout_error: f64,
}

/// The three trained nodes of the cascade.
#[derive(Debug, Clone)]
pub struct TrainedCascade<M> {
    pub top: TrainedModel<M>,
    pub non_induced: TrainedModel<M>,
    pub induced: TrainedModel<M>,
}

impl<M: Classifier> TrainedCascade<M> {
    pub fn classifier(&self) -> TandemClassifier<'_> {
        TandemClassifier::new(&self.top, &self.non_induced, &self.induced)
    }
}

fn train_node<L>(
    dataset: &Dataset,
    node: Node,
    config: &CascadeConfig,
    learner: &L,
) -> Result<(TrainedModel<L::Model>, NodeReport)>
where
    L: Learner + Sync,
{
    let _span = info_span!("node", %node).entered();
    let folds = config.folds(node);

    let subset = node_subset(dataset, node);
    let split = holdout_split(&subset, folds.split, config.shuffle)
        .map_err(|err| err.in_stage(Stage::Partitioning(node)))?;

    info!(
        examples = subset.len(),
        train = split.train.len(),
        test = split.test.len(),
        "partitioned subset"
    );

    let trained = GridSearch::new(config.grid.clone(), folds.training)
        .fit(learner, &split.train)
        .map_err(|err| err.in_stage(Stage::Training(node)))?;

    let holdout_error = misclassification_rate(
        &trained.predict_all(split.test.features()),
        split.test.labels(),
    )
    .map_err(|err| err.in_stage(Stage::Scoring))?;

    info!(holdout_error, "node trained");

    let report = NodeReport {
        node,
        train_size: split.train.len(),
        test_size: split.test.len(),
        hyperparameters: trained.hyperparameters,
        validation_accuracy: trained.validation_accuracy,
        holdout_error,
    };

    Ok((trained, report))
}

/// Trains the three nodes in order, stopping at the first failure.
pub fn train_cascade<L>(
    dataset: &Dataset,
    config: &CascadeConfig,
    learner: &L,
) -> Result<(TrainedCascade<L::Model>, Vec<NodeReport>)>
where
    L: Learner + Sync,
{
    let (top, top_report) = train_node(dataset, Node::Top, config, learner)?;
    let (non_induced, non_induced_report) =
        train_node(dataset, Node::NonInduced, config, learner)?;
    let (induced, induced_report) = train_node(dataset, Node::Induced, config, learner)?;

    Ok((
        TrainedCascade {
            top,
            non_induced,
            induced,
        },
        vec![top_report, non_induced_report, induced_report],
    ))
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub predictions: Vec<Label>,
    /// Misclassification percentage over the whole dataset.
    pub error: f64,
    pub training_time: Duration,
    pub inference_time: Duration,
    pub nodes: Vec<NodeReport>,
}

/// Trains on `dataset` and classifies every example of it.
pub fn evaluate<L>(dataset: &Dataset, config: &CascadeConfig, learner: &L) -> Result<RunReport>
where
    L: Learner + Sync,
{
    let start = Instant::now();
    let (cascade, nodes) = train_cascade(dataset, config, learner)?;
    let training_time = start.elapsed();

    let start = Instant::now();
    let predictions = cascade.classifier().predict(dataset.features());
    let inference_time = start.elapsed();

    let error = misclassification_rate(&predictions, dataset.labels())
        .map_err(|err| err.in_stage(Stage::Scoring))?;

    Ok(RunReport {
        predictions,
        error,
        training_time,
        inference_time,
        nodes,
    })
}

/// Loads the selected files, evaluates, and writes the results file.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    let _span = info_span!("run", selector = %config.selector).entered();

    let dataset = load_dataset(
        &config.paths.features,
        &config.paths.labels,
        config.expected_features,
    )
    .map_err(|err| err.in_stage(Stage::Loading))?;

    info!(
        examples = dataset.len(),
        features = dataset.n_features(),
        shuffle = ?config.cascade.shuffle,
        "loaded dataset"
    );

    for label in [NON_INDUCED_LIE, NON_INDUCED_TRUTH, INDUCED_LIE, INDUCED_TRUTH] {
        if !dataset.labels().contains(&label) {
            warn!(label, "class absent from the labels file");
        }
    }

    let report = evaluate(&dataset, &config.cascade, &config.learner)?;

    save_predictions(&config.paths.results, &report.predictions)
        .map_err(|err| err.in_stage(Stage::Saving))?;

    info!(path = %config.paths.results.display(), "saved predictions");

    Ok(report)
}
