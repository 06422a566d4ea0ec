//! The fixed three-node tandem cascade.
//!
//! The top node separates non-induced responses (labels 0 and 1) from induced
//! ones (labels 2 and 3). Each second-level node then resolves lie from truth
//! within its super-class. Inference walks a small state machine: every state
//! either names the next node to evaluate or carries the final label.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::dataset::Label;
use crate::model::Classifier;

pub const NON_INDUCED_LIE: Label = 0;
pub const NON_INDUCED_TRUTH: Label = 1;
pub const INDUCED_LIE: Label = 2;
pub const INDUCED_TRUTH: Label = 3;

/// Top-node labels.
pub const NON_INDUCED: Label = 0;
pub const INDUCED: Label = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    /// Non-induced vs induced.
    Top,
    /// Lie vs truth among non-induced responses.
    NonInduced,
    /// Lie vs truth among induced responses.
    Induced,
}

impl Node {
    pub const ALL: [Node; 3] = [Node::Top, Node::NonInduced, Node::Induced];

    /// Whether an example with the original `label` belongs to this node's subset.
    pub fn accepts(self, label: Label) -> bool {
        match self {
            Node::Top => true,
            Node::NonInduced => is_non_induced(label),
            Node::Induced => !is_non_induced(label),
        }
    }

    /// Label the node is trained on for an example with the original `label`.
    pub fn remap(self, label: Label) -> Label {
        match self {
            Node::Top => {
                if is_non_induced(label) {
                    NON_INDUCED
                } else {
                    INDUCED
                }
            }
            Node::NonInduced | Node::Induced => label,
        }
    }
}

fn is_non_induced(label: Label) -> bool {
    label == NON_INDUCED_LIE || label == NON_INDUCED_TRUTH
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Top => write!(f, "top node"),
            Node::NonInduced => write!(f, "non-induced node"),
            Node::Induced => write!(f, "induced node"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Evaluate(Node),
    Decided(Label),
}

impl Step {
    pub const START: Step = Step::Evaluate(Node::Top);
}

/// Next state after `node` produced `output`.
pub fn transition(node: Node, output: Label) -> Step {
    match node {
        Node::Top if output == NON_INDUCED => Step::Evaluate(Node::NonInduced),
        Node::Top => Step::Evaluate(Node::Induced),
        Node::NonInduced if output == NON_INDUCED_LIE => Step::Decided(NON_INDUCED_LIE),
        Node::NonInduced => Step::Decided(NON_INDUCED_TRUTH),
        Node::Induced if output == INDUCED_LIE => Step::Decided(INDUCED_LIE),
        Node::Induced => Step::Decided(INDUCED_TRUTH),
    }
}

/// Three trained binary classifiers arranged in tandem.
pub struct TandemClassifier<'a> {
    top: &'a dyn Classifier,
    non_induced: &'a dyn Classifier,
    induced: &'a dyn Classifier,
}

impl<'a> TandemClassifier<'a> {
    pub fn new(
        top: &'a dyn Classifier,
        non_induced: &'a dyn Classifier,
        induced: &'a dyn Classifier,
    ) -> Self {
        Self {
            top,
            non_induced,
            induced,
        }
    }

    fn model(&self, node: Node) -> &'a dyn Classifier {
        match node {
            Node::Top => self.top,
            Node::NonInduced => self.non_induced,
            Node::Induced => self.induced,
        }
    }

    pub fn classify(&self, features: &DVector<f64>) -> Label {
        let mut step = Step::START;

        loop {
            match step {
                Step::Decided(label) => return label,
                Step::Evaluate(node) => {
                    step = transition(node, self.model(node).predict(features));
                }
            }
        }
    }

    /// Classifies every row of `features`, in row order.
    pub fn predict(&self, features: &DMatrix<f64>) -> Vec<Label> {
        (0..features.nrows())
            .map(|i| self.classify(&features.row(i).transpose()))
            .collect()
    }
}
