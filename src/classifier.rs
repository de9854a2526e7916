//! Default-probability classifier.
//!
//! The scoring pipeline talks to a [`Classifier`] trait object so the model
//! can be swapped or stubbed. The shipped implementation evaluates a
//! gradient-boosted tree ensemble exported as JSON (the XGBoost `dump`
//! layout: nested split nodes with `yes`/`no` node ids and leaf margins).

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// Predicts the probability that an applicant defaults.
pub trait Classifier: Send + Sync {
    /// Column names, in the order `predict_default_probability` expects.
    fn feature_names(&self) -> &[String];

    fn model_version(&self) -> &str;

    /// Returns P(default) in `[0, 1]` for one normalized feature vector.
    fn predict_default_probability(&self, features: &[f64]) -> Result<f64, ClassifierError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// Feature vector length does not match the model schema.
    SchemaMismatch { expected: usize, actual: usize },
    /// A feature value is NaN or infinite.
    InvalidFeature { name: String, value: f64 },
    /// The model produced something that is not a probability.
    InvalidProbability(f64),
    /// The artifact could not be read or is structurally invalid.
    Artifact(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierError::SchemaMismatch { expected, actual } => write!(
                f,
                "feature vector has {} columns, model expects {}",
                actual, expected
            ),
            ClassifierError::InvalidFeature { name, value } => {
                write!(f, "feature '{}' has non-finite value {}", name, value)
            }
            ClassifierError::InvalidProbability(p) => {
                write!(f, "classifier returned invalid probability {}", p)
            }
            ClassifierError::Artifact(msg) => write!(f, "model artifact error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

// ============ Artifact format ============

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    model_version: String,
    feature_names: Vec<String>,
    #[serde(default = "default_base_score")]
    base_score: f64,
    trees: Vec<DumpNode>,
}

fn default_base_score() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DumpNode {
    Split {
        nodeid: u32,
        split: String,
        split_condition: f64,
        yes: u32,
        no: u32,
        children: Vec<DumpNode>,
    },
    Leaf {
        nodeid: u32,
        leaf: f64,
    },
}

impl DumpNode {
    fn id(&self) -> u32 {
        match self {
            DumpNode::Split { nodeid, .. } | DumpNode::Leaf { nodeid, .. } => *nodeid,
        }
    }
}

// ============ Compiled trees ============

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
    },
    Leaf(f64),
}

/// One regression tree stored as a flat arena; index 0 is the root.
#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn compile(root: &DumpNode, columns: &HashMap<&str, usize>) -> Result<Self, ClassifierError> {
        let mut nodes = Vec::new();
        Self::push(root, columns, &mut nodes)?;
        Ok(Self { nodes })
    }

    fn push(
        node: &DumpNode,
        columns: &HashMap<&str, usize>,
        nodes: &mut Vec<Node>,
    ) -> Result<usize, ClassifierError> {
        let index = nodes.len();
        match node {
            DumpNode::Leaf { leaf, .. } => {
                nodes.push(Node::Leaf(*leaf));
            }
            DumpNode::Split {
                nodeid,
                split,
                split_condition,
                yes,
                no,
                children,
            } => {
                let feature = *columns.get(split.as_str()).ok_or_else(|| {
                    ClassifierError::Artifact(format!(
                        "node {} splits on unknown feature '{}'",
                        nodeid, split
                    ))
                })?;
                let yes_child = find_child(children, *yes, *nodeid)?;
                let no_child = find_child(children, *no, *nodeid)?;

                nodes.push(Node::Leaf(0.0));
                let yes_index = Self::push(yes_child, columns, nodes)?;
                let no_index = Self::push(no_child, columns, nodes)?;
                nodes[index] = Node::Split {
                    feature,
                    threshold: *split_condition,
                    yes: yes_index,
                    no: no_index,
                };
            }
        }
        Ok(index)
    }

    fn margin(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                } => {
                    index = if features[*feature] < *threshold { *yes } else { *no };
                }
            }
        }
    }
}

fn find_child(children: &[DumpNode], id: u32, parent: u32) -> Result<&DumpNode, ClassifierError> {
    children.iter().find(|c| c.id() == id).ok_or_else(|| {
        ClassifierError::Artifact(format!("node {} references missing child {}", parent, id))
    })
}

/// Gradient-boosted tree ensemble with a logistic link.
#[derive(Debug, Clone)]
pub struct TreeEnsembleClassifier {
    model_version: String,
    feature_names: Vec<String>,
    base_margin: f64,
    trees: Vec<Tree>,
}

impl TreeEnsembleClassifier {
    /// Loads and compiles an artifact from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::Artifact(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ClassifierError> {
        let artifact: ModelArtifact = serde_json::from_str(raw)
            .map_err(|e| ClassifierError::Artifact(format!("invalid artifact: {}", e)))?;

        if artifact.feature_names.is_empty() {
            return Err(ClassifierError::Artifact(
                "artifact declares no features".to_string(),
            ));
        }
        if !(artifact.base_score > 0.0 && artifact.base_score < 1.0) {
            return Err(ClassifierError::Artifact(format!(
                "base_score {} is outside (0, 1)",
                artifact.base_score
            )));
        }

        let columns: HashMap<&str, usize> = artifact
            .feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let trees = artifact
            .trees
            .iter()
            .map(|root| Tree::compile(root, &columns))
            .collect::<Result<Vec<_>, _>>()?;

        let base = artifact.base_score;
        Ok(Self {
            model_version: artifact.model_version,
            feature_names: artifact.feature_names,
            base_margin: (base / (1.0 - base)).ln(),
            trees,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for TreeEnsembleClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }

    fn predict_default_probability(&self, features: &[f64]) -> Result<f64, ClassifierError> {
        if features.len() != self.feature_names.len() {
            return Err(ClassifierError::SchemaMismatch {
                expected: self.feature_names.len(),
                actual: features.len(),
            });
        }
        if let Some((i, value)) = features.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ClassifierError::InvalidFeature {
                name: self.feature_names[i].clone(),
                value: *value,
            });
        }

        let margin = self.base_margin + self.trees.iter().map(|t| t.margin(features)).sum::<f64>();
        let probability = 1.0 / (1.0 + (-margin).exp());

        if !(0.0..=1.0).contains(&probability) {
            return Err(ClassifierError::InvalidProbability(probability));
        }
        Ok(probability)
    }
}
