//! Serializable answer to a tree request

use serde::{Deserialize, Serialize};
use treelens_core::{NaInvariantViolation, TreeProperties};

/// One described tree, ready for the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeResponse {
    pub model_id: String,
    pub tree_number: i64,
    /// Resolved class label, empty for single-tree categories
    pub tree_class: String,
    pub root_node_id: u32,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub node_ids: Vec<u32>,
    pub descriptions: Vec<String>,
    pub thresholds: Vec<Option<f32>>,
    pub features: Vec<Option<String>>,
    pub levels: Vec<Option<Vec<String>>>,
    pub nas: Vec<Option<String>>,
    pub predictions: Vec<f32>,
    pub decision_paths: Vec<Option<String>>,
    pub tree_decision_path: Option<String>,
    /// NA routing findings, only collected when decode checks are on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub na_findings: Vec<NaInvariantViolation>,
}

impl TreeResponse {
    pub fn new(
        model_id: impl Into<String>,
        tree_number: i64,
        tree_class: impl Into<String>,
        props: TreeProperties,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            tree_number,
            tree_class: tree_class.into(),
            root_node_id: props.root_node_id,
            left_children: props.left_children,
            right_children: props.right_children,
            node_ids: props.node_ids,
            descriptions: props.descriptions,
            thresholds: props.thresholds,
            features: props.features,
            levels: props.levels,
            nas: props.nas,
            predictions: props.predictions,
            decision_paths: props.decision_paths,
            tree_decision_path: props.tree_decision_path,
            na_findings: Vec::new(),
        }
    }

    pub fn with_na_findings(mut self, findings: Vec<NaInvariantViolation>) -> Self {
        self.na_findings = findings;
        self
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
