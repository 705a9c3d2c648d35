//! Model metadata consumed by the resolver

use serde::{Deserialize, Serialize};
use std::fmt;
use treelens_core::CompressedTree;

/// Training algorithm that produced a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelAlgorithm {
    Gbm,
    Drf,
    IsolationForest,
    ExtendedIsolationForest,
    Glm,
    DeepLearning,
    KMeans,
}

impl ModelAlgorithm {
    /// Whether models of this kind store compressed trees
    pub fn is_tree_based(self) -> bool {
        matches!(
            self,
            ModelAlgorithm::Gbm
                | ModelAlgorithm::Drf
                | ModelAlgorithm::IsolationForest
                | ModelAlgorithm::ExtendedIsolationForest
        )
    }
}

/// What a model predicts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelCategory {
    Regression,
    /// Two-class response; trees are only built for `built_class`
    Binomial {
        domain: Vec<String>,
        built_class: String,
    },
    /// One tree per response level and iteration
    Multinomial { domain: Vec<String> },
    AnomalyDetection,
}

impl ModelCategory {
    /// Binomial category whose trees model the first response level
    pub fn binomial(domain: Vec<String>) -> Self {
        let built_class = domain.first().cloned().unwrap_or_default();
        ModelCategory::Binomial {
            domain,
            built_class,
        }
    }

    pub fn multinomial(domain: Vec<String>) -> Self {
        ModelCategory::Multinomial { domain }
    }

    /// Response levels, empty for non-categorical responses
    pub fn domain(&self) -> &[String] {
        match self {
            ModelCategory::Binomial { domain, .. } | ModelCategory::Multinomial { domain } => {
                domain
            }
            ModelCategory::Regression | ModelCategory::AnomalyDetection => &[],
        }
    }

    /// Number of class slots per tree index
    pub fn trees_per_iteration(&self) -> usize {
        match self {
            ModelCategory::Multinomial { domain } => domain.len().max(1),
            _ => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelCategory::Regression => "Regression",
            ModelCategory::Binomial { .. } => "Binomial",
            ModelCategory::Multinomial { .. } => "Multinomial",
            ModelCategory::AnomalyDetection => "AnomalyDetection",
        }
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A trained model as seen by the resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeModel {
    pub id: String,
    pub algorithm: ModelAlgorithm,
    pub category: ModelCategory,
    /// Predictor names, indexed by split column
    pub feature_names: Vec<String>,
    /// Categorical levels per predictor, `None` for numeric predictors
    pub domains: Vec<Option<Vec<String>>>,
    /// `trees[tree_index][class_index]`; a slot is empty when no tree was built
    pub trees: Vec<Vec<Option<CompressedTree>>>,
}

impl TreeModel {
    pub fn new(
        id: impl Into<String>,
        algorithm: ModelAlgorithm,
        category: ModelCategory,
        feature_names: Vec<String>,
        domains: Vec<Option<Vec<String>>>,
    ) -> Self {
        Self {
            id: id.into(),
            algorithm,
            category,
            feature_names,
            domains,
            trees: Vec::new(),
        }
    }

    /// Append one iteration of trees, one slot per class
    pub fn push_trees(&mut self, trees: Vec<Option<CompressedTree>>) {
        self.trees.push(trees);
    }

    pub fn with_trees(mut self, trees: Vec<Vec<Option<CompressedTree>>>) -> Self {
        self.trees = trees;
        self
    }

    /// Number of built tree indices
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn tree(&self, tree_index: usize, class_index: usize) -> Option<&CompressedTree> {
        self.trees
            .get(tree_index)
            .and_then(|classes| classes.get(class_index))
            .and_then(Option::as_ref)
    }

    /// Label of a class slot, empty for single-tree categories
    pub fn class_label(&self, class_index: usize) -> String {
        match &self.category {
            ModelCategory::Binomial { built_class, .. } => built_class.clone(),
            ModelCategory::Multinomial { domain } => {
                domain.get(class_index).cloned().unwrap_or_default()
            }
            ModelCategory::Regression | ModelCategory::AnomalyDetection => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_based_algorithms() {
        assert!(ModelAlgorithm::Gbm.is_tree_based());
        assert!(ModelAlgorithm::ExtendedIsolationForest.is_tree_based());
        assert!(!ModelAlgorithm::Glm.is_tree_based());
        assert!(!ModelAlgorithm::KMeans.is_tree_based());
    }

    #[test]
    fn test_binomial_builds_first_level() {
        let category = ModelCategory::binomial(vec!["NO".to_string(), "YES".to_string()]);
        assert_eq!(
            category,
            ModelCategory::Binomial {
                domain: vec!["NO".to_string(), "YES".to_string()],
                built_class: "NO".to_string(),
            }
        );
        assert_eq!(category.trees_per_iteration(), 1);
    }

    #[test]
    fn test_empty_slot() {
        let model = TreeModel::new(
            "m",
            ModelAlgorithm::Gbm,
            ModelCategory::multinomial(vec!["a".to_string(), "b".to_string()]),
            Vec::new(),
            Vec::new(),
        )
        .with_trees(vec![vec![None, None]]);
        assert_eq!(model.tree_count(), 1);
        assert!(model.tree(0, 1).is_none());
        assert!(model.tree(3, 0).is_none());
        assert_eq!(model.class_label(1), "b");
    }
}
