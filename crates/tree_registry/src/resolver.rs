//! Tree request resolution
//!
//! A request is checked against the model in a fixed order; the first failed
//! check decides the error. Only then are the blobs decoded and described.

use crate::config::TreeLensConfig;
use crate::errors::{ResolveError, Result};
use crate::model::{ModelCategory, TreeModel};
use crate::response::TreeResponse;
use crate::store::ModelStore;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, instrument};
use treelens_core::{
    describe_with_limit, DecodeOptions, PlainLanguageRules, AUTO_PLAIN_LANGUAGE_MAX_NODES,
};

/// Which tree to describe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRequest {
    pub model_id: String,
    /// Tree index; negative values are rejected
    pub tree_number: i64,
    /// Response level selecting the class slot; empty selects the default
    pub tree_class: String,
    /// Falls back to the resolver default when unset
    pub plain_language_rules: Option<PlainLanguageRules>,
}

impl TreeRequest {
    pub fn new(model_id: impl Into<String>, tree_number: i64) -> Self {
        Self {
            model_id: model_id.into(),
            tree_number,
            tree_class: String::new(),
            plain_language_rules: None,
        }
    }

    pub fn with_class(mut self, tree_class: impl Into<String>) -> Self {
        self.tree_class = tree_class.into();
        self
    }

    pub fn with_plain_language(mut self, rules: PlainLanguageRules) -> Self {
        self.plain_language_rules = Some(rules);
        self
    }
}

/// Resolver defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub plain_language: PlainLanguageRules,
    pub auto_max_nodes: usize,
    pub decode: DecodeOptions,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            plain_language: PlainLanguageRules::Auto,
            auto_max_nodes: AUTO_PLAIN_LANGUAGE_MAX_NODES,
            decode: DecodeOptions::default(),
        }
    }
}

impl From<&TreeLensConfig> for ResolverOptions {
    fn from(config: &TreeLensConfig) -> Self {
        Self {
            plain_language: config.describe.plain_language,
            auto_max_nodes: config.describe.auto_max_nodes,
            decode: config.decode_options(),
        }
    }
}

/// Resolves tree requests against a model store
pub struct TreeResolver<S> {
    store: S,
    options: ResolverOptions,
}

/// A request that passed every check, with its class slot resolved
struct Selection {
    model: Arc<TreeModel>,
    class_index: usize,
    class_label: String,
}

impl<S: ModelStore> TreeResolver<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, ResolverOptions::default())
    }

    pub fn with_options(store: S, options: ResolverOptions) -> Self {
        Self { store, options }
    }

    pub fn from_config(store: S, config: &TreeLensConfig) -> Self {
        Self::with_options(store, ResolverOptions::from(config))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Validate a request, then decode and describe the selected tree
    #[instrument(skip(self, request), fields(model = %request.model_id, tree = request.tree_number))]
    pub fn resolve(&self, request: &TreeRequest) -> Result<TreeResponse> {
        let model = self.lookup(&request.model_id)?;
        check_tree_number(request.tree_number, model.tree_count())?;
        let selection = select(model, &request.tree_class)?;
        let rules = request
            .plain_language_rules
            .unwrap_or(self.options.plain_language);
        self.build(&selection, request.tree_number, rules)
    }

    /// Resolve many requests in parallel, keeping their order
    pub fn resolve_batch(&self, requests: &[TreeRequest]) -> Vec<Result<TreeResponse>> {
        requests.par_iter().map(|r| self.resolve(r)).collect()
    }

    /// Every tree of one model and class, decoded lazily one at a time
    ///
    /// Model-level checks run up front; each item is independent, so
    /// dropping the iterator stops the work between trees.
    pub fn trees<'a>(
        &'a self,
        model_id: &str,
        tree_class: &str,
        rules: Option<PlainLanguageRules>,
    ) -> Result<impl Iterator<Item = Result<TreeResponse>> + 'a> {
        let selection = select(self.lookup(model_id)?, tree_class)?;
        let rules = rules.unwrap_or(self.options.plain_language);
        let count = selection.model.tree_count() as i64;
        Ok((0..count).map(move |n| self.build(&selection, n, rules)))
    }

    /// Model lookup and kind checks
    fn lookup(&self, model_id: &str) -> Result<Arc<TreeModel>> {
        let model = self
            .store
            .lookup_model(model_id)
            .ok_or_else(|| ResolveError::ModelNotFound(model_id.to_string()))?;

        if !model.algorithm.is_tree_based() {
            return Err(ResolveError::NotTreeBased(model_id.to_string()));
        }
        Ok(model)
    }

    fn build(
        &self,
        selection: &Selection,
        tree_number: i64,
        rules: PlainLanguageRules,
    ) -> Result<TreeResponse> {
        let model = &selection.model;
        let compressed = model
            .tree(tree_number as usize, selection.class_index)
            .ok_or_else(|| ResolveError::TreeNotBuilt {
                tree_number,
                class: selection.class_label.clone(),
            })?;

        let tree = compressed
            .decode_with(&model.feature_names, &model.domains, &self.options.decode)
            .map_err(|source| ResolveError::Malformed {
                model_id: model.id.clone(),
                tree_number,
                source,
            })?;

        let props = describe_with_limit(&tree, rules, self.options.auto_max_nodes);
        debug!(
            model = %model.id,
            tree = tree_number,
            class = %selection.class_label,
            nodes = props.len(),
            "described tree"
        );

        Ok(
            TreeResponse::new(&model.id, tree_number, &selection.class_label, props)
                .with_na_findings(tree.na_findings().to_vec()),
        )
    }
}

fn select(model: Arc<TreeModel>, tree_class: &str) -> Result<Selection> {
    let class_index = resolve_class(&model.category, tree_class)?;
    let class_label = model.class_label(class_index);
    Ok(Selection {
        model,
        class_index,
        class_label,
    })
}

fn check_tree_number(tree_number: i64, tree_count: usize) -> Result<()> {
    if tree_number < 0 {
        return Err(ResolveError::InvalidTreeNumber(tree_number));
    }
    if tree_count == 0 {
        return Err(ResolveError::NoTreesBuilt(tree_number));
    }
    if tree_number as u64 >= tree_count as u64 {
        return Err(ResolveError::InvalidTreeIndex {
            index: tree_number,
            max: tree_count as i64 - 1,
        });
    }
    Ok(())
}

/// Map a class selector to a class slot index
fn resolve_class(category: &ModelCategory, tree_class: &str) -> Result<usize> {
    match category {
        ModelCategory::Regression | ModelCategory::AnomalyDetection => {
            if tree_class.is_empty() {
                Ok(0)
            } else {
                Err(ResolveError::NoClassesForRegression(category.name().to_string()))
            }
        }
        ModelCategory::Binomial { built_class, .. } => {
            if tree_class.is_empty() || tree_class == built_class {
                Ok(0)
            } else {
                Err(ResolveError::WrongBinomialClass {
                    requested: tree_class.to_string(),
                    built: built_class.clone(),
                })
            }
        }
        ModelCategory::Multinomial { domain } => {
            if tree_class.is_empty() {
                return Ok(0);
            }
            domain
                .iter()
                .position(|level| level == tree_class)
                .ok_or_else(|| ResolveError::UnknownCategoricalLevel(tree_class.to_string()))
        }
    }
}
