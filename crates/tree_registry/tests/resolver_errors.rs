//! Resolver validation chain and its user-facing messages

mod common;

use common::*;
use treelens_core::{CompressedTree, PlainLanguageRules};
use treelens_registry::{
    InMemoryModelStore, ModelAlgorithm, ModelCategory, ResolveErrorKind, ResolverOptions,
    TreeModel, TreeRequest, TreeResolver,
};

fn resolver() -> TreeResolver<InMemoryModelStore> {
    let store: InMemoryModelStore = [
        iris_multinomial("iris_gbm"),
        airline_binomial("airlines_drf", 3),
        cars_regression("cars_gbm"),
        linear_model("cars_glm"),
    ]
    .into_iter()
    .collect();
    TreeResolver::new(store)
}

fn message(request: TreeRequest) -> String {
    resolver().resolve(&request).unwrap_err().to_string()
}

#[test]
fn test_model_not_found() {
    let err = resolver()
        .resolve(&TreeRequest::new("missing", 0))
        .unwrap_err();
    assert_eq!(err.kind(), ResolveErrorKind::ModelNotFound);
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn test_not_tree_based() {
    let msg = message(TreeRequest::new("cars_glm", 0));
    assert!(msg.contains("not tree-based"));
}

#[test]
fn test_negative_tree_number() {
    let msg = message(TreeRequest::new("iris_gbm", -1));
    assert_eq!(msg, "Invalid tree number: -1. Tree number must be >= 0.");
}

#[test]
fn test_tree_index_out_of_range() {
    let msg = message(TreeRequest::new("iris_gbm", 1).with_class("setosa"));
    assert_eq!(msg, "Invalid tree index: 1. Tree index must be in range [0, 0].");
}

#[test]
fn test_model_without_trees() {
    let empty = TreeModel::new(
        "untrained_gbm",
        ModelAlgorithm::Gbm,
        ModelCategory::Regression,
        vec!["x".to_string()],
        vec![None],
    );
    let resolver = TreeResolver::new([empty].into_iter().collect::<InMemoryModelStore>());
    let err = resolver
        .resolve(&TreeRequest::new("untrained_gbm", 0))
        .unwrap_err();
    assert_eq!(err.kind(), ResolveErrorKind::InvalidTreeIndex);
    assert_eq!(
        err.to_string(),
        "Invalid tree index: 0. Model has no trees built."
    );
    assert_eq!(resolver.trees("untrained_gbm", "", None).unwrap().count(), 0);
}

#[test]
fn test_index_checked_before_class() {
    let err = resolver()
        .resolve(&TreeRequest::new("iris_gbm", 5).with_class("NonExistingCategoricalLevel"))
        .unwrap_err();
    assert_eq!(err.kind(), ResolveErrorKind::InvalidTreeIndex);
}

#[test]
fn test_unknown_multinomial_class() {
    let msg = message(TreeRequest::new("iris_gbm", 0).with_class("NonExistingCategoricalLevel"));
    assert!(msg.contains("does not exist in response column"));
    assert!(msg.ends_with("NonExistingCategoricalLevel"));
}

#[test]
fn test_wrong_binomial_class_names_built_class() {
    let msg = message(TreeRequest::new("airlines_drf", 2).with_class("YES"));
    assert_eq!(
        msg,
        "For binomial, only one tree class has been built per each iteration: NO"
    );

    let resolver = resolver();
    let named = resolver
        .resolve(&TreeRequest::new("airlines_drf", 2).with_class("NO"))
        .unwrap();
    let unnamed = resolver
        .resolve(&TreeRequest::new("airlines_drf", 2))
        .unwrap();
    assert_eq!(named, unnamed);
    assert_eq!(named.tree_class, "NO");
}

#[test]
fn test_regression_rejects_class() {
    let msg = message(TreeRequest::new("cars_gbm", 0).with_class("NonExistingClass"));
    assert!(msg.contains("no tree classes for Regression"));
}

#[test]
fn test_tree_not_built() {
    let err = resolver()
        .resolve(&TreeRequest::new("cars_gbm", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ResolveErrorKind::TreeNotBuilt);
    assert_eq!(
        err.to_string(),
        "There is no tree built for tree index 1 and class ''."
    );
}

#[test]
fn test_malformed_blob_is_isolated() {
    let mut model: TreeModel = cars_regression("broken");
    model.trees[0][0] = Some(CompressedTree::new(vec![0x10, 0, 0], vec![]));
    let store: InMemoryModelStore = [model, cars_regression("cars_gbm")].into_iter().collect();
    let resolver = TreeResolver::new(store);

    let results = resolver.resolve_batch(&[
        TreeRequest::new("broken", 0),
        TreeRequest::new("cars_gbm", 0),
    ]);
    assert_eq!(results[0].as_ref().unwrap_err().kind(), ResolveErrorKind::Malformed);
    assert!(results[1].is_ok());
}

#[test]
fn test_multinomial_default_class() {
    let resolver = resolver();
    let response = resolver.resolve(&TreeRequest::new("iris_gbm", 0)).unwrap();
    assert_eq!(response.tree_class, "setosa");
    assert_eq!(response.thresholds[0], Some(5.5));

    let virginica = resolver
        .resolve(&TreeRequest::new("iris_gbm", 0).with_class("virginica"))
        .unwrap();
    assert_eq!(virginica.thresholds[0], Some(6.5));
}

#[test]
fn test_response_shape_and_idempotence() {
    let resolver = resolver();
    let request = TreeRequest::new("iris_gbm", 0)
        .with_class("versicolor")
        .with_plain_language(PlainLanguageRules::True);
    let first = resolver.resolve(&request).unwrap();
    let second = resolver.resolve(&request).unwrap();
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());

    assert_eq!(first.node_count(), 5);
    assert_eq!(first.root_node_id, 0);
    assert_eq!(first.left_children.len(), first.node_count());
    assert!(first.descriptions[0].starts_with("Node has id 0 and splits on column 'sepal_len'."));
    assert!(first.tree_decision_path.is_some());

    let json: serde_json::Value = serde_json::from_str(&first.to_json().unwrap()).unwrap();
    assert!(json.get("na_findings").is_none());
    assert_eq!(json["model_id"], "iris_gbm");
}

#[test]
fn test_auto_limit_from_options() {
    let store: InMemoryModelStore = [iris_multinomial("iris_gbm")].into_iter().collect();
    let options = ResolverOptions {
        auto_max_nodes: 3,
        ..ResolverOptions::default()
    };
    let resolver = TreeResolver::with_options(store, options);
    let response = resolver.resolve(&TreeRequest::new("iris_gbm", 0)).unwrap();
    assert!(response.tree_decision_path.is_none());
    assert!(response.decision_paths.iter().all(Option::is_none));
}

#[test]
fn test_lazy_tree_iteration() {
    let resolver = resolver();
    let trees: Vec<_> = resolver
        .trees("airlines_drf", "", None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(trees.len(), 3);
    assert_eq!(trees[2].tree_number, 2);

    let mut partial = resolver.trees("cars_gbm", "", None).unwrap();
    assert!(partial.next().unwrap().is_ok());
    assert_eq!(
        partial.next().unwrap().unwrap_err().kind(),
        ResolveErrorKind::TreeNotBuilt
    );

    assert!(resolver.trees("iris_gbm", "nope", None).is_err());
}
