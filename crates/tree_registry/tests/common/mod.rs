//! Model fixtures shared by the registry tests

#![allow(dead_code)]

use treelens_core::{CompressedTree, NaDir, TreeSketch};
use treelens_registry::{ModelAlgorithm, ModelCategory, TreeModel};

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Two-level tree over `sepal_len` and `petal_wid`
pub fn iris_tree(offset: f32) -> CompressedTree {
    TreeSketch::numeric(
        0,
        5.5 + offset,
        NaDir::Left,
        TreeSketch::leaf(0.1).with_weight(30.0),
        TreeSketch::numeric(
            1,
            1.7,
            NaDir::Right,
            TreeSketch::leaf(-0.2).with_weight(25.0),
            TreeSketch::leaf(0.4).with_weight(45.0),
        ),
    )
    .encode()
    .unwrap()
}

fn iris_features() -> Vec<String> {
    strings(&["sepal_len", "petal_wid"])
}

/// Multinomial model with a single iteration of three class trees
pub fn iris_multinomial(id: &str) -> TreeModel {
    let trees = vec![vec![
        Some(iris_tree(0.0)),
        Some(iris_tree(0.5)),
        Some(iris_tree(1.0)),
    ]];
    TreeModel::new(
        id,
        ModelAlgorithm::Gbm,
        ModelCategory::multinomial(strings(&["setosa", "versicolor", "virginica"])),
        iris_features(),
        vec![None, None],
    )
    .with_trees(trees)
}

/// Binomial model over a categorical predictor, trees built for "NO" only
pub fn airline_binomial(id: &str, tree_count: usize) -> TreeModel {
    let tree = TreeSketch::categorical(
        0,
        vec![0, 2],
        NaDir::Right,
        TreeSketch::leaf(-0.3).with_weight(10.0),
        TreeSketch::leaf(0.6).with_weight(12.0),
    )
    .encode()
    .unwrap();
    TreeModel::new(
        id,
        ModelAlgorithm::Drf,
        ModelCategory::binomial(strings(&["NO", "YES"])),
        strings(&["Origin"]),
        vec![Some(strings(&["ATL", "BOS", "JFK"]))],
    )
    .with_trees(vec![vec![Some(tree)]; tree_count])
}

/// Regression model; its second tree slot was never built
pub fn cars_regression(id: &str) -> TreeModel {
    TreeModel::new(
        id,
        ModelAlgorithm::Gbm,
        ModelCategory::Regression,
        iris_features(),
        vec![None, None],
    )
    .with_trees(vec![vec![Some(iris_tree(0.0))], vec![None]])
}

pub fn linear_model(id: &str) -> TreeModel {
    TreeModel::new(
        id,
        ModelAlgorithm::Glm,
        ModelCategory::Regression,
        iris_features(),
        vec![None, None],
    )
}
