//! Flattened, human-readable view of a decoded tree
//!
//! Nodes are listed in discovery order of a FIFO queue seeded with the root:
//! each dequeued node appends its left child, then its right child. Entry 0 is
//! therefore always the root, and the `left_children`/`right_children` arrays
//! hold node ids so a consumer can replay the same queue.
//!
//! State inherited from ancestors (levels that can still reach a node, the
//! accumulated decision path) travels with each queued entry.

use crate::scope::Scope;
use crate::tree::{DecodedTree, NodeId, Side, Split, SplitCondition, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Child sentinel in [`TreeProperties::left_children`] and `right_children`
pub const NO_CHILD: i32 = -1;

/// Largest tree for which [`PlainLanguageRules::Auto`] renders decision paths
pub const AUTO_PLAIN_LANGUAGE_MAX_NODES: usize = 1023;

/// Whether decision paths are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlainLanguageRules {
    /// Render for trees up to a node limit
    #[default]
    Auto,
    True,
    False,
}

impl PlainLanguageRules {
    /// Decide for a tree of `node_count` nodes
    pub fn resolve(self, node_count: usize, auto_max_nodes: usize) -> bool {
        match self {
            PlainLanguageRules::Auto => node_count <= auto_max_nodes,
            PlainLanguageRules::True => true,
            PlainLanguageRules::False => false,
        }
    }
}

impl fmt::Display for PlainLanguageRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlainLanguageRules::Auto => "auto",
            PlainLanguageRules::True => "true",
            PlainLanguageRules::False => "false",
        })
    }
}

impl FromStr for PlainLanguageRules {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(PlainLanguageRules::Auto),
            "true" => Ok(PlainLanguageRules::True),
            "false" => Ok(PlainLanguageRules::False),
            other => Err(format!(
                "invalid plain language rules '{other}', expected auto, true or false"
            )),
        }
    }
}

/// Per-node artifacts as parallel vectors, one entry per node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeProperties {
    pub root_node_id: u32,
    pub node_ids: Vec<u32>,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub descriptions: Vec<String>,
    pub thresholds: Vec<Option<f32>>,
    pub features: Vec<Option<String>>,
    /// Left-going levels that can reach the node, for categorical splits
    pub levels: Vec<Option<Vec<String>>>,
    pub nas: Vec<Option<String>>,
    pub predictions: Vec<f32>,
    pub decision_paths: Vec<Option<String>>,
    pub tree_decision_path: Option<String>,
}

impl TreeProperties {
    fn with_capacity(n: usize) -> Self {
        Self {
            root_node_id: NodeId::ROOT.0,
            node_ids: Vec::with_capacity(n),
            left_children: Vec::with_capacity(n),
            right_children: Vec::with_capacity(n),
            descriptions: Vec::with_capacity(n),
            thresholds: Vec::with_capacity(n),
            features: Vec::with_capacity(n),
            levels: Vec::with_capacity(n),
            nas: Vec::with_capacity(n),
            predictions: Vec::with_capacity(n),
            decision_paths: Vec::with_capacity(n),
            tree_decision_path: None,
        }
    }

    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    pub fn left_child(&self, entry: usize) -> Option<NodeId> {
        child_at(&self.left_children, entry)
    }

    pub fn right_child(&self, entry: usize) -> Option<NodeId> {
        child_at(&self.right_children, entry)
    }
}

fn child_at(children: &[i32], entry: usize) -> Option<NodeId> {
    children
        .get(entry)
        .and_then(|&c| u32::try_from(c).ok())
        .map(NodeId)
}

/// Describe a tree, resolving `Auto` against [`AUTO_PLAIN_LANGUAGE_MAX_NODES`]
pub fn describe(tree: &DecodedTree, rules: PlainLanguageRules) -> TreeProperties {
    describe_with_limit(tree, rules, AUTO_PLAIN_LANGUAGE_MAX_NODES)
}

/// Describe a tree with a custom node limit for `Auto`
pub fn describe_with_limit(
    tree: &DecodedTree,
    rules: PlainLanguageRules,
    auto_max_nodes: usize,
) -> TreeProperties {
    let plain = rules.resolve(tree.len(), auto_max_nodes);
    let mut props = TreeProperties::with_capacity(tree.len());
    // (left, right) branch conditions per internal node, by node id
    let mut conditions: Vec<Option<(String, String)>> = vec![None; tree.len()];

    let mut queue = VecDeque::new();
    queue.push_back(Entry {
        id: NodeId::ROOT,
        reach: Scope::new(),
        path: None,
    });

    while let Some(entry) = queue.pop_front() {
        let node = &tree.nodes()[entry.id.index()];
        props.node_ids.push(node.id.0);
        props.predictions.push(node.prediction);
        props.left_children.push(node.left.map_or(NO_CHILD, |c| c.0 as i32));
        props.right_children.push(node.right.map_or(NO_CHILD, |c| c.0 as i32));

        let mut description = match (&node.split, node.left, node.right) {
            (Some(split), Some(left), Some(right)) => {
                let routing = Routing::new(tree, split, &entry.reach);
                let col = tree.feature_name(split.feature);

                props.thresholds.push(split.threshold());
                props.features.push(Some(col.clone()));
                props
                    .levels
                    .push(routing.left.as_ref().map(|l| labels(tree, split.feature, l)));
                props.nas.push(node.na_side().map(|side| match side {
                    Side::Left => "LEFT".to_string(),
                    Side::Right => "RIGHT".to_string(),
                }));

                let branch_conditions = plain.then(|| {
                    (
                        condition(tree, split, node, Side::Left, &routing),
                        condition(tree, split, node, Side::Right, &routing),
                    )
                });
                for (child, side) in [(left, Side::Left), (right, Side::Right)] {
                    let path = branch_conditions.as_ref().map(|(l, r)| {
                        let cond = if side == Side::Left { l } else { r };
                        match &entry.path {
                            Some(parent) => format!("{parent} and {cond}"),
                            None => cond.clone(),
                        }
                    });
                    queue.push_back(Entry {
                        id: child,
                        reach: routing.child_reach(&entry.reach, split.feature, side),
                        path,
                    });
                }
                conditions[node.id.index()] = branch_conditions;

                split_description(tree, node, split, &col, left, right, &routing)
            }
            _ => {
                props.thresholds.push(None);
                props.features.push(None);
                props.levels.push(None);
                props.nas.push(None);
                format!(
                    "Leaf node has id {}. Predicted value at leaf node is {}.",
                    node.id, node.prediction
                )
            }
        };

        if let Some(weight) = node.weight {
            description.push_str(&format!(" Node weight is {weight}."));
        }
        if let Some(path) = &entry.path {
            description.push_str(&format!(" Decision path: {path}."));
        }
        props.descriptions.push(description);
        props.decision_paths.push(entry.path);
    }

    if plain {
        props.tree_decision_path = Some(render_tree(tree, &conditions));
    }
    props
}

struct Entry {
    id: NodeId,
    /// Levels of each categorical feature still able to reach this node
    reach: Scope<(usize, Rc<[u32]>)>,
    path: Option<String>,
}

/// How a split divides the levels that reach it
struct Routing {
    left: Option<Vec<u32>>,
    right: Option<Vec<u32>>,
}

impl Routing {
    fn new(tree: &DecodedTree, split: &Split, reach: &Scope<(usize, Rc<[u32]>)>) -> Self {
        let SplitCondition::Categorical { left_levels } = &split.condition else {
            return Self {
                left: None,
                right: None,
            };
        };

        let inherited: Vec<u32> = match reach.iter().find(|(f, _)| *f == split.feature) {
            Some((_, levels)) => levels.to_vec(),
            None => {
                let size = tree.domain(split.feature).map_or(0, |d| d.len());
                (0..size as u32).collect()
            }
        };
        let (left, right) = inherited
            .into_iter()
            .partition(|level| left_levels.binary_search(level).is_ok());
        Self {
            left: Some(left),
            right: Some(right),
        }
    }

    fn child_reach(
        &self,
        reach: &Scope<(usize, Rc<[u32]>)>,
        feature: usize,
        side: Side,
    ) -> Scope<(usize, Rc<[u32]>)> {
        let levels = match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        };
        match levels {
            Some(levels) => reach.push((feature, Rc::from(levels.as_slice()))),
            None => reach.clone(),
        }
    }
}

fn labels(tree: &DecodedTree, feature: usize, levels: &[u32]) -> Vec<String> {
    levels
        .iter()
        .map(|&l| tree.level_label(feature, l))
        .collect()
}

fn bracketed(tree: &DecodedTree, feature: usize, levels: &[u32]) -> String {
    format!("[{}]", labels(tree, feature, levels).join(", "))
}

fn split_description(
    tree: &DecodedTree,
    node: &TreeNode,
    split: &Split,
    col: &str,
    left: NodeId,
    right: NodeId,
    routing: &Routing,
) -> String {
    let mut text = format!("Node has id {} and splits on column '{}'.", node.id, col);
    match &split.condition {
        SplitCondition::Numeric { threshold } => text.push_str(&format!(
            " Values < {threshold} go to the left node (id {left}), \
             values >= {threshold} go to the right node (id {right})."
        )),
        SplitCondition::Categorical { .. } => {
            let left_levels = routing.left.as_deref().unwrap_or_default();
            let right_levels = routing.right.as_deref().unwrap_or_default();
            text.push_str(&format!(
                " Levels {} go to the left node (id {left}), levels {} go to the right node (id {right}).",
                bracketed(tree, split.feature, left_levels),
                bracketed(tree, split.feature, right_levels),
            ));
        }
        SplitCondition::NaVsRest => {
            let na_side = node.na_side().unwrap_or(Side::Left);
            let (na_id, other_id) = match na_side {
                Side::Left => (left, right),
                Side::Right => (right, left),
            };
            text.push_str(&format!(
                " Missing values go to the {} node (id {na_id}), \
                 all other values go to the {} node (id {other_id}).",
                na_side.as_str(),
                na_side.opposite().as_str(),
            ));
        }
    }
    if let Some(side) = node.na_side() {
        text.push_str(&format!(" NAs go to the {} node.", side.as_str()));
    }
    text
}

/// Condition satisfied by rows taking `side` at `node`
fn condition(
    tree: &DecodedTree,
    split: &Split,
    node: &TreeNode,
    side: Side,
    routing: &Routing,
) -> String {
    let col = tree.feature_name(split.feature);
    let base = match (&split.condition, side) {
        (SplitCondition::Numeric { threshold }, Side::Left) => format!("{col} < {threshold}"),
        (SplitCondition::Numeric { threshold }, Side::Right) => format!("{col} >= {threshold}"),
        (SplitCondition::Categorical { .. }, _) => {
            let levels = match side {
                Side::Left => routing.left.as_deref(),
                Side::Right => routing.right.as_deref(),
            };
            format!(
                "{col} in {}",
                bracketed(tree, split.feature, levels.unwrap_or_default())
            )
        }
        (SplitCondition::NaVsRest, _) => {
            let to_na = node.na_side().map_or(side == Side::Left, |s| s == side);
            let text = if to_na {
                format!("{col} is NA")
            } else {
                format!("{col} is not NA")
            };
            return format!("({text})");
        }
    };
    if node.na_side() == Some(side) {
        format!("({base} or {col} is NA)")
    } else {
        format!("({base})")
    }
}

enum Emit {
    Node(NodeId, usize),
    Line(String, usize),
}

/// Whole tree as nested `If ( .. ) { .. } Else { .. }` blocks
fn render_tree(tree: &DecodedTree, conditions: &[Option<(String, String)>]) -> String {
    let mut lines = Vec::new();
    let mut stack = vec![Emit::Node(NodeId::ROOT, 0)];

    while let Some(item) = stack.pop() {
        match item {
            Emit::Line(text, indent) => lines.push(format!("{}{text}", "  ".repeat(indent))),
            Emit::Node(id, indent) => {
                let node = &tree.nodes()[id.index()];
                match (node.left, node.right, &conditions[id.index()]) {
                    (Some(left), Some(right), Some((left_cond, _))) => {
                        stack.push(Emit::Line("}".to_string(), indent));
                        stack.push(Emit::Node(right, indent + 1));
                        stack.push(Emit::Line("} Else {".to_string(), indent));
                        stack.push(Emit::Node(left, indent + 1));
                        stack.push(Emit::Line(format!("If {left_cond} {{"), indent));
                    }
                    _ => lines.push(format!(
                        "{}Pred: {}",
                        "  ".repeat(indent),
                        node.prediction
                    )),
                }
            }
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["age".to_string(), "color".to_string()]
    }

    fn domains() -> Vec<Option<Vec<String>>> {
        vec![
            None,
            Some(vec!["red".to_string(), "green".to_string(), "blue".to_string()]),
        ]
    }

    /// color in [red] left (NAs right); right child splits color again
    fn nested_categorical() -> DecodedTree {
        let nodes = vec![
            TreeNode::internal(NodeId(0), Split::categorical(1, vec![0]), NodeId(1), NodeId(2))
                .with_na(false, true),
            TreeNode::leaf(NodeId(1), 1.0),
            TreeNode::internal(NodeId(2), Split::categorical(1, vec![0, 1]), NodeId(3), NodeId(4)),
            TreeNode::leaf(NodeId(3), 2.0),
            TreeNode::leaf(NodeId(4), 3.0),
        ];
        DecodedTree::from_nodes(nodes, names(), domains()).unwrap()
    }

    fn numeric_stump() -> DecodedTree {
        let nodes = vec![
            TreeNode::internal(NodeId(0), Split::numeric(0, 30.0), NodeId(1), NodeId(2))
                .with_na(true, false),
            TreeNode::leaf(NodeId(1), -1.0),
            TreeNode::leaf(NodeId(2), 1.0),
        ];
        DecodedTree::from_nodes(nodes, names(), domains()).unwrap()
    }

    #[test]
    fn test_numeric_description() {
        let props = describe(&numeric_stump(), PlainLanguageRules::False);
        assert_eq!(
            props.descriptions[0],
            "Node has id 0 and splits on column 'age'. Values < 30 go to the left node (id 1), \
             values >= 30 go to the right node (id 2). NAs go to the left node."
        );
        assert_eq!(
            props.descriptions[1],
            "Leaf node has id 1. Predicted value at leaf node is -1."
        );
        assert_eq!(props.thresholds, vec![Some(30.0), None, None]);
        assert_eq!(props.nas, vec![Some("LEFT".to_string()), None, None]);
        assert_eq!(props.left_children, vec![1, NO_CHILD, NO_CHILD]);
        assert!(props.decision_paths.iter().all(Option::is_none));
        assert!(props.tree_decision_path.is_none());
    }

    #[test]
    fn test_inherited_levels_can_be_empty() {
        let props = describe(&nested_categorical(), PlainLanguageRules::False);
        assert_eq!(props.levels[0], Some(vec!["red".to_string()]));
        // Only green and blue reach node 2, and red is the only extra left level
        assert_eq!(props.levels[2], Some(vec!["green".to_string()]));
        assert!(props.descriptions[2].contains("levels [blue] go to the right node"));

        let nodes = vec![
            TreeNode::internal(NodeId(0), Split::categorical(1, vec![0]), NodeId(1), NodeId(2))
                .with_na(false, true),
            TreeNode::internal(NodeId(1), Split::categorical(1, vec![1]), NodeId(3), NodeId(4))
                .with_na(true, false),
            TreeNode::leaf(NodeId(2), 0.0),
            TreeNode::leaf(NodeId(3), 1.0),
            TreeNode::leaf(NodeId(4), 2.0),
        ];
        let tree = DecodedTree::from_nodes(nodes, names(), domains()).unwrap();
        let props = describe(&tree, PlainLanguageRules::False);
        assert_eq!(props.levels[1], Some(Vec::new()));
        assert!(props.descriptions[1].contains("Levels [] go to the left node (id 3)"));
    }

    #[test]
    fn test_fifo_order_starts_at_root() {
        let props = describe(&nested_categorical(), PlainLanguageRules::False);
        assert_eq!(props.root_node_id, 0);
        assert_eq!(props.node_ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(props.right_child(0), Some(NodeId(2)));
        assert_eq!(props.left_child(1), None);
    }

    #[test]
    fn test_plain_language_paths() {
        let props = describe(&nested_categorical(), PlainLanguageRules::True);
        assert_eq!(props.decision_paths[0], None);
        assert_eq!(props.decision_paths[1].as_deref(), Some("(color in [red])"));
        assert_eq!(
            props.decision_paths[4].as_deref(),
            Some("(color in [green, blue] or color is NA) and (color in [blue])")
        );
        assert!(props.descriptions[3].ends_with(
            "Decision path: (color in [green, blue] or color is NA) and (color in [green])."
        ));
        assert_eq!(
            props.tree_decision_path.as_deref(),
            Some(
                "If (color in [red]) {\n  Pred: 1\n} Else {\n  If (color in [green]) {\n    Pred: 2\n  } Else {\n    Pred: 3\n  }\n}"
            )
        );
    }

    #[test]
    fn test_na_vs_rest_description() {
        let nodes = vec![
            TreeNode::internal(NodeId(0), Split::na_vs_rest(0), NodeId(1), NodeId(2))
                .with_na(false, true),
            TreeNode::leaf(NodeId(1), 0.0),
            TreeNode::leaf(NodeId(2), 1.0),
        ];
        let tree = DecodedTree::from_nodes(nodes, names(), domains()).unwrap();
        let props = describe(&tree, PlainLanguageRules::True);
        assert!(props.descriptions[0].contains(
            "Missing values go to the right node (id 2), all other values go to the left node (id 1)."
        ));
        assert_eq!(props.decision_paths[1].as_deref(), Some("(age is not NA)"));
        assert_eq!(props.decision_paths[2].as_deref(), Some("(age is NA)"));
    }

    #[test]
    fn test_auto_rules() {
        assert!(PlainLanguageRules::Auto.resolve(1023, AUTO_PLAIN_LANGUAGE_MAX_NODES));
        assert!(!PlainLanguageRules::Auto.resolve(1024, AUTO_PLAIN_LANGUAGE_MAX_NODES));
        let props = describe_with_limit(&numeric_stump(), PlainLanguageRules::Auto, 2);
        assert!(props.tree_decision_path.is_none());
        assert_eq!("TRUE".parse::<PlainLanguageRules>(), Ok(PlainLanguageRules::True));
        assert!("maybe".parse::<PlainLanguageRules>().is_err());
    }

    #[test]
    fn test_weight_suffix() {
        let mut nodes = vec![
            TreeNode::internal(NodeId(0), Split::numeric(0, 1.0), NodeId(1), NodeId(2))
                .with_na(true, false),
            TreeNode::leaf(NodeId(1), 0.0),
            TreeNode::leaf(NodeId(2), 1.0),
        ];
        nodes[1].weight = Some(12.0);
        let tree = DecodedTree::from_nodes(nodes, names(), domains()).unwrap();
        let props = describe(&tree, PlainLanguageRules::False);
        assert!(props.descriptions[1].ends_with(" Node weight is 12."));
    }
}
