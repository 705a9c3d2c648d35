//! Decoded decision tree graph
//!
//! Nodes live in a flat vector indexed by [`NodeId`]; the root is always
//! node 0. Children are referenced by id, each node has zero or two children,
//! and every non-root node has exactly one parent.

use crate::errors::StructureError;
use crate::validate::NaInvariantViolation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a node inside one decoded tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which child of a split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Routing rule of an internal node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitCondition {
    /// Values strictly below the threshold go left
    Numeric { threshold: f32 },
    /// Listed category ids go left, every other category goes right
    Categorical { left_levels: Vec<u32> },
    /// Missing values go to the NA-inclusive side, observed values to the other
    NaVsRest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Index into the tree's feature names
    pub feature: usize,
    pub condition: SplitCondition,
}

impl Split {
    pub fn numeric(feature: usize, threshold: f32) -> Self {
        Self {
            feature,
            condition: SplitCondition::Numeric { threshold },
        }
    }

    pub fn categorical(feature: usize, mut left_levels: Vec<u32>) -> Self {
        left_levels.sort_unstable();
        left_levels.dedup();
        Self {
            feature,
            condition: SplitCondition::Categorical { left_levels },
        }
    }

    pub fn na_vs_rest(feature: usize) -> Self {
        Self {
            feature,
            condition: SplitCondition::NaVsRest,
        }
    }

    pub fn threshold(&self) -> Option<f32> {
        match self.condition {
            SplitCondition::Numeric { threshold } => Some(threshold),
            _ => None,
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.condition, SplitCondition::Categorical { .. })
    }
}

/// A node of a decoded tree (internal or leaf)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub depth: u32,
    /// `None` for leaves
    pub split: Option<Split>,
    /// Missing values of the split feature are routed to the left child
    pub na_left: bool,
    /// Missing values of the split feature are routed to the right child
    pub na_right: bool,
    /// Leaf value, or the aggregate prediction of an internal node
    pub prediction: f32,
    pub weight: Option<f32>,
    pub squared_error: Option<f32>,
}

impl TreeNode {
    /// Create a leaf node
    pub fn leaf(id: NodeId, prediction: f32) -> Self {
        Self {
            id,
            parent: None,
            left: None,
            right: None,
            depth: 0,
            split: None,
            na_left: false,
            na_right: false,
            prediction,
            weight: None,
            squared_error: None,
        }
    }

    /// Create an internal node; `na_left`/`na_right` start unset
    pub fn internal(id: NodeId, split: Split, left: NodeId, right: NodeId) -> Self {
        Self {
            id,
            parent: None,
            left: Some(left),
            right: Some(right),
            depth: 0,
            split: Some(split),
            na_left: false,
            na_right: false,
            prediction: 0.0,
            weight: None,
            squared_error: None,
        }
    }

    pub fn with_na(mut self, na_left: bool, na_right: bool) -> Self {
        self.na_left = na_left;
        self.na_right = na_right;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn child(&self, side: Side) -> Option<NodeId> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// Side receiving missing values, when exactly one side claims them
    pub fn na_side(&self) -> Option<Side> {
        match (self.na_left, self.na_right) {
            (true, false) => Some(Side::Left),
            (false, true) => Some(Side::Right),
            _ => None,
        }
    }
}

/// A fully navigable decision tree, with the feature names and categorical
/// domains it was decoded against
///
/// Deserialized trees go through [`DecodedTree::from_nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTree")]
pub struct DecodedTree {
    nodes: Vec<TreeNode>,
    feature_names: Vec<String>,
    domains: Vec<Option<Vec<String>>>,
    #[serde(skip)]
    na_findings: Vec<NaInvariantViolation>,
}

#[derive(Deserialize)]
struct RawTree {
    nodes: Vec<TreeNode>,
    feature_names: Vec<String>,
    domains: Vec<Option<Vec<String>>>,
}

impl TryFrom<RawTree> for DecodedTree {
    type Error = StructureError;

    fn try_from(raw: RawTree) -> Result<Self, StructureError> {
        DecodedTree::from_nodes(raw.nodes, raw.feature_names, raw.domains)
    }
}

impl DecodedTree {
    /// Build a tree from hand-made nodes, checking shape and index consistency.
    ///
    /// Parent links and depths are recomputed from the child references.
    pub fn from_nodes(
        mut nodes: Vec<TreeNode>,
        feature_names: Vec<String>,
        domains: Vec<Option<Vec<String>>>,
    ) -> Result<Self, StructureError> {
        if nodes.is_empty() {
            return Err(StructureError::Empty);
        }

        let count = nodes.len();
        let mut parent: Vec<Option<NodeId>> = vec![None; count];
        for (index, node) in nodes.iter().enumerate() {
            if node.id.index() != index {
                return Err(StructureError::IdMismatch { index, id: node.id });
            }
            match (node.left, node.right) {
                (None, None) => {
                    if node.split.is_some() {
                        return Err(StructureError::LeafWithSplit { node: node.id });
                    }
                }
                (Some(left), Some(right)) => {
                    let Some(split) = &node.split else {
                        return Err(StructureError::InternalWithoutSplit { node: node.id });
                    };
                    if split.feature >= feature_names.len() {
                        return Err(StructureError::UnknownFeature {
                            node: node.id,
                            feature: split.feature,
                        });
                    }
                    for child in [left, right] {
                        if child.index() >= count {
                            return Err(StructureError::DanglingChild {
                                node: node.id,
                                child,
                            });
                        }
                        if child == NodeId::ROOT || parent[child.index()].is_some() {
                            return Err(StructureError::SharedChild { child });
                        }
                        parent[child.index()] = Some(node.id);
                    }
                }
                _ => return Err(StructureError::SingleChild { node: node.id }),
            }
        }

        // Walk from the root; with single parents this also rules out cycles.
        let mut depth = vec![None; count];
        let mut stack = vec![(NodeId::ROOT, 0u32)];
        while let Some((id, d)) = stack.pop() {
            depth[id.index()] = Some(d);
            let node = &nodes[id.index()];
            if let (Some(left), Some(right)) = (node.left, node.right) {
                stack.push((right, d + 1));
                stack.push((left, d + 1));
            }
        }

        for (index, node) in nodes.iter_mut().enumerate() {
            node.parent = parent[index];
            node.depth = depth[index].ok_or(StructureError::Unreachable { node: node.id })?;
        }

        Ok(Self {
            nodes,
            feature_names,
            domains,
            na_findings: Vec::new(),
        })
    }

    /// Assemble a tree whose invariants the caller already guarantees
    pub(crate) fn from_parts(
        nodes: Vec<TreeNode>,
        feature_names: Vec<String>,
        domains: Vec<Option<Vec<String>>>,
    ) -> Self {
        Self {
            nodes,
            feature_names,
            domains,
            na_findings: Vec::new(),
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Number of nodes, leaves included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn max_depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Name of a feature, falling back to `C<index+1>` for unnamed columns
    pub fn feature_name(&self, feature: usize) -> String {
        self.feature_names
            .get(feature)
            .cloned()
            .unwrap_or_else(|| format!("C{}", feature + 1))
    }

    pub fn domain(&self, feature: usize) -> Option<&[String]> {
        self.domains.get(feature).and_then(|d| d.as_deref())
    }

    /// Label of a category, falling back to its numeric id
    pub fn level_label(&self, feature: usize, level: u32) -> String {
        self.domain(feature)
            .and_then(|d| d.get(level as usize))
            .cloned()
            .unwrap_or_else(|| level.to_string())
    }

    pub fn has_categorical_splits(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| n.split.as_ref().is_some_and(Split::is_categorical))
    }

    /// NA-routing findings recorded when decoding with NA checks enabled
    pub fn na_findings(&self) -> &[NaInvariantViolation] {
        &self.na_findings
    }

    pub(crate) fn set_na_findings(&mut self, findings: Vec<NaInvariantViolation>) {
        self.na_findings = findings;
    }
}
