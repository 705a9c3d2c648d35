//! Missing-value routing checks
//!
//! At every internal node exactly one child must receive the missing values
//! of the split feature, unless an ancestor split on the same feature already
//! decided where they go. The set of such decided features is carried down
//! each path:
//!
//! - NAs go right at a node on feature `f`: the left subtree treats `f` as fixed.
//! - NAs go left: the right subtree treats `f` as fixed.
//! - The NA-inclusive subtree inherits the parent's set unchanged.
//!
//! A node splitting on a fixed feature must not claim NA inclusion at all.

use crate::scope::Scope;
use crate::tree::{DecodedTree, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ControlFlow;
use thiserror::Error;

/// Why a node breaks the NA routing rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NaViolationReason {
    BothChildrenInclusive,
    NeitherChildInclusive,
    FixedByAncestor,
}

impl fmt::Display for NaViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NaViolationReason::BothChildrenInclusive => "both children inclusive",
            NaViolationReason::NeitherChildInclusive => "neither child inclusive",
            NaViolationReason::FixedByAncestor => "NA direction already fixed by ancestor",
        };
        f.write_str(text)
    }
}

/// A node whose NA flags break the routing rule
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("NA routing violated at node {node} (feature {feature}): {reason}")]
pub struct NaInvariantViolation {
    pub node: NodeId,
    pub feature: usize,
    pub reason: NaViolationReason,
}

/// Check the whole tree, stopping at the first violation in depth-first order
pub fn validate(tree: &DecodedTree) -> Result<(), NaInvariantViolation> {
    let mut first = None;
    walk(tree, |violation| {
        first = Some(violation);
        ControlFlow::Break(())
    });
    match first {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}

/// All violations in depth-first order
pub fn find_violations(tree: &DecodedTree) -> Vec<NaInvariantViolation> {
    let mut found = Vec::new();
    walk(tree, |violation| {
        found.push(violation);
        ControlFlow::Continue(())
    });
    found
}

/// Number of internal nodes that send missing values to exactly one child
pub fn count_na_splits(tree: &DecodedTree) -> usize {
    tree.nodes()
        .iter()
        .filter(|n| !n.is_leaf() && n.na_side().is_some())
        .count()
}

fn walk<F>(tree: &DecodedTree, mut on_violation: F)
where
    F: FnMut(NaInvariantViolation) -> ControlFlow<()>,
{
    let mut stack: Vec<(NodeId, Scope<usize>)> = vec![(NodeId::ROOT, Scope::new())];

    while let Some((id, fixed)) = stack.pop() {
        let Some(node) = tree.node(id) else { continue };
        let (Some(split), Some(left), Some(right)) = (&node.split, node.left, node.right) else {
            continue;
        };

        let feature = split.feature;
        let already_fixed = fixed.iter().any(|&f| f == feature);
        let reason = if node.na_left && node.na_right {
            Some(NaViolationReason::BothChildrenInclusive)
        } else if already_fixed && (node.na_left || node.na_right) {
            Some(NaViolationReason::FixedByAncestor)
        } else if !already_fixed && !node.na_left && !node.na_right {
            Some(NaViolationReason::NeitherChildInclusive)
        } else {
            None
        };

        if let Some(reason) = reason {
            let violation = NaInvariantViolation {
                node: id,
                feature,
                reason,
            };
            if on_violation(violation).is_break() {
                return;
            }
        }

        let left_fixed = if node.na_right {
            fixed.push(feature)
        } else {
            fixed.clone()
        };
        let right_fixed = if node.na_left {
            fixed.push(feature)
        } else {
            fixed
        };

        stack.push((right, right_fixed));
        stack.push((left, left_fixed));
    }
}
