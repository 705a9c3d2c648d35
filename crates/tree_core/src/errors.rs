//! Error types for the tree core

use crate::tree::NodeId;
use thiserror::Error;

/// Corruption or inconsistency found while decoding a compressed tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedTreeError {
    /// A read or forward offset points past the end of a blob
    #[error("Malformed tree: {blob} blob access at offset {offset} (+{needed} bytes) is outside its {len} bytes")]
    OutOfBounds {
        blob: BlobKind,
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// A child record does not start where its parent's offset says it does
    #[error("Malformed tree: node record expected at offset {expected} but reader is at {actual}")]
    OffsetMismatch { expected: usize, actual: usize },

    /// Bytes remain after the last node record
    #[error("Malformed tree: {blob} blob has {remaining} trailing bytes")]
    TrailingBytes { blob: BlobKind, remaining: usize },

    /// Reserved node-type bits are set
    #[error("Malformed tree: invalid node type 0x{node_type:02x} at offset {offset}")]
    InvalidNodeType { node_type: u8, offset: usize },

    /// NA direction byte is not one of the known values, or is missing on an NA-vs-rest split
    #[error("Malformed tree: invalid NA direction {value} at offset {offset}")]
    InvalidNaDirection { value: u8, offset: usize },

    /// A split refers to a feature that is not in the feature name list
    #[error("Malformed tree: split on feature {feature} but only {feature_count} features are known")]
    UnknownFeature { feature: usize, feature_count: usize },

    /// A categorical split refers to a feature without a categorical domain
    #[error("Malformed tree: categorical split on feature '{feature}' which has no domain")]
    MissingDomain { feature: String },

    /// A categorical split sends a category outside of the domain
    #[error("Malformed tree: category {category} of feature '{feature}' is outside its domain of {domain_size} levels")]
    CategoryOutOfDomain {
        feature: String,
        category: u32,
        domain_size: usize,
    },

    /// The auxiliary blob describes a different number of nodes
    #[error("Malformed tree: auxiliary blob describes {aux} nodes but primary blob has {primary}")]
    AuxNodeCountMismatch { primary: usize, aux: usize },

    /// An auxiliary record is missing, duplicated or refers to a leaf
    #[error("Malformed tree: auxiliary record for node {node}: {reason}")]
    AuxRecordMismatch { node: u32, reason: String },
}

/// Which of the two blobs of a compressed tree an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Primary,
    Auxiliary,
}

impl std::fmt::Display for BlobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobKind::Primary => f.write_str("primary"),
            BlobKind::Auxiliary => f.write_str("auxiliary"),
        }
    }
}

/// A tree that cannot be expressed in the compressed format
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Feature index {0} does not fit the 16-bit column field")]
    FeatureOutOfRange(usize),

    #[error("Category {0} does not fit a bitset split")]
    CategoryOutOfRange(u32),

    #[error("Subtree of {0} bytes is too large for a size field")]
    SubtreeTooLarge(usize),

    #[error("NA-vs-rest split on feature {0} needs an NA direction")]
    NaVsRestWithoutDirection(usize),

    #[error("Tree has {0} nodes, more than the auxiliary blob can count")]
    TooManyNodes(usize),
}

/// Shape or index inconsistency in a hand-built tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("Tree has no nodes")]
    Empty,

    #[error("Node at index {index} has id {id}; node ids must match their index")]
    IdMismatch { index: usize, id: NodeId },

    #[error("Node {node} has only one child")]
    SingleChild { node: NodeId },

    #[error("Node {node} refers to child {child} which does not exist")]
    DanglingChild { node: NodeId, child: NodeId },

    #[error("Node {child} is referenced as a child more than once")]
    SharedChild { child: NodeId },

    #[error("Node {node} is not reachable from the root")]
    Unreachable { node: NodeId },

    #[error("Leaf node {node} carries a split")]
    LeafWithSplit { node: NodeId },

    #[error("Internal node {node} has no split")]
    InternalWithoutSplit { node: NodeId },

    #[error("Node {node} splits on feature {feature} which has no name")]
    UnknownFeature { node: NodeId, feature: usize },
}

/// Result type for decoding operations
pub type Result<T> = std::result::Result<T, MalformedTreeError>;
