//! Compressed Decision Tree Core
//!
//! Reverses the dense two-blob tree encoding produced by tree-ensemble
//! trainers into a navigable graph, checks its missing-value routing and
//! derives flattened per-node descriptions for reporting layers.
//!
//! Modules:
//! - `format`: Byte layout of the primary and auxiliary blobs
//! - `decoder`: Single-pass blob decoder
//! - `encoder`: Blob writer, used by fixtures and model tooling
//! - `tree`: Decoded tree graph and hand-built tree checks
//! - `validate`: NA-routing validator
//! - `describe`: Node description generator
//! - `blob`: Compressed blob pair
//! - `errors`: Error types

pub mod blob;
pub mod decoder;
pub mod describe;
pub mod encoder;
pub mod errors;
pub mod format;
pub mod tree;
pub mod validate;

mod reader;
mod scope;

pub use blob::CompressedTree;
pub use decoder::{decode, decode_with, DecodeOptions};
pub use describe::{
    describe, describe_with_limit, PlainLanguageRules, TreeProperties,
    AUTO_PLAIN_LANGUAGE_MAX_NODES, NO_CHILD,
};
pub use encoder::{encode_tree, TreeSketch};
pub use errors::{BlobKind, EncodeError, MalformedTreeError, StructureError};
pub use format::NaDir;
pub use tree::{DecodedTree, NodeId, Side, Split, SplitCondition, TreeNode};
pub use validate::{
    count_na_splits, find_violations, validate, NaInvariantViolation, NaViolationReason,
};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
