//! Error types for the tree registry

use std::path::PathBuf;
use thiserror::Error;
use treelens_core::MalformedTreeError;

/// Errors returned while resolving a tree request
///
/// Messages are shown to callers as-is.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No model with the requested id
    #[error("Given model does not exist: {0}")]
    ModelNotFound(String),

    /// The model exists but holds no trees
    #[error("Given model is not tree-based.")]
    NotTreeBased(String),

    /// Negative tree number
    #[error("Invalid tree number: {0}. Tree number must be >= 0.")]
    InvalidTreeNumber(i64),

    /// Tree number past the last built tree
    #[error("Invalid tree index: {index}. Tree index must be in range [0, {max}].")]
    InvalidTreeIndex { index: i64, max: i64 },

    /// Any tree number on a model without trees
    #[error("Invalid tree index: {0}. Model has no trees built.")]
    NoTreesBuilt(i64),

    /// Class selector given for a model with a single tree per iteration
    #[error("There are no tree classes for {0}.")]
    NoClassesForRegression(String),

    /// Binomial models only build trees for one class
    #[error("For binomial, only one tree class has been built per each iteration: {built}")]
    WrongBinomialClass { requested: String, built: String },

    /// Class selector not in the response domain
    #[error("There is no such tree class. Given categorical level does not exist in response column: {0}")]
    UnknownCategoricalLevel(String),

    /// The (tree, class) slot is empty
    #[error("There is no tree built for tree index {tree_number} and class '{class}'.")]
    TreeNotBuilt { tree_number: i64, class: String },

    /// The stored blobs could not be decoded
    #[error("Tree {tree_number} of model {model_id} is malformed: {source}")]
    Malformed {
        model_id: String,
        tree_number: i64,
        source: MalformedTreeError,
    },
}

/// Discriminant of [`ResolveError`] for callers that branch on the kind only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveErrorKind {
    ModelNotFound,
    NotTreeBased,
    InvalidTreeNumber,
    InvalidTreeIndex,
    NoClassesForRegression,
    WrongBinomialClass,
    UnknownCategoricalLevel,
    TreeNotBuilt,
    Malformed,
}

impl ResolveError {
    pub fn kind(&self) -> ResolveErrorKind {
        match self {
            ResolveError::ModelNotFound(_) => ResolveErrorKind::ModelNotFound,
            ResolveError::NotTreeBased(_) => ResolveErrorKind::NotTreeBased,
            ResolveError::InvalidTreeNumber(_) => ResolveErrorKind::InvalidTreeNumber,
            ResolveError::InvalidTreeIndex { .. } | ResolveError::NoTreesBuilt(_) => {
                ResolveErrorKind::InvalidTreeIndex
            }
            ResolveError::NoClassesForRegression(_) => ResolveErrorKind::NoClassesForRegression,
            ResolveError::WrongBinomialClass { .. } => ResolveErrorKind::WrongBinomialClass,
            ResolveError::UnknownCategoricalLevel(_) => ResolveErrorKind::UnknownCategoricalLevel,
            ResolveError::TreeNotBuilt { .. } => ResolveErrorKind::TreeNotBuilt,
            ResolveError::Malformed { .. } => ResolveErrorKind::Malformed,
        }
    }
}

/// Errors raised by file-backed model stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Model directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("Invalid model id '{0}': ids must be plain file names")]
    InvalidModelId(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse JSON model {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to parse binary model {path}: {source}")]
    Bincode {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error("Model file {path} holds model '{found}', expected '{expected}'")]
    IdMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for tree resolution
pub type Result<T> = std::result::Result<T, ResolveError>;
