//! Tree Registry for treelens
//!
//! Looks up trained tree models, validates tree requests against their
//! metadata and turns the selected compressed tree into a described,
//! serializable response.
//!
//! Modules:
//! - `model`: Model metadata (algorithm, category, blobs per tree and class)
//! - `store`: In-memory and file-backed model stores
//! - `resolver`: Request validation and tree resolution
//! - `response`: Wire shape of a described tree
//! - `config`: TOML configuration with environment overrides
//! - `errors`: Error types

pub mod config;
pub mod errors;
pub mod model;
pub mod resolver;
pub mod response;
pub mod store;

pub use config::TreeLensConfig;
pub use errors::{ConfigError, ResolveError, ResolveErrorKind, Result, StoreError};
pub use model::{ModelAlgorithm, ModelCategory, TreeModel};
pub use resolver::{ResolverOptions, TreeRequest, TreeResolver};
pub use response::TreeResponse;
pub use store::{FileModelStore, InMemoryModelStore, ModelFileFormat, ModelStore};
