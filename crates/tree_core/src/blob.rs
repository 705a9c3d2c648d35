//! Compressed tree blob pair

use crate::decoder::{self, DecodeOptions};
use crate::errors::Result;
use crate::tree::DecodedTree;
use serde::{Deserialize, Serialize};

/// The two immutable blobs stored for one (tree index, class) slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedTree {
    /// Split structure and leaf values
    #[serde(with = "serde_bytes")]
    pub primary: Vec<u8>,
    /// Per-node weights, predictions and squared errors
    #[serde(with = "serde_bytes")]
    pub aux: Vec<u8>,
}

impl CompressedTree {
    pub fn new(primary: Vec<u8>, aux: Vec<u8>) -> Self {
        Self { primary, aux }
    }

    /// Total size of both blobs in bytes
    pub fn size_bytes(&self) -> usize {
        self.primary.len() + self.aux.len()
    }

    pub fn decode(
        &self,
        feature_names: &[String],
        domains: &[Option<Vec<String>>],
    ) -> Result<DecodedTree> {
        decoder::decode(&self.primary, &self.aux, feature_names, domains)
    }

    pub fn decode_with(
        &self,
        feature_names: &[String],
        domains: &[Option<Vec<String>>],
        options: &DecodeOptions,
    ) -> Result<DecodedTree> {
        decoder::decode_with(&self.primary, &self.aux, feature_names, domains, options)
    }
}
