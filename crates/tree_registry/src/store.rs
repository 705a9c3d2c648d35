//! Model lookup backends

use crate::errors::StoreError;
use crate::model::TreeModel;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Read-only lookup of trained models by id
pub trait ModelStore: Send + Sync {
    fn lookup_model(&self, model_id: &str) -> Option<Arc<TreeModel>>;

    /// Ids of every model the store can serve, sorted
    fn model_ids(&self) -> Vec<String>;
}

impl<S: ModelStore + ?Sized> ModelStore for Arc<S> {
    fn lookup_model(&self, model_id: &str) -> Option<Arc<TreeModel>> {
        (**self).lookup_model(model_id)
    }

    fn model_ids(&self) -> Vec<String> {
        (**self).model_ids()
    }
}

/// Models held in memory
#[derive(Default)]
pub struct InMemoryModelStore {
    models: RwLock<HashMap<String, Arc<TreeModel>>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a model, returning the one it replaces
    pub fn insert(&self, model: TreeModel) -> Option<Arc<TreeModel>> {
        let model = Arc::new(model);
        self.models.write().insert(model.id.clone(), model)
    }

    pub fn remove(&self, model_id: &str) -> Option<Arc<TreeModel>> {
        self.models.write().remove(model_id)
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

impl FromIterator<TreeModel> for InMemoryModelStore {
    fn from_iter<I: IntoIterator<Item = TreeModel>>(iter: I) -> Self {
        let store = Self::new();
        for model in iter {
            store.insert(model);
        }
        store
    }
}

impl ModelStore for InMemoryModelStore {
    fn lookup_model(&self, model_id: &str) -> Option<Arc<TreeModel>> {
        self.models.read().get(model_id).cloned()
    }

    fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// On-disk encoding of a model file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFileFormat {
    Json,
    Bincode,
}

impl ModelFileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ModelFileFormat::Json => "json",
            ModelFileFormat::Bincode => "bin",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(ModelFileFormat::Json),
            "bin" => Some(ModelFileFormat::Bincode),
            _ => None,
        }
    }
}

/// Models stored as `<id>.json` or `<id>.bin` files in one directory
///
/// Loaded models are memoized unless caching is turned off.
pub struct FileModelStore {
    directory: PathBuf,
    cache_models: bool,
    cache: RwLock<HashMap<String, Arc<TreeModel>>>,
}

impl FileModelStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self, StoreError> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.is_dir() {
            return Err(StoreError::MissingDirectory(directory));
        }
        Ok(Self {
            directory,
            cache_models: true,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn with_caching(mut self, cache_models: bool) -> Self {
        self.cache_models = cache_models;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, model_id: &str, format: ModelFileFormat) -> Result<PathBuf, StoreError> {
        let plain = !model_id.is_empty()
            && !model_id.starts_with('.')
            && !model_id.contains(['/', '\\']);
        if !plain {
            return Err(StoreError::InvalidModelId(model_id.to_string()));
        }
        Ok(self
            .directory
            .join(format!("{model_id}.{}", format.extension())))
    }

    /// Load a model, `Ok(None)` when no file exists for it
    pub fn load(&self, model_id: &str) -> Result<Option<Arc<TreeModel>>, StoreError> {
        if let Some(model) = self.cache.read().get(model_id) {
            debug!(model = model_id, "model served from cache");
            return Ok(Some(Arc::clone(model)));
        }

        for format in [ModelFileFormat::Json, ModelFileFormat::Bincode] {
            let path = self.path_for(model_id, format)?;
            if !path.is_file() {
                continue;
            }

            let model = read_model(&path, format)?;
            if model.id != model_id {
                return Err(StoreError::IdMismatch {
                    path,
                    expected: model_id.to_string(),
                    found: model.id,
                });
            }

            info!(
                model = model_id,
                trees = model.tree_count(),
                "Loaded model from {}",
                path.display()
            );
            let model = Arc::new(model);
            if self.cache_models {
                self.cache
                    .write()
                    .insert(model_id.to_string(), Arc::clone(&model));
            }
            return Ok(Some(model));
        }

        Ok(None)
    }

    /// Write a model file, replacing any cached copy
    pub fn save(&self, model: &TreeModel, format: ModelFileFormat) -> Result<PathBuf, StoreError> {
        let path = self.path_for(&model.id, format)?;
        let bytes = match format {
            ModelFileFormat::Json => {
                serde_json::to_vec_pretty(model).map_err(|source| StoreError::Json {
                    path: path.clone(),
                    source,
                })?
            }
            ModelFileFormat::Bincode => {
                bincode::serialize(model).map_err(|source| StoreError::Bincode {
                    path: path.clone(),
                    source,
                })?
            }
        };
        std::fs::write(&path, bytes).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        self.cache.write().remove(&model.id);

        info!(model = %model.id, "Saved model to {}", path.display());
        Ok(path)
    }

    /// Forget every memoized model
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.directory.clone(),
            source,
        };
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.directory).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let known = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(ModelFileFormat::from_extension)
                .is_some();
            if let (true, Some(stem)) = (known, path.file_stem().and_then(|s| s.to_str())) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

fn read_model(path: &Path, format: ModelFileFormat) -> Result<TreeModel, StoreError> {
    let bytes = std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match format {
        ModelFileFormat::Json => serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        }),
        ModelFileFormat::Bincode => {
            bincode::deserialize(&bytes).map_err(|source| StoreError::Bincode {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

impl ModelStore for FileModelStore {
    fn lookup_model(&self, model_id: &str) -> Option<Arc<TreeModel>> {
        match self.load(model_id) {
            Ok(model) => model,
            Err(e) => {
                warn!(model = model_id, "Failed to load model: {}", e);
                None
            }
        }
    }

    fn model_ids(&self) -> Vec<String> {
        self.list_ids().unwrap_or_else(|e| {
            warn!("Failed to list models: {}", e);
            Vec::new()
        })
    }
}
