//! Process-wide cache of loaded embedding models.
//!
//! At most one load happens per identifier even when several tasks ask for
//! the same model at once: lookups take the read lock, and a miss takes
//! that identifier's async load lock, re-checks, then loads. Loads of
//! different models proceed in parallel. Failed loads are not cached.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use marks_rag_core::catalog::EmbeddingModelDescriptor;
use marks_rag_core::embedding::{Embedder, EmbeddingLoader};

pub struct ModelCache {
    loader: Arc<dyn EmbeddingLoader>,
    models: RwLock<HashMap<&'static str, Arc<dyn Embedder>>>,
    load_locks: Mutex<HashMap<&'static str, Arc<tokio::sync::Mutex<()>>>>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn EmbeddingLoader>) -> Self {
        Self {
            loader,
            models: RwLock::new(HashMap::new()),
            load_locks: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, identifier: &str) -> Option<Arc<dyn Embedder>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .cloned()
    }

    /// Return the cached embedder for `model`, loading it on first use.
    pub async fn get_or_load(&self, model: &EmbeddingModelDescriptor) -> Result<Arc<dyn Embedder>> {
        if let Some(embedder) = self.cached(model.identifier) {
            return Ok(embedder);
        }

        let lock = self
            .load_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(model.identifier)
            .or_default()
            .clone();
        let _guard = lock.lock().await;
        if let Some(embedder) = self.cached(model.identifier) {
            return Ok(embedder);
        }

        tracing::debug!(model = model.identifier, "loading embedding model");
        let embedder = self.loader.load(model).await?;
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model.identifier, embedder.clone());
        Ok(embedder)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.cached(identifier).is_some()
    }

    pub fn len(&self) -> usize {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marks_rag_core::testing::HashLoader;
    use marks_rag_core::catalog;

    #[tokio::test]
    async fn test_loads_once_per_identifier() {
        let loader = Arc::new(HashLoader::new());
        let cache = Arc::new(ModelCache::new(loader.clone()));
        let model = catalog::find("bge-base-en-v1.5").unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_load(&model).await.map(|_| ()) })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        assert_eq!(loader.loads_of("bge-base-en-v1.5"), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("bge-base-en-v1.5"));
    }

    #[tokio::test]
    async fn test_failed_load_not_cached() {
        let loader = Arc::new(HashLoader::new().failing("bge-large-en-v1.5"));
        let cache = ModelCache::new(loader.clone());
        let model = catalog::find("bge-large-en-v1.5").unwrap();

        assert!(cache.get_or_load(&model).await.is_err());
        assert!(cache.get_or_load(&model).await.is_err());
        assert_eq!(loader.loads_of("bge-large-en-v1.5"), 2);
        assert!(cache.is_empty());
    }
}
