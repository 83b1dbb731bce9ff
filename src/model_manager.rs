use std::{path::PathBuf, sync::Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::{
    embedding::{Embedder, normalize_l2},
    error::{Error, Result},
};

pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Manages the sentence embedding model lifecycle, loading it lazily on
/// first use. Downloads go to `cache_dir` when one is configured.
pub struct ModelManager {
    model: Mutex<Option<TextEmbedding>>,
    cache_dir: Option<PathBuf>,
    show_download_progress: bool,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelManager {
    /// The model is not loaded until the first call to `embed_batch` or
    /// `dimension`.
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            model: Mutex::new(None),
            cache_dir,
            show_download_progress: true,
        }
    }

    pub fn with_download_progress(mut self, show: bool) -> Self {
        self.show_download_progress = show;
        self
    }

    pub fn model_id(&self) -> &str {
        DEFAULT_MODEL_ID
    }

    /// Returns `true` if the model has already been loaded into memory.
    pub fn is_loaded(&self) -> bool {
        self.model.lock().map(|m| m.is_some()).unwrap_or(false)
    }

    fn with_model<T>(
        &self,
        f: impl FnOnce(&mut TextEmbedding) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self
            .model
            .lock()
            .map_err(|_| Error::Embedding("embedding model lock poisoned".into()))?;

        if guard.is_none() {
            tracing::info!("loading embedding model {DEFAULT_MODEL_ID}");
            let mut options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                .with_show_download_progress(self.show_download_progress);
            if let Some(dir) = &self.cache_dir {
                options = options.with_cache_dir(dir.clone());
            }
            let model = TextEmbedding::try_new(options)
                .map_err(|e| Error::Embedding(format!("cannot load model: {e}")))?;
            *guard = Some(model);
        }

        match guard.as_mut() {
            Some(model) => f(model),
            None => Err(Error::Embedding("embedding model not loaded".into())),
        }
    }
}

impl Embedder for ModelManager {
    fn model_name(&self) -> &str {
        self.model_id()
    }

    fn dimension(&self) -> Result<usize> {
        let sample = self.embed("test")?;
        Ok(sample.len())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = self.with_model(|model| {
            model
                .embed(texts.to_vec(), None)
                .map_err(|e| Error::Embedding(e.to_string()))
        })?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "model returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        vectors.iter_mut().for_each(|v| normalize_l2(v));
        Ok(vectors)
    }
}
