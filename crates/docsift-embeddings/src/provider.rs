//! Lazily-initialized embedding capability.

use std::sync::Mutex;

use tracing::{info, warn};

use crate::backend::EmbeddingModel;
use crate::error::EmbeddingError;

type ModelLoader = Box<dyn Fn() -> Result<Box<dyn EmbeddingModel>, EmbeddingError> + Send + Sync>;

enum ProviderState {
    /// Load not yet succeeded; the loader runs again on the next call.
    Idle(ModelLoader),
    /// Model loaded; held for the rest of the process lifetime.
    Ready(Box<dyn EmbeddingModel>),
    /// Embeddings intentionally turned off.
    Disabled,
}

/// Embedding capability with deferred model initialization.
///
/// `embed` never fails: a load or inference problem is logged and reported
/// as `None`, which callers must treat as a routine outcome. The model is
/// loaded on first use; while the load has never succeeded, every call
/// retries it. Once loaded, the model is kept and only per-call inference
/// errors map to `None`.
pub struct EmbeddingProvider {
    state: Mutex<ProviderState>,
}

impl EmbeddingProvider {
    /// Create a provider that loads its model on first use.
    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn EmbeddingModel>, EmbeddingError> + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(ProviderState::Idle(Box::new(loader))),
        }
    }

    /// Create a provider around an already-constructed model.
    pub fn from_model(model: impl EmbeddingModel + 'static) -> Self {
        Self {
            state: Mutex::new(ProviderState::Ready(Box::new(model))),
        }
    }

    /// Create a provider that always reports embeddings as unavailable.
    pub fn disabled() -> Self {
        Self {
            state: Mutex::new(ProviderState::Disabled),
        }
    }

    /// Create a provider that lazily loads the ONNX model from `model_dir`.
    #[cfg(feature = "onnx")]
    pub fn onnx(model_dir: impl Into<std::path::PathBuf>) -> Self {
        let dir = model_dir.into();
        Self::with_loader(move || {
            crate::backend::onnx::OnnxEmbedder::load(&dir)
                .map(|model| Box::new(model) as Box<dyn EmbeddingModel>)
        })
    }

    /// Embed `text`, or report the embedding as unavailable.
    ///
    /// Holding the state lock across a first-use load serializes concurrent
    /// callers; the load itself is bounded by the caller's request timeout.
    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let state = std::mem::replace(&mut *guard, ProviderState::Disabled);
        let (state, result) = match state {
            ProviderState::Disabled => (ProviderState::Disabled, None),
            ProviderState::Ready(model) => {
                let result = run_embed(model.as_ref(), text);
                (ProviderState::Ready(model), result)
            }
            ProviderState::Idle(loader) => match loader() {
                Ok(model) => {
                    info!(dimension = model.dimension(), "embedding model ready");
                    let result = run_embed(model.as_ref(), text);
                    (ProviderState::Ready(model), result)
                }
                Err(e) => {
                    warn!(error = %e, "embedding model unavailable, continuing without embeddings");
                    (ProviderState::Idle(loader), None)
                }
            },
        };

        *guard = state;
        result
    }

    /// Whether the model has been loaded successfully.
    pub fn is_ready(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            ProviderState::Ready(_)
        )
    }
}

fn run_embed(model: &dyn EmbeddingModel, text: &str) -> Option<Vec<f32>> {
    match model.embed(text) {
        Ok(vector) => Some(vector),
        Err(e) => {
            warn!(error = %e, "embedding inference failed");
            None
        }
    }
}
