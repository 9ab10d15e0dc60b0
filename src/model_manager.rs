use candle_core::{Device, Tensor};
use pylate_rs::ColBERT;

use crate::error::{Error, Result};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";
pub const MODEL_ENV_VAR: &str = "DOCQA_MODEL";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

pub(crate) fn model_error(e: impl std::fmt::Display) -> Error {
    Error::Model(e.to_string())
}

/// Pick the model to load: explicit setting, then `DOCQA_MODEL`, then
/// the built-in default.
pub fn resolve_model_id(configured: Option<&str>) -> String {
    let non_blank = |id: &String| !id.trim().is_empty();
    configured
        .map(str::to_string)
        .filter(non_blank)
        .or_else(|| std::env::var(MODEL_ENV_VAR).ok().filter(non_blank))
        .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string())
}

/// Manages the ColBERT model lifecycle, supporting lazy loading on first use.
pub struct ModelManager {
    model: Option<ColBERT>,
    model_id: String,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager {
    /// Creates a new `ModelManager` with the model resolved by
    /// [`resolve_model_id`] with nothing configured.
    ///
    /// The model is not loaded until the first call to `encode_documents`
    /// or `encode_query`.
    pub fn new() -> Self {
        Self::with_model_id(resolve_model_id(None))
    }

    /// Creates a `ModelManager` with an explicit model ID, bypassing
    /// environment variable resolution.
    pub fn with_model_id(model_id: String) -> Self {
        Self {
            model: None,
            model_id,
        }
    }

    /// Returns the model ID that will be (or has been) loaded.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns `true` if the model has already been loaded into memory.
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Ensures the model is loaded, downloading from HuggingFace Hub if needed.
    fn ensure_loaded(&mut self) -> Result<&mut ColBERT> {
        if self.model.is_none() {
            tracing::info!(model = %self.model_id, "loading embedding model");
            let colbert: ColBERT = ColBERT::from(&self.model_id)
                .with_device(default_device())
                .try_into()
                .map_err(model_error)?;
            self.model = Some(colbert);
        }

        self.model
            .as_mut()
            .ok_or_else(|| Error::Model("model failed to load".to_string()))
    }

    /// Encodes texts into token-level embeddings of shape `[B, T, D]`.
    pub fn encode_documents(&mut self, texts: &[String]) -> Result<Tensor> {
        let model = self.ensure_loaded()?;
        model.encode(texts, false).map_err(model_error)
    }

    /// Encodes a query string into token-level embeddings of shape
    /// `[1, Q, D]`.
    pub fn encode_query(&mut self, query: &str) -> Result<Tensor> {
        let model = self.ensure_loaded()?;
        model
            .encode(&[query.to_string()], true)
            .map_err(model_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_model_id() {
        let manager = ModelManager::with_model_id("custom/model".to_string());
        assert_eq!(manager.model_id(), "custom/model");
        assert!(!manager.is_loaded());
    }

    #[test]
    fn configured_model_wins() {
        assert_eq!(resolve_model_id(Some("local/model")), "local/model");
    }

    #[test]
    fn blank_configured_model_falls_back() {
        let resolved = resolve_model_id(Some("  "));
        assert!(!resolved.trim().is_empty());
    }
}
