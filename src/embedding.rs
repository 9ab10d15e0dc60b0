//! Sentence embeddings for the dense index.

use std::sync::Mutex;

use candle_core::{DType, Tensor};

use crate::{
    error::{Error, Result},
    model_manager::{ModelManager, model_error},
};

/// Turns text into fixed-size vectors.
///
/// Implementations must be deterministic: the same text always maps to
/// the same vector, whatever else is in the batch, and all vectors from
/// one embedder have the same length.
pub trait Embedder: Send + Sync {
    /// Embed a single query.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of passages.
    ///
    /// The default implementation embeds each text on its own. Backends
    /// that batch natively should override it.
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_query(t)).collect()
    }

    /// Model name shown in logs.
    fn name(&self) -> &str;
}

/// Mean-pooled ColBERT token embeddings.
///
/// Queries keep their `[MASK]` expansion tokens in the mean, as ColBERT
/// scores with them; a query is always encoded alone, so its vector does
/// not depend on anything else.
///
/// The model is loaded on first use. Calls are serialized through a
/// mutex because the underlying model needs exclusive access.
pub struct ColbertEmbedder {
    model_id: String,
    manager: Mutex<ModelManager>,
}

impl ColbertEmbedder {
    pub fn new(model_id: String) -> Self {
        Self {
            manager: Mutex::new(ModelManager::with_model_id(model_id.clone())),
            model_id,
        }
    }

    fn with_manager<T>(
        &self,
        f: impl FnOnce(&mut ModelManager) -> Result<T>,
    ) -> Result<T> {
        let mut manager = self
            .manager
            .lock()
            .map_err(|_| Error::Model("embedding model lock poisoned".to_string()))?;
        f(&mut manager)
    }
}

impl Embedder for ColbertEmbedder {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = self.with_manager(|m| m.encode_query(text))?;
        mean_pool(&tokens)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model("model returned no embedding".to_string()))
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = self.with_manager(|m| m.encode_documents(texts))?;
        mean_pool(&tokens)
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}

/// Average `[B, T, D]` token embeddings into `B` vectors of length `D`.
///
/// The model zeroes padded and skip-listed positions, so all-zero rows
/// are left out of the mean. A text's vector is then the same whether it
/// was encoded alone or padded to a longer batch neighbour.
fn mean_pool(tokens: &Tensor) -> Result<Vec<Vec<f32>>> {
    let (_, _, dims) = tokens.dims3().map_err(|e| {
        Error::Model(format!("unexpected embedding tensor shape: {e}"))
    })?;
    let batch = tokens
        .to_dtype(DType::F32)
        .and_then(|t| t.to_vec3::<f32>())
        .map_err(model_error)?;

    Ok(batch
        .into_iter()
        .map(|rows| {
            let mut sum = vec![0.0f32; dims];
            let mut count = 0usize;
            for row in rows.iter().filter(|row| row.iter().any(|v| *v != 0.0)) {
                for (acc, v) in sum.iter_mut().zip(row) {
                    *acc += v;
                }
                count += 1;
            }
            if count > 0 {
                let n = count as f32;
                sum.iter_mut().for_each(|v| *v /= n);
            }
            sum
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    #[test]
    fn mean_pool_averages_tokens() {
        // 2 documents, 2 tokens, 3 dimensions; the zero row is padding
        let data: Vec<f32> = vec![
            1.0, 2.0, 3.0, 3.0, 4.0, 5.0, //
            0.0, 0.0, 0.0, 2.0, 2.0, 2.0,
        ];
        let tensor = Tensor::from_vec(data, (2, 2, 3), &Device::Cpu).unwrap();

        let pooled = mean_pool(&tensor).unwrap();
        assert_eq!(pooled, vec![vec![2.0, 3.0, 4.0], vec![2.0, 2.0, 2.0]]);
    }

    #[test]
    fn mean_pool_ignores_padding() {
        let alone =
            Tensor::from_vec(vec![1.0f32, 3.0, 3.0, 5.0], (1, 2, 2), &Device::Cpu)
                .unwrap();
        let padded = Tensor::from_vec(
            vec![1.0f32, 3.0, 3.0, 5.0, 0.0, 0.0, 0.0, 0.0],
            (1, 4, 2),
            &Device::Cpu,
        )
        .unwrap();
        assert_eq!(mean_pool(&alone).unwrap(), mean_pool(&padded).unwrap());
        assert_eq!(mean_pool(&alone).unwrap(), vec![vec![2.0, 4.0]]);
    }

    #[test]
    fn mean_pool_all_padding_is_zero_vector() {
        let tensor = Tensor::zeros((1, 3, 2), DType::F32, &Device::Cpu).unwrap();
        assert_eq!(mean_pool(&tensor).unwrap(), vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn mean_pool_rejects_wrong_rank() {
        let tensor =
            Tensor::from_vec(vec![1.0f32, 2.0], (2,), &Device::Cpu).unwrap();
        assert!(matches!(mean_pool(&tensor).unwrap_err(), Error::Model(_)));
    }

    #[test]
    fn colbert_embedder_is_lazy() {
        let embedder = ColbertEmbedder::new("custom/model".to_string());
        assert_eq!(embedder.name(), "custom/model");
        assert!(embedder.with_manager(|m| Ok(!m.is_loaded())).unwrap());
    }
}
