//! Forward-pass evaluation of the static feed-forward network.
//!
//! Weights are loaded lazily on first inference and memoized for the life of
//! the detector; concurrent first calls share a single in-flight load. A
//! failed load is not memoized, so a repaired resource is picked up on the
//! next call.

use super::weights::{ModelWeights, LAYER_DIMS};
use crate::error::{EngineError, Result};
use crate::features::FEATURE_DIM;
use ndarray::{Array1, Array2};
use std::path::PathBuf;
use tokio::sync::OnceCell;

struct CompiledModel {
    weights: Vec<Array2<f32>>,
    biases: Vec<Array1<f32>>,
}

impl CompiledModel {
    fn compile(w: &ModelWeights) -> Result<Self> {
        w.validate()?;
        let layers = [
            (&w.layer_0_weights, &w.layer_0_bias),
            (&w.layer_1_weights, &w.layer_1_bias),
            (&w.layer_2_weights, &w.layer_2_bias),
        ];
        let mut weights = Vec::with_capacity(3);
        let mut biases = Vec::with_capacity(3);
        for (n, (rows, bias)) in layers.iter().enumerate() {
            let (r, c) = (LAYER_DIMS[n], LAYER_DIMS[n + 1]);
            let flat: Vec<f32> = rows.iter().flatten().copied().collect();
            let matrix = Array2::from_shape_vec((r, c), flat)
                .map_err(|e| EngineError::Resource(format!("layer {n} shape: {e}")))?;
            weights.push(matrix);
            biases.push(Array1::from_vec((*bias).clone()));
        }
        Ok(Self { weights, biases })
    }

    /// Row-vector × matrix per layer; ReLU after layers 0 and 1, sigmoid on
    /// the single layer-2 output.
    fn forward(&self, input: &[f32; FEATURE_DIM]) -> f32 {
        let mut x = Array1::from_vec(input.to_vec());
        for layer in 0..2 {
            x = x.dot(&self.weights[layer]) + &self.biases[layer];
            x.mapv_inplace(|v| v.max(0.0));
        }
        let z = x.dot(&self.weights[2]) + &self.biases[2];
        sigmoid(z[0])
    }
}

/// Numerically stable logistic sigmoid.
fn sigmoid(z: f32) -> f32 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let ez = z.exp();
        ez / (1.0 + ez)
    }
}

/// Maliciousness scorer. One instance is shared process-wide; the weight
/// resource is read at most once.
pub struct Detector {
    path: Option<PathBuf>,
    model: OnceCell<CompiledModel>,
}

impl Detector {
    /// Detector backed by a weight file, or the built-in weights when no
    /// path is configured.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            model: OnceCell::new(),
        }
    }

    /// Detector with explicit weights, validated eagerly.
    pub fn with_weights(weights: ModelWeights) -> Result<Self> {
        let compiled = CompiledModel::compile(&weights)?;
        Ok(Self {
            path: None,
            model: OnceCell::new_with(Some(compiled)),
        })
    }

    async fn model(&self) -> Result<&CompiledModel> {
        self.model
            .get_or_try_init(|| async {
                let weights = match &self.path {
                    Some(path) => {
                        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                            EngineError::Resource(format!("weight file {}: {e}", path.display()))
                        })?;
                        ModelWeights::from_json(&content)?
                    }
                    None => ModelWeights::default(),
                };
                CompiledModel::compile(&weights)
            })
            .await
    }

    /// Score a scaled feature vector. Deterministic: identical input yields
    /// bit-for-bit identical output for fixed weights.
    pub async fn predict(&self, input: &[f32; FEATURE_DIM]) -> Result<f32> {
        Ok(self.model().await?.forward(input))
    }
}
