//! Static network weights: three dense layers (6 → 16 → 8 → 1), shipped as a
//! JSON resource keyed by layer index. Pre-trained offline; the runtime only
//! performs inference.

use crate::error::{EngineError, Result};
use crate::features::FEATURE_DIM;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Layer sizes, input first.
pub const LAYER_DIMS: [usize; 4] = [FEATURE_DIM, 16, 8, 1];

/// Serializable weight set. Matrix convention: `layer_N_weights[i][j]` maps
/// input index `i` to output index `j` (row-vector times matrix).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelWeights {
    pub layer_0_weights: Vec<Vec<f32>>,
    pub layer_0_bias: Vec<f32>,
    pub layer_1_weights: Vec<Vec<f32>>,
    pub layer_1_bias: Vec<f32>,
    pub layer_2_weights: Vec<Vec<f32>>,
    pub layer_2_bias: Vec<f32>,
}

impl ModelWeights {
    pub fn from_json(json: &str) -> Result<Self> {
        let w: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::Resource(format!("weight JSON parse error: {e}")))?;
        w.validate()?;
        Ok(w)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Resource(format!("weight file {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Check layer shapes against [`LAYER_DIMS`] and reject non-finite
    /// values. A mismatch here is a configuration error that must never
    /// reach the forward pass.
    pub fn validate(&self) -> Result<()> {
        let layers: [(&Vec<Vec<f32>>, &Vec<f32>); 3] = [
            (&self.layer_0_weights, &self.layer_0_bias),
            (&self.layer_1_weights, &self.layer_1_bias),
            (&self.layer_2_weights, &self.layer_2_bias),
        ];
        for (n, (weights, bias)) in layers.iter().enumerate() {
            let (rows, cols) = (LAYER_DIMS[n], LAYER_DIMS[n + 1]);
            if weights.len() != rows {
                return Err(EngineError::Resource(format!(
                    "layer {n}: expected {rows} weight rows, got {}",
                    weights.len()
                )));
            }
            for (i, row) in weights.iter().enumerate() {
                if row.len() != cols {
                    return Err(EngineError::Resource(format!(
                        "layer {n} row {i}: expected {cols} columns, got {}",
                        row.len()
                    )));
                }
                if let Some(v) = row.iter().find(|v| !v.is_finite()) {
                    return Err(EngineError::Resource(format!(
                        "layer {n} row {i}: non-finite weight {v}"
                    )));
                }
            }
            if bias.len() != cols {
                return Err(EngineError::Resource(format!(
                    "layer {n}: expected bias length {cols}, got {}",
                    bias.len()
                )));
            }
            if let Some(v) = bias.iter().find(|v| !v.is_finite()) {
                return Err(EngineError::Resource(format!(
                    "layer {n}: non-finite bias {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Built-in pre-trained weights, used when no model path is configured.
impl Default for ModelWeights {
    fn default() -> Self {
        Self {
            layer_0_weights: vec![
                vec![-0.5015, -0.4578, -0.4858, 0.5452, 0.5184, 0.8852, -0.7232, 0.6481, 0.4157, -0.2227, 0.3721, -0.0181, -0.6740, -1.0091, 0.7883, 0.6462],
                vec![-0.1626, 0.1201, -0.1596, -0.4831, -0.8132, 0.5633, 0.2512, -0.7722, 0.3661, -0.6418, -1.3412, 0.3360, 0.1352, -0.4577, -0.4458, -1.1373],
                vec![-0.4159, 0.1147, 0.0622, 0.1956, -0.7540, -0.1216, -0.1457, -0.0769, -0.6687, 0.4394, -0.6025, -0.5640, -0.2410, -0.2733, -0.1314, 0.5891],
                vec![0.8518, -0.4928, -0.3851, 0.9009, -0.4490, -0.3752, 0.1746, -0.6724, 0.1139, -0.6910, -0.6508, -0.8473, 0.3373, 1.4509, -0.6632, -0.1225],
                vec![0.0280, -0.1747, -0.8978, 0.0301, -1.1308, 0.3271, 0.2154, -0.5984, 0.0122, -0.8885, -0.4226, 0.5620, -0.3850, -0.1781, 0.2656, 0.1185],
                vec![0.3131, 0.1215, 0.1528, -0.3249, 0.9958, -0.3052, 0.5025, -0.4865, -0.6736, 0.3323, 0.9334, -0.8640, -0.8180, 0.3853, 0.4360, 0.6464],
            ],
            layer_0_bias: vec![
                -0.0389, 0.0555, -0.1623, 0.2164, -0.2305, -0.1696, 0.0744, 0.1933, -0.1730,
                -0.1490, 0.1525, 0.2393, 0.0989, -0.1502, 0.1043, 0.2870,
            ],
            layer_1_weights: vec![
                vec![-0.3090, -0.3086, 0.2556, 0.3977, -0.1195, -0.3502, 0.5583, 0.1074],
                vec![-0.2270, -0.2790, 0.4944, -0.1851, 0.1644, -0.8389, 0.0559, 0.3541],
                vec![-0.3813, 0.1508, -0.1532, -0.1772, 0.3047, -0.6438, 0.0642, 0.7666],
                vec![0.5546, 0.3319, -0.4424, 0.6735, -0.0811, 0.5076, -0.3459, -0.2325],
                vec![0.5316, 0.6388, -0.4097, -0.0110, -0.1320, -0.1586, 0.0060, 0.1375],
                vec![0.0736, -0.2808, -0.9426, -0.2105, -0.1716, -0.0943, 0.6379, -0.8073],
                vec![-0.5612, -0.0205, -0.3708, -0.4733, -0.0750, 0.0018, 0.6922, 0.9295],
                vec![0.5237, -0.3088, -0.7264, -0.6426, -0.0080, -0.0859, 0.0633, -0.2418],
                vec![0.0069, -0.6067, -0.1832, -0.7300, -0.7369, 0.1845, -0.3255, -0.6216],
                vec![0.4373, 0.0694, 0.0512, -0.1885, 0.3222, 0.5852, 0.4954, -0.3250],
                vec![0.1551, -0.1902, 0.0556, 0.1602, -0.8807, -0.2864, -0.2787, -0.1475],
                vec![0.1256, -0.0750, 0.1046, 0.7324, -0.2513, 0.4689, -0.2720, 0.0465],
                vec![0.7295, 0.3647, -0.2101, -0.3373, -0.0871, -0.0481, 0.5845, -0.2438],
                vec![0.1401, -0.0435, -0.1974, -0.0644, -0.2444, -0.3456, -0.0956, 0.5313],
                vec![-0.1482, 0.6250, 0.8194, 0.0362, -0.1236, 0.3855, 0.0403, -0.3684],
                vec![0.0055, -0.1432, 0.0083, -0.1392, 0.0561, -0.7525, -0.3022, -0.2954],
            ],
            layer_1_bias: vec![0.0811, 0.1560, -0.0436, -0.0851, 0.0869, 0.0433, 0.2096, -0.0450],
            layer_2_weights: vec![
                vec![0.0819],
                vec![-0.3723],
                vec![0.1543],
                vec![0.8699],
                vec![0.4045],
                vec![0.2238],
                vec![0.0516],
                vec![0.1214],
            ],
            layer_2_bias: vec![0.3534],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_validate() {
        ModelWeights::default().validate().unwrap();
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let mut w = ModelWeights::default();
        w.layer_0_weights.pop();
        assert!(matches!(w.validate(), Err(EngineError::Resource(_))));

        let mut w = ModelWeights::default();
        w.layer_1_bias.push(0.0);
        assert!(w.validate().is_err());
    }

    #[test]
    fn non_finite_rejected() {
        let mut w = ModelWeights::default();
        w.layer_2_weights[0][0] = f32::NAN;
        assert!(w.validate().is_err());

        let mut w = ModelWeights::default();
        w.layer_0_bias[3] = f32::INFINITY;
        assert!(w.validate().is_err());
    }

    #[test]
    fn json_round_trip_keyed_by_layer() {
        let w = ModelWeights::default();
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("layer_0_weights"));
        assert!(json.contains("layer_2_bias"));
        let back = ModelWeights::from_json(&json).unwrap();
        assert_eq!(back.layer_2_bias, w.layer_2_bias);
    }

    #[test]
    fn missing_file_is_resource_error() {
        let err = ModelWeights::from_file(Path::new("nonexistent_weights.json")).unwrap_err();
        assert!(matches!(err, EngineError::Resource(_)));
    }
}
