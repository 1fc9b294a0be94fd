//! Per-feature normalization applied before inference.

use crate::error::{EngineError, Result};
use crate::features::FEATURE_DIM;

/// Fixed scale/shift constants matching the training pipeline:
/// `scaled[i] = (raw[i] - shift[i]) * scale[i]`.
#[derive(Debug, Clone)]
pub struct Scaler {
    shift: Vec<f32>,
    scale: Vec<f32>,
}

impl Default for Scaler {
    fn default() -> Self {
        // packet size, frequency, entropy, domain risk, deviation, reserved
        Self {
            shift: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            scale: vec![1.0 / 4096.0, 1.0 / 50.0, 1.0 / 6.0, 1.0 / 3.0, 1.0, 1.0],
        }
    }
}

impl Scaler {
    /// Construct from explicit parameters; both slices must cover every
    /// feature or the configuration is unusable.
    pub fn new(shift: Vec<f32>, scale: Vec<f32>) -> Result<Self> {
        if shift.len() != FEATURE_DIM || scale.len() != FEATURE_DIM {
            return Err(EngineError::Config(format!(
                "scaler parameters must have length {FEATURE_DIM}, got shift={} scale={}",
                shift.len(),
                scale.len()
            )));
        }
        Ok(Self { shift, scale })
    }

    pub fn apply(&self, raw: &[f32; FEATURE_DIM]) -> [f32; FEATURE_DIM] {
        let mut out = [0.0f32; FEATURE_DIM];
        for i in 0..FEATURE_DIM {
            out[i] = (raw[i] - self.shift[i]) * self.scale[i];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_shift_then_scale() {
        let s = Scaler::new(vec![1.0; FEATURE_DIM], vec![0.5; FEATURE_DIM]).unwrap();
        let out = s.apply(&[3.0, 1.0, 5.0, 1.0, 2.0, 1.0]);
        assert_eq!(out, [1.0, 0.0, 2.0, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn rejects_wrong_dimension() {
        let err = Scaler::new(vec![0.0; 4], vec![1.0; FEATURE_DIM]).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn default_covers_all_features() {
        let s = Scaler::default();
        let out = s.apply(&[4096.0, 50.0, 6.0, 4.0, 0.5, 0.0]);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[1] - 1.0).abs() < 1e-6);
        assert!((out[2] - 1.0).abs() < 1e-6);
        assert!((out[3] - 1.0).abs() < 1e-6);
        assert_eq!(out[4], 0.5);
    }
}
