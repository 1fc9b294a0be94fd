//! Static feed-forward model: weights, normalization, inference.

mod infer;
mod scaler;
mod weights;

pub use infer::Detector;
pub use scaler::Scaler;
pub use weights::{ModelWeights, LAYER_DIMS};
