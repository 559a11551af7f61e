/// Module that contains activation function implementations
pub mod activation;
/// Module that contains numeric backends and the fused LSTM kernel
pub mod backend;
/// Module that contains neural network layer implementations
pub mod layer;
/// Module that contains the traits observed by the graph engine
pub mod neural_network_trait;
/// Module that contains the operator-import boundary
pub mod operator;

pub use activation::*;
pub use backend::*;
pub use layer::*;
pub use operator::*;

use ndarray::ArrayD;

/// Type alias for n-dimensional arrays used as tensors in the neural network
pub type Tensor = ArrayD<f32>;

pub use crate::error::ModelError;
pub use neural_network_trait::Layer;
