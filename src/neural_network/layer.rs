pub use crate::error::{IoError, ModelError};
pub use crate::neural_network::Tensor;
pub use crate::neural_network::activation::Activation;
pub use crate::neural_network::neural_network_trait::{ApplyWeights, Layer};
use ndarray::{Array, Array1, Array2, ArrayView2, Axis, Ix2, s};
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::Uniform;
use std::sync::Arc;

/// Activation layers usable as standalone graph nodes
pub mod activation_layer;
/// Affine projection layer used for the gate projections
pub mod fully_connected;
/// Recurrent layers: the LSTM cell and its internal components
pub mod recurrent_layer;
/// Regularization layers
pub mod regularization_layer;
/// Serializable representations of layer weights and configuration
pub mod serialize_weight;

pub use activation_layer::*;
pub use fully_connected::*;
pub use recurrent_layer::*;
pub use regularization_layer::*;
pub use serialize_weight::*;
