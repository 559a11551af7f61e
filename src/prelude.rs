pub use crate::error::{IoError, ModelError};
pub use crate::neural_network::Tensor;
pub use crate::neural_network::activation::Activation;
pub use crate::neural_network::backend::*;
pub use crate::neural_network::layer::recurrent_layer::*;
pub use crate::neural_network::layer::regularization_layer::*;
pub use crate::neural_network::layer::serialize_weight::*;
pub use crate::neural_network::layer::{FullyConnected, Softmax};
pub use crate::neural_network::neural_network_trait::{ApplyWeights, Layer};
pub use crate::neural_network::operator::*;
