use crate::error::{IoError, ModelError};
use crate::neural_network::Tensor;

/// Defines the interface a graph engine observes for every node.
///
/// The engine calls `reshape` whenever the input shape is first seen or changes, and
/// `run_once` for every forward pass. `forward` is the convenience entry point that does
/// both; recurrent layers override it to drive a whole sequence.
pub trait Layer: Send + Sync {
    /// Recomputes everything that depends on the input shape.
    ///
    /// # Parameters
    ///
    /// - `input_shape` - Shape of the tensor the next `run_once` calls will receive
    ///
    /// # Returns
    ///
    /// - `Ok(())` - The layer is ready to run on inputs of this shape
    /// - `Err(ModelError)` - The configuration is inconsistent with this shape
    fn reshape(&mut self, input_shape: &[usize]) -> Result<(), ModelError>;

    /// Runs one forward pass on an input whose shape was announced to `reshape`.
    ///
    /// # Parameters
    ///
    /// - `input` - The input tensor to the layer
    ///
    /// # Returns
    ///
    /// - `Ok(Tensor)` - The output tensor after forward computation
    /// - `Err(ModelError)` - If the layer encountered an error during processing
    fn run_once(&mut self, input: &Tensor) -> Result<Tensor, ModelError>;

    /// Reshapes for the given input and runs once.
    ///
    /// # Parameters
    ///
    /// - `input` - The input tensor to the layer
    ///
    /// # Returns
    ///
    /// - `Ok(Tensor)` - The output tensor after forward computation
    /// - `Err(ModelError)` - If either `reshape` or `run_once` failed
    fn forward(&mut self, input: &Tensor) -> Result<Tensor, ModelError> {
        self.reshape(input.shape())?;
        self.run_once(input)
    }

    /// Returns the type name of the layer (e.g. "LSTM").
    fn layer_type(&self) -> &str {
        "Unknown"
    }

    /// Returns a description of the output shape of the layer.
    fn output_shape(&self) -> String {
        "Unknown".to_string()
    }

    /// Returns the total number of parameters held by the layer.
    fn param_count(&self) -> usize {
        0
    }

    /// Sets the training mode if the layer is mode-dependent.
    ///
    /// # Parameters
    ///
    /// - `_is_training` - `true` for training mode, `false` for inference mode
    fn set_training_if_mode_dependent(&mut self, _is_training: bool) {
        // Only mode-dependent layers need to override this
    }
}

/// Trait for applying serialized weights to a specific layer type.
///
/// # Type Parameters
///
/// - `L` - The layer type that these weights can be applied to
pub trait ApplyWeights<L> {
    /// Applies the serialized weights to a layer instance.
    ///
    /// # Parameters
    ///
    /// - `layer` - Mutable reference to the layer that will receive the weights
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Weights were successfully applied
    /// - `Err(IoError)` - Weight shape mismatch or conversion error
    fn apply_to_layer(&self, layer: &mut L) -> Result<(), IoError>;
}
