use super::*;

/// A macro to define a layer-specific method for setting the training mode.
///
/// This macro generates a `set_training` method within the implementing object
/// to allow toggling the training mode between training (`true`) and inference (`false`).
macro_rules! mode_dependent_layer_set_training {
    () => {
        /// Sets the training mode for the object.
        ///
        /// # Parameters
        ///
        /// * `is_training` - `true` for training mode, `false` for inference mode
        pub fn set_training(&mut self, is_training: bool) {
            self.training = is_training;
        }
    };
}

/// Input validation functions for regularization layers
mod input_validation_function;
/// Tied-weights (variational) dropout shared by every timestep of a run
pub mod variational_dropout;

pub(crate) use input_validation_function::validate_dropout_rate;
pub use variational_dropout::*;
