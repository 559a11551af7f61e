/// A macro that generates a getter method for any `Copy` field.
///
/// # Parameters
///
/// - `$method_name` - The name of the getter method (e.g., get_dropout_rate)
/// - `$field_name` - The name of the field to access (e.g., dropout_rate)
/// - `$return_type` - The return type of the getter method
macro_rules! get_field {
    ($method_name:ident, $field_name:ident, $return_type:ty) => {
        #[doc = concat!("Gets the `", stringify!($field_name), "` field.\n\n")]
        #[doc = "# Returns\n\n"]
        #[doc = concat!("* `", stringify!($return_type), "` - The value of the `", stringify!($field_name), "` field")]
        pub fn $method_name(&self) -> $return_type {
            self.$field_name
        }
    };
}

/// Error types shared by every module of the crate
pub mod error;

/// Module `neural_network` provides a single-timestep LSTM cell exposed as a graph node.
///
/// The cell owns two gate projections (input-to-gates and state-to-gates), an optional
/// tied-weights dropout on each projection, the gate split/activation step and the
/// recurrent state composer. On every shape change it decides whether the numeric
/// backend can run the same step as one fused kernel, and dispatches each step to
/// whichever path is ready. Both paths produce the same cell state and hidden output.
///
/// # Main Components
///
/// - **LstmCell**: the graph node (configuration, weights, `reshape`, `run_once`, sequence `forward`)
/// - **FullyConnected**: affine gate projection producing all four gates at once
/// - **VariationalDropout**: one mask per run, reused for every timestep
/// - **GateSplit / StateComposer**: gate activation and the cell/hidden state update
/// - **Backend**: capability-advertising numeric backend (`CpuBackend`, `ReferenceBackend`)
/// - **Operator / OperatorRegistry / Graph**: the operator-import boundary
///
/// # Examples
/// ```rust
/// use rustycell::neural_network::*;
/// use ndarray::Array;
///
/// // batch_size=2, timesteps=5, input_dim=4
/// let x = Array::ones((2, 5, 4)).into_dyn();
///
/// let mut cell = LstmCell::new(3, 0.0, false).unwrap();
/// let y = cell.forward(&x).unwrap();
///
/// assert_eq!(y.shape(), &[2, 5, 3]);
/// assert!(cell.is_fast_path_ready());
/// ```
pub mod neural_network;

/// Convenience re-exports
pub mod prelude;

pub use serde::{Deserialize, Serialize};
