use super::*;
use crate::neural_network::activation::tanh;
use crate::neural_network::layer::regularization_layer::{
    VariationalDropout, validate_dropout_rate,
};

/// Lazily built handle to the backend's fused LSTM kernel
pub mod fast_lstm_desc;
/// Gate channel order, split and activation
pub mod gate;
/// Input validation functions for recurrent layers
mod input_validation_function;
/// The single-step LSTM cell exposed as a graph node
pub mod lstm_cell;
/// Configuration of the LSTM cell
pub mod lstm_config;
/// Carried state and the LSTM state update
pub mod state_composer;

use input_validation_function::*;

pub use fast_lstm_desc::FastLstmDesc;
pub use gate::*;
pub use lstm_cell::*;
pub use lstm_config::LstmCellConfig;
pub use state_composer::*;
