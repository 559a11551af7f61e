use super::*;

/// Conversions between `ndarray` tensors and serde-friendly nested vectors
mod helper_function;
/// Serializable configuration and weights of an LSTM cell
pub mod serializable_lstm_cell;

pub use serializable_lstm_cell::*;
