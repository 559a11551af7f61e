use super::helper_function::{array2_to_vec2, vec_to_array1, vec2_to_array2};
use super::*;
use crate::neural_network::layer::recurrent_layer::{LstmCell, LstmCellConfig};
use crate::{Deserialize, Serialize};

/// Current version of the serialized LSTM cell format
pub const LSTM_CELL_VERSION: u32 = 1;

/// Serializable representation of an LSTM cell.
///
/// Field order is part of the format. Weight rows are stored in gate channel order
/// {Main, Forget, Input, Reset}.
///
/// # Fields
///
/// - `version` - Format version, at most `LSTM_CELL_VERSION`
/// - `hidden_size` - Width of the hidden and cell state
/// - `dropout_rate` - Tied dropout rate of both gate projections
/// - `recurrent_activation` - Activation of the Forget, Input and Reset gates
/// - `compatibility_mode` - Whether `tanh(C_t)` is surfaced instead of `H_t`
/// - `input_weights` - Input-to-gates weights, (4 * hidden_size) rows of input_size values
/// - `input_free_term` - Input-to-gates bias, `None` for a zero free term
/// - `recur_weights` - State-to-gates weights, (4 * hidden_size) rows of hidden_size values
/// - `recur_free_term` - State-to-gates bias, `None` for a zero free term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableLstmCell {
    pub version: u32,
    pub hidden_size: usize,
    pub dropout_rate: f32,
    pub recurrent_activation: Activation,
    pub compatibility_mode: bool,
    pub input_weights: Vec<Vec<f32>>,
    pub input_free_term: Option<Vec<f32>>,
    pub recur_weights: Vec<Vec<f32>>,
    pub recur_free_term: Option<Vec<f32>>,
}

impl SerializableLstmCell {
    /// Captures the configuration and weights of a cell.
    ///
    /// # Errors
    ///
    /// - `ModelError::ProcessingError` - The weights do not exist yet (the cell was never reshaped)
    pub fn from_cell(cell: &LstmCell) -> Result<Self, ModelError> {
        let missing = |name: &str| {
            ModelError::ProcessingError(format!(
                "{} weights have not been initialized, reshape the cell before saving",
                name
            ))
        };
        let input_weights = cell.get_input_weights_data().ok_or_else(|| missing("input"))?;
        let recur_weights = cell.get_recur_weights_data().ok_or_else(|| missing("recurrent"))?;

        Ok(Self {
            version: LSTM_CELL_VERSION,
            hidden_size: cell.get_hidden_size(),
            dropout_rate: cell.get_dropout_rate(),
            recurrent_activation: cell.get_recurrent_activation(),
            compatibility_mode: cell.is_in_compatibility_mode(),
            input_weights: array2_to_vec2(&input_weights),
            input_free_term: cell.get_input_free_term_data().map(|b| b.to_vec()),
            recur_weights: array2_to_vec2(&recur_weights),
            recur_free_term: cell.get_recur_free_term_data().map(|b| b.to_vec()),
        })
    }

    /// Builds a new cell on the default backend.
    pub fn to_cell(&self) -> Result<LstmCell, IoError> {
        let config = LstmCellConfig {
            hidden_size: self.hidden_size,
            dropout_rate: self.dropout_rate,
            recurrent_activation: self.recurrent_activation,
            compatibility_mode: self.compatibility_mode,
            seed: None,
        };
        let mut cell = LstmCell::from_config(&config)?;
        self.apply_to_layer(&mut cell)?;
        Ok(cell)
    }
}

impl ApplyWeights<LstmCell> for SerializableLstmCell {
    fn apply_to_layer(&self, layer: &mut LstmCell) -> Result<(), IoError> {
        if self.version == 0 || self.version > LSTM_CELL_VERSION {
            return Err(IoError::StdIoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "unsupported LSTM cell format version {}, expected 1..={}",
                    self.version, LSTM_CELL_VERSION
                ),
            )));
        }

        let input_weights = vec2_to_array2(&self.input_weights)?;
        if input_weights.nrows() != 4 * self.hidden_size {
            return Err(ModelError::ConfigurationError(format!(
                "hidden size {} requires {} input weight rows, got {}",
                self.hidden_size,
                4 * self.hidden_size,
                input_weights.nrows()
            ))
            .into());
        }
        let recur_weights = vec2_to_array2(&self.recur_weights)?;

        layer.set_dropout_rate(self.dropout_rate)?;
        layer.set_recurrent_activation(self.recurrent_activation);
        layer.set_compatibility_mode(self.compatibility_mode);

        layer.set_input_weights_data(Some(Arc::new(input_weights)))?;
        layer.set_input_free_term_data(
            self.input_free_term
                .as_deref()
                .map(|b| Arc::new(vec_to_array1(b))),
        );
        layer.set_recur_weights_data(Some(Arc::new(recur_weights)));
        layer.set_recur_free_term_data(
            self.recur_free_term
                .as_deref()
                .map(|b| Arc::new(vec_to_array1(b))),
        );
        Ok(())
    }
}
