use super::*;
use crate::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of an `LstmCell`.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```json
/// { "hidden_size": 64, "dropout_rate": 0.25 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmCellConfig {
    /// Width of the hidden and cell state.
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,

    /// Tied dropout rate on both gate projections, in [0, 1). 0 disables dropout.
    #[serde(default)]
    pub dropout_rate: f32,

    /// Activation of the Forget, Input and Reset gates.
    #[serde(default)]
    pub recurrent_activation: Activation,

    /// Surface tanh(C_t) instead of the gated hidden state.
    #[serde(default)]
    pub compatibility_mode: bool,

    /// Seed for the dropout masks. `None` seeds from the operating system.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_hidden_size() -> usize {
    1
}

impl Default for LstmCellConfig {
    fn default() -> Self {
        Self {
            hidden_size: default_hidden_size(),
            dropout_rate: 0.0,
            recurrent_activation: Activation::default(),
            compatibility_mode: false,
            seed: None,
        }
    }
}

impl LstmCellConfig {
    /// Checks hidden size and dropout rate.
    ///
    /// # Errors
    ///
    /// - `ModelError::ConfigurationError` - Hidden size is 0 or the dropout rate is outside `[0, 1)`
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_hidden_size(self.hidden_size)?;
        validate_dropout_rate(self.dropout_rate)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, IoError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let reader = IoError::load_in_buf_reader(path)?;
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}
