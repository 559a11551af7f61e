use super::*;

/// Validates that a hidden size is greater than 0
///
/// # Parameters
///
/// - `hidden_size` - The hidden size to validate
///
/// # Returns
///
/// * `Ok(())` if validation passes
/// * `Err(ModelError::ConfigurationError)` if validation fails
pub(super) fn validate_hidden_size(hidden_size: usize) -> Result<(), ModelError> {
    if hidden_size == 0 {
        return Err(ModelError::ConfigurationError(
            "hidden size must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Derives the hidden size from the row count of an input weight matrix
///
/// # Parameters
///
/// - `rows` - Number of rows (gate channels) of the input weights
///
/// # Returns
///
/// * `Ok(usize)` - `rows / 4`
/// * `Err(ModelError::ConfigurationError)` if `rows` is zero or not a multiple of 4
pub(super) fn hidden_size_from_rows(rows: usize) -> Result<usize, ModelError> {
    if rows == 0 || rows % GATE_COUNT != 0 {
        return Err(ModelError::ConfigurationError(format!(
            "hidden size must evenly divide weight element count by {}, got {} rows",
            GATE_COUNT, rows
        )));
    }
    Ok(rows / GATE_COUNT)
}

/// Splits an input shape into (batch, input_dim).
///
/// Accepts (batch, input_dim) for a single step, or (batch, timesteps, input_dim) for a
/// sequence.
///
/// # Returns
///
/// * `Ok((usize, usize))` if validation passes
/// * `Err(ModelError::InputValidationError)` for any other rank or a zero extent
pub(super) fn validate_step_shape(input_shape: &[usize]) -> Result<(usize, usize), ModelError> {
    let (batch, input_dim) = match input_shape {
        [batch, input_dim] | [batch, _, input_dim] => (*batch, *input_dim),
        _ => {
            return Err(ModelError::InputValidationError(format!(
                "LSTM input must be 2D (batch, input) or 3D (batch, timesteps, input), got {:?}",
                input_shape
            )));
        }
    };
    if batch == 0 || input_dim == 0 {
        return Err(ModelError::InputValidationError(format!(
            "LSTM input extents must be greater than 0, got {:?}",
            input_shape
        )));
    }
    Ok((batch, input_dim))
}

/// Validates that input tensor is 3D for the sequence driver
///
/// # Parameters
///
/// - `input` - The input tensor to validate
///
/// # Returns
///
/// * `Ok(())` if validation passes
/// * `Err(ModelError::InputValidationError)` if validation fails
pub(super) fn validate_input_3d(input: &Tensor) -> Result<(), ModelError> {
    if input.ndim() != 3 {
        return Err(ModelError::InputValidationError(
            "input tensor is not 3D".to_string(),
        ));
    }
    Ok(())
}
