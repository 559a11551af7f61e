use super::*;

/// Validates a dropout rate
///
/// # Parameters
///
/// - `rate` - The dropout rate to validate
///
/// # Returns
///
/// * `Ok(())` if the rate lies in `[0, 1)`
/// * `Err(ModelError::ConfigurationError)` otherwise
pub(crate) fn validate_dropout_rate(rate: f32) -> Result<(), ModelError> {
    if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
        return Err(ModelError::ConfigurationError(format!(
            "dropout rate must be in [0, 1), got {}",
            rate
        )));
    }
    Ok(())
}
