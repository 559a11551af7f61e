use super::*;

/// Helper function to format the output shape for shape-preserving layers.
///
/// Returns a formatted string of the shape accepted by the last `reshape`,
/// or "Unknown" if the layer has not been reshaped yet.
fn format_output_shape(input_shape: &Option<Vec<usize>>) -> String {
    if let Some(shape) = input_shape {
        format!(
            "({})",
            shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    } else {
        "Unknown".to_string()
    }
}

/// Softmax activation layer
pub mod softmax;

pub use softmax::*;
