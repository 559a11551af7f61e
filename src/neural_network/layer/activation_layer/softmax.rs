use super::*;

/// Max input clipping values to prevent overflow in exp function
const INPUT_CLIP_MIN: f32 = -500.0;

/// Min input clipping values to prevent overflow in exp function
const INPUT_CLIP_MAX: f32 = 500.0;

/// Softmax activation layer.
///
/// softmax(x_i) = exp(x_i - max(x)) / sum_j(exp(x_j - max(x)))
///
/// Two normalisation modes exist because the operator changed meaning between opset
/// versions:
///
/// - single axis: the distribution runs along `axis` only
/// - coerced 2D: the tensor is viewed as `(prod(shape[..axis]), prod(shape[axis..]))` and
///   every row is one distribution
///
/// # Fields
///
/// - `axis` - Normalisation axis, negative values count from the end
/// - `coerce_to_2d` - Whether all dimensions from `axis` onward form one distribution
/// - `input_shape` - Shape accepted by the last `reshape`
///
/// # Example
///
/// ```rust
/// use rustycell::prelude::*;
/// use ndarray::Array2;
///
/// let x = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
///     .unwrap()
///     .into_dyn();
///
/// let mut softmax = Softmax::new(-1);
/// let y = softmax.forward(&x).unwrap();
///
/// // Every row sums to 1.0
/// assert!((y.sum() - 2.0).abs() < 1e-5);
/// ```
pub struct Softmax {
    axis: isize,
    coerce_to_2d: bool,
    input_shape: Option<Vec<usize>>,
}

impl Softmax {
    /// Creates a softmax along a single axis.
    ///
    /// # Parameters
    ///
    /// - `axis` - Normalisation axis, negative values count from the end
    ///
    /// # Returns
    ///
    /// * `Softmax` - A new `Softmax` layer instance
    pub fn new(axis: isize) -> Self {
        Softmax {
            axis,
            coerce_to_2d: false,
            input_shape: None,
        }
    }

    /// Creates a softmax that treats every dimension from `axis` onward as one distribution.
    pub fn coerced_2d(axis: isize) -> Self {
        Softmax {
            axis,
            coerce_to_2d: true,
            input_shape: None,
        }
    }

    get_field!(get_axis, axis, isize);
    get_field!(is_coerced_2d, coerce_to_2d, bool);

    fn resolve_axis(&self, ndim: usize) -> Result<usize, ModelError> {
        let resolved = if self.axis < 0 {
            self.axis + ndim as isize
        } else {
            self.axis
        };
        if resolved < 0 || resolved as usize >= ndim {
            return Err(ModelError::InputValidationError(format!(
                "Softmax axis {} is out of range for a {}-dimensional input",
                self.axis, ndim
            )));
        }
        Ok(resolved as usize)
    }
}

fn softmax_slice(values: &mut [f32]) {
    let max_val = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max_val).clamp(INPUT_CLIP_MIN, INPUT_CLIP_MAX).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

impl Layer for Softmax {
    fn reshape(&mut self, input_shape: &[usize]) -> Result<(), ModelError> {
        if input_shape.is_empty() || input_shape.iter().any(|&d| d == 0) {
            return Err(ModelError::InputValidationError(format!(
                "Softmax requires a non-empty input, got shape: {:?}",
                input_shape
            )));
        }
        self.resolve_axis(input_shape.len())?;
        self.input_shape = Some(input_shape.to_vec());
        Ok(())
    }

    fn run_once(&mut self, input: &Tensor) -> Result<Tensor, ModelError> {
        match &self.input_shape {
            Some(shape) if shape.as_slice() == input.shape() => {}
            _ => {
                return Err(ModelError::ShapeMismatch(format!(
                    "Softmax was reshaped for {:?} but received {:?}",
                    self.input_shape,
                    input.shape()
                )));
            }
        }
        let axis = self.resolve_axis(input.ndim())?;

        if self.coerce_to_2d {
            let inner: usize = input.shape()[axis..].iter().product();
            let mut data: Vec<f32> = input.iter().cloned().collect();
            for row in data.chunks_mut(inner) {
                softmax_slice(row);
            }
            return Tensor::from_shape_vec(input.raw_dim(), data)
                .map_err(|e| ModelError::ProcessingError(e.to_string()));
        }

        let mut output = input.to_owned();
        for mut lane in output.lanes_mut(Axis(axis)) {
            let max_val = lane.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            lane.mapv_inplace(|x| (x - max_val).clamp(INPUT_CLIP_MIN, INPUT_CLIP_MAX).exp());
            let sum = lane.sum();
            lane.mapv_inplace(|x| x / sum);
        }
        Ok(output)
    }

    fn layer_type(&self) -> &str {
        "Softmax"
    }

    fn output_shape(&self) -> String {
        format_output_shape(&self.input_shape)
    }
}
