use crate::{Deserialize, Serialize};
use ndarray::ArrayViewMut2;

/// Max input clipping value to prevent overflow in the exp function
const INPUT_CLIP_MAX: f32 = 500.0;

/// Min input clipping value to prevent overflow in the exp function
const INPUT_CLIP_MIN: f32 = -500.0;

/// Slope of `HardSigmoid`
pub const HARD_SIGMOID_ALPHA: f32 = 0.2;

/// Offset of `HardSigmoid`
pub const HARD_SIGMOID_BETA: f32 = 0.5;

/// Activation function used for the Forget, Input and Reset gates of a recurrent cell.
///
/// The Main gate and the output squashing always use tanh; this enum selects the
/// nonlinearity of the remaining three gates.
///
/// # Variants
///
/// - `Sigmoid` - `1 / (1 + e^(-x))`, the default
/// - `HardSigmoid` - piecewise-linear approximation `clamp(0.2 * x + 0.5, 0, 1)`
/// - `Tanh` - hyperbolic tangent
/// - `Linear` - identity
/// - `ReLU` - `max(0, x)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    Sigmoid,
    HardSigmoid,
    Tanh,
    Linear,
    ReLU,
}

/// Numerically clipped logistic sigmoid
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    let clipped_x = x.clamp(INPUT_CLIP_MIN, INPUT_CLIP_MAX);
    1.0 / (1.0 + (-clipped_x).exp())
}

/// Numerically clipped hyperbolic tangent
#[inline]
pub fn tanh(x: f32) -> f32 {
    x.clamp(INPUT_CLIP_MIN, INPUT_CLIP_MAX).tanh()
}

impl Activation {
    /// Applies the activation to a single value.
    ///
    /// # Parameters
    ///
    /// - `x` - Pre-activation value
    ///
    /// # Returns
    ///
    /// * `f32` - Activated value
    #[inline]
    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::HardSigmoid => (HARD_SIGMOID_ALPHA * x + HARD_SIGMOID_BETA).clamp(0.0, 1.0),
            Activation::Tanh => tanh(x),
            Activation::Linear => x,
            Activation::ReLU => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
        }
    }

    /// Applies the activation in place on a mutable view.
    pub fn apply_inplace(&self, mut z: ArrayViewMut2<f32>) {
        if *self == Activation::Linear {
            return;
        }
        z.mapv_inplace(|x| self.apply(x));
    }

    /// Short name used in log messages and layer summaries
    pub fn name(&self) -> &'static str {
        match self {
            Activation::Sigmoid => "Sigmoid",
            Activation::HardSigmoid => "HardSigmoid",
            Activation::Tanh => "Tanh",
            Activation::Linear => "Linear",
            Activation::ReLU => "ReLU",
        }
    }

    /// Parses the ONNX spelling of an activation name.
    ///
    /// # Returns
    ///
    /// * `Option<Activation>` - `None` if the name is not a supported recurrent activation
    pub fn from_onnx_name(name: &str) -> Option<Activation> {
        match name {
            "Sigmoid" => Some(Activation::Sigmoid),
            "HardSigmoid" => Some(Activation::HardSigmoid),
            "Tanh" => Some(Activation::Tanh),
            "Relu" => Some(Activation::ReLU),
            "Affine" | "Linear" => Some(Activation::Linear),
            _ => None,
        }
    }
}
