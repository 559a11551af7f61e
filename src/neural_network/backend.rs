use crate::error::ModelError;
use crate::neural_network::activation::{Activation, sigmoid, tanh};
use crate::neural_network::layer::recurrent_layer::{CarriedState, GATE_COUNT};
use ndarray::linalg::general_mat_mul;
use ndarray::{Array1, Array2, ArrayView2};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::trace;

/// Fused single-pass LSTM kernel of the CPU backend
mod fused_lstm_kernel;

pub use fused_lstm_kernel::CpuFusedLstmKernel;

/// Everything a backend needs to build a fused LSTM kernel.
///
/// The weight handles are clones of the cell's `Arc`s, so the kernel never copies weights.
///
/// # Fields
///
/// - `batch` - Number of sequence elements processed per step
/// - `input_size` - Trailing extent of the step input
/// - `hidden_size` - Width of the carried state
/// - `recurrent_activation` - Activation of the Forget, Input and Reset gates
/// - `input_weights` - Input-to-gates weights, shape (4 * hidden_size, input_size)
/// - `input_free_term` - Input-to-gates bias, length 4 * hidden_size
/// - `recur_weights` - State-to-gates weights, shape (4 * hidden_size, hidden_size)
/// - `recur_free_term` - State-to-gates bias, length 4 * hidden_size
#[derive(Debug, Clone)]
pub struct FusedLstmParams {
    pub batch: usize,
    pub input_size: usize,
    pub hidden_size: usize,
    pub recurrent_activation: Activation,
    pub input_weights: Arc<Array2<f32>>,
    pub input_free_term: Option<Arc<Array1<f32>>>,
    pub recur_weights: Arc<Array2<f32>>,
    pub recur_free_term: Option<Arc<Array1<f32>>>,
}

/// A numeric backend that may offer fused primitives.
///
/// Capabilities are advertised through `supports_fused_lstm`; a backend that returns
/// `false` there must answer `create_lstm_kernel` with `ModelError::BackendUnsupported`.
pub trait Backend: Debug + Send + Sync {
    /// Backend name used in log messages
    fn name(&self) -> &str;

    /// Whether a fused LSTM kernel exists for this recurrent activation
    fn supports_fused_lstm(&self, recurrent_activation: Activation) -> bool;

    /// Builds a fused LSTM kernel.
    ///
    /// # Parameters
    ///
    /// - `params` - Shapes, activation and weight handles the kernel is specialized for
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn LstmKernel>)` - A kernel owning its scratch buffers
    /// - `Err(ModelError::BackendUnsupported)` - No fused primitive for these parameters
    fn create_lstm_kernel(&self, params: FusedLstmParams)
    -> Result<Box<dyn LstmKernel>, ModelError>;
}

/// One LSTM timestep computed as a single backend operation.
///
/// Implementations follow the same contract as the decomposed path: read the previous
/// carried state, write `C_t` into `state.cell` and `H_t` into `state.hidden`.
pub trait LstmKernel: Send + Sync {
    fn run(&mut self, x: ArrayView2<f32>, state: &mut CarriedState) -> Result<(), ModelError>;
}

/// The default backend. Offers a fused LSTM kernel for the `Sigmoid` recurrent activation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn supports_fused_lstm(&self, recurrent_activation: Activation) -> bool {
        recurrent_activation == Activation::Sigmoid
    }

    fn create_lstm_kernel(
        &self,
        params: FusedLstmParams,
    ) -> Result<Box<dyn LstmKernel>, ModelError> {
        if !self.supports_fused_lstm(params.recurrent_activation) {
            return Err(ModelError::BackendUnsupported(format!(
                "{} backend has no fused LSTM kernel for {} recurrent activation",
                self.name(),
                params.recurrent_activation.name()
            )));
        }
        Ok(Box::new(CpuFusedLstmKernel::new(params)?))
    }
}

/// A backend without fused primitives. Cells on this backend always run the decomposed path.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceBackend;

impl Backend for ReferenceBackend {
    fn name(&self) -> &str {
        "reference"
    }

    fn supports_fused_lstm(&self, _recurrent_activation: Activation) -> bool {
        false
    }

    fn create_lstm_kernel(
        &self,
        _params: FusedLstmParams,
    ) -> Result<Box<dyn LstmKernel>, ModelError> {
        Err(ModelError::BackendUnsupported(format!(
            "{} backend has no fused LSTM kernel",
            self.name()
        )))
    }
}

/// Backend used by cells created without an explicit one
pub fn default_backend() -> Arc<dyn Backend> {
    Arc::new(CpuBackend)
}
