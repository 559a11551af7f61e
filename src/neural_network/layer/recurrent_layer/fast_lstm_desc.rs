use super::*;
use crate::neural_network::backend::{Backend, FusedLstmParams, LstmKernel};

/// Lazily built handle to a backend's fused LSTM kernel.
///
/// The kernel holds clones of the weight handles and its own scratch buffers, so the
/// descriptor must be reset whenever weights, shapes or configuration change. Resetting or
/// dropping the descriptor drops the kernel, which releases the backend handle.
#[derive(Default)]
pub struct FastLstmDesc {
    kernel: Option<Box<dyn LstmKernel>>,
}

impl FastLstmDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a kernel is ready to run
    pub fn is_ready(&self) -> bool {
        self.kernel.is_some()
    }

    /// Drops the kernel, if any
    pub fn reset(&mut self) {
        self.kernel = None;
    }

    /// Builds a kernel for the given parameters, replacing any previous one.
    ///
    /// # Errors
    ///
    /// - `ModelError::BackendUnsupported` - The backend has no fused primitive for these parameters
    pub fn init(&mut self, backend: &dyn Backend, params: FusedLstmParams) -> Result<(), ModelError> {
        self.reset();
        self.kernel = Some(backend.create_lstm_kernel(params)?);
        Ok(())
    }

    /// Runs the kernel on one timestep.
    ///
    /// # Errors
    ///
    /// - `ModelError::ProcessingError` - No kernel has been built
    pub fn run(&mut self, x: ArrayView2<f32>, state: &mut CarriedState) -> Result<(), ModelError> {
        let kernel = self.kernel.as_mut().ok_or_else(|| {
            ModelError::ProcessingError("fused LSTM kernel has not been initialized".to_string())
        })?;
        kernel.run(x, state)
    }
}
