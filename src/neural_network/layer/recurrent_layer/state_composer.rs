use super::*;

/// Hidden output and cell state threaded from one timestep to the next.
///
/// Owned by the cell and handed by `&mut` to whichever execution path runs the step.
/// Both tensors have shape (batch, hidden_size).
#[derive(Debug, Clone, PartialEq)]
pub struct CarriedState {
    pub hidden: Array2<f32>,
    pub cell: Array2<f32>,
}

impl CarriedState {
    /// Zero state for `batch` sequence elements
    pub fn zeros(batch: usize, hidden_size: usize) -> Self {
        Self {
            hidden: Array2::zeros((batch, hidden_size)),
            cell: Array2::zeros((batch, hidden_size)),
        }
    }

    /// Checks both extents against (batch, hidden_size).
    ///
    /// # Errors
    ///
    /// - `ModelError::ConfigurationError` - Either tensor has another shape
    pub fn check_extents(&self, batch: usize, hidden_size: usize) -> Result<(), ModelError> {
        for (name, tensor) in [("hidden", &self.hidden), ("cell", &self.cell)] {
            if tensor.dim() != (batch, hidden_size) {
                return Err(ModelError::ConfigurationError(format!(
                    "{} state must have shape ({}, {}) to match batch and hidden size, got {:?}",
                    name,
                    batch,
                    hidden_size,
                    tensor.dim()
                )));
            }
        }
        Ok(())
    }
}

/// LSTM state update.
///
/// ```text
/// C_t = Forget ⊙ C_{t-1} + Input ⊙ Main
/// H_t = Reset ⊙ tanh(C_t)
/// ```
///
/// `H_t` and `C_t` are written back into the carried state. The value returned as the
/// step output is `H_t`, or `tanh(C_t)` in compatibility mode.
#[derive(Debug, Clone, Copy)]
pub struct StateComposer {
    compatibility_mode: bool,
}

impl StateComposer {
    pub fn new(compatibility_mode: bool) -> Self {
        Self { compatibility_mode }
    }

    get_field!(is_in_compatibility_mode, compatibility_mode, bool);

    /// Runs the update for one timestep.
    ///
    /// # Parameters
    ///
    /// - `gates` - Activated gates of this step
    /// - `state` - State of the previous step, overwritten with the new one
    ///
    /// # Returns
    ///
    /// * `Array2<f32>` - The surfaced step output with shape (batch, hidden_size)
    pub fn compose(&self, gates: &GateSignals, state: &mut CarriedState) -> Array2<f32> {
        let cell = &gates.forget * &state.cell + &gates.input * &gates.main;
        let squashed = cell.mapv(tanh);
        let hidden = &gates.reset * &squashed;

        state.cell = cell;
        let output = if self.compatibility_mode {
            squashed
        } else {
            hidden.clone()
        };
        state.hidden = hidden;
        output
    }
}
