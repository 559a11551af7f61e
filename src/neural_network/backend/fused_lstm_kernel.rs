use super::*;

/// Fused LSTM step on the CPU.
///
/// Both projections go into preallocated (batch, 4 * hidden_size) scratch buffers through
/// `general_mat_mul`; a single elementwise pass then activates the gates and writes the new
/// cell and hidden state in place.
///
/// # Fields
///
/// - `params` - Shapes and weight handles the kernel was built for
/// - `input_free_term` - Input bias, zeros if the cell has none
/// - `recur_free_term` - Recurrent bias, zeros if the cell has none
/// - `input_scratch` - Input projection of the current step
/// - `recur_scratch` - Recurrent projection of the current step
pub struct CpuFusedLstmKernel {
    params: FusedLstmParams,
    input_free_term: Array1<f32>,
    recur_free_term: Array1<f32>,
    input_scratch: Array2<f32>,
    recur_scratch: Array2<f32>,
}

impl CpuFusedLstmKernel {
    /// Validates the weight shapes and allocates the scratch buffers.
    ///
    /// # Errors
    ///
    /// - `ModelError::ConfigurationError` - A weight or free term does not fit the shapes in `params`
    pub fn new(params: FusedLstmParams) -> Result<Self, ModelError> {
        let channels = GATE_COUNT * params.hidden_size;
        let expected = [
            ("input", params.input_weights.dim(), (channels, params.input_size)),
            ("recurrent", params.recur_weights.dim(), (channels, params.hidden_size)),
        ];
        for (name, actual, wanted) in expected {
            if actual != wanted {
                return Err(ModelError::ConfigurationError(format!(
                    "fused kernel expects {} weights of shape {:?}, got {:?}",
                    name, wanted, actual
                )));
            }
        }

        let free_term = |term: &Option<Arc<Array1<f32>>>, name: &str| match term {
            Some(b) if b.len() != channels => Err(ModelError::ConfigurationError(format!(
                "fused kernel expects {} free term of length {}, got {}",
                name,
                channels,
                b.len()
            ))),
            Some(b) => Ok(b.as_ref().clone()),
            None => Ok(Array1::zeros(channels)),
        };
        let input_free_term = free_term(&params.input_free_term, "input")?;
        let recur_free_term = free_term(&params.recur_free_term, "recurrent")?;

        trace!(
            batch = params.batch,
            hidden_size = params.hidden_size,
            "allocated fused LSTM scratch buffers"
        );
        Ok(Self {
            input_scratch: Array2::zeros((params.batch, channels)),
            recur_scratch: Array2::zeros((params.batch, channels)),
            input_free_term,
            recur_free_term,
            params,
        })
    }
}

impl LstmKernel for CpuFusedLstmKernel {
    fn run(&mut self, x: ArrayView2<f32>, state: &mut CarriedState) -> Result<(), ModelError> {
        let FusedLstmParams {
            batch,
            input_size,
            hidden_size,
            ..
        } = self.params;
        if x.dim() != (batch, input_size) {
            return Err(ModelError::ShapeMismatch(format!(
                "fused kernel was built for input ({}, {}), got {:?}",
                batch,
                input_size,
                x.dim()
            )));
        }
        state.check_extents(batch, hidden_size)?;

        general_mat_mul(
            1.0,
            &x,
            &self.params.input_weights.t(),
            0.0,
            &mut self.input_scratch,
        );
        general_mat_mul(
            1.0,
            &state.hidden,
            &self.params.recur_weights.t(),
            0.0,
            &mut self.recur_scratch,
        );

        let h = hidden_size;
        for b in 0..batch {
            let input_row = self.input_scratch.row(b);
            let recur_row = self.recur_scratch.row(b);
            let mut cell_row = state.cell.row_mut(b);
            let mut hidden_row = state.hidden.row_mut(b);
            let gate = |k: usize| {
                (input_row[k] + self.input_free_term[k]) + (recur_row[k] + self.recur_free_term[k])
            };
            for j in 0..h {
                let main = tanh(gate(j));
                let forget = sigmoid(gate(h + j));
                let input = sigmoid(gate(2 * h + j));
                let reset = sigmoid(gate(3 * h + j));

                let cell = forget * cell_row[j] + input * main;
                cell_row[j] = cell;
                hidden_row[j] = reset * tanh(cell);
            }
        }
        Ok(())
    }
}

impl Drop for CpuFusedLstmKernel {
    fn drop(&mut self) {
        trace!(
            batch = self.params.batch,
            hidden_size = self.params.hidden_size,
            "released fused LSTM kernel"
        );
    }
}
