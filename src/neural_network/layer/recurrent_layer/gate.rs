use super::*;

/// Channel positions of the four gates inside a `4 * hidden_size` projection.
///
/// Serialized weights store their rows in exactly this order, so any compatible format
/// has to preserve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOut {
    /// The main (data) output, squashed with tanh
    Main = 0,
    /// Forget gate
    Forget = 1,
    /// Input gate
    Input = 2,
    /// Reset (output) gate
    Reset = 3,
}

/// Number of gates packed into one projection
pub const GATE_COUNT: usize = 4;

impl GateOut {
    /// All gates in channel order
    pub const ALL: [GateOut; GATE_COUNT] =
        [GateOut::Main, GateOut::Forget, GateOut::Input, GateOut::Reset];

    /// Column range of this gate inside a `4 * hidden_size` wide tensor
    pub fn channels(self, hidden_size: usize) -> std::ops::Range<usize> {
        let start = self as usize * hidden_size;
        start..start + hidden_size
    }
}

/// The four activated gate signals of one timestep, each with shape (batch, hidden_size).
#[derive(Debug, Clone)]
pub struct GateSignals {
    pub main: Array2<f32>,
    pub forget: Array2<f32>,
    pub input: Array2<f32>,
    pub reset: Array2<f32>,
}

/// Splits a concatenated projection into gates and applies their nonlinearities.
///
/// Main gets tanh; Forget, Input and Reset get the configured recurrent activation.
///
/// # Fields
///
/// - `hidden_size` - Width of each gate
/// - `recurrent_activation` - Activation applied to Forget, Input and Reset
#[derive(Debug, Clone)]
pub struct GateSplit {
    hidden_size: usize,
    recurrent_activation: Activation,
}

impl GateSplit {
    pub fn new(hidden_size: usize, recurrent_activation: Activation) -> Self {
        Self {
            hidden_size,
            recurrent_activation,
        }
    }

    get_field!(get_hidden_size, hidden_size, usize);
    get_field!(get_recurrent_activation, recurrent_activation, Activation);

    /// Splits and activates one timestep.
    ///
    /// # Parameters
    ///
    /// - `gates` - Pre-activation gate values with shape (batch, 4 * hidden_size)
    ///
    /// # Returns
    ///
    /// - `Ok(GateSignals)` - Activated gates
    /// - `Err(ModelError::ShapeMismatch)` - If `gates` is not `4 * hidden_size` wide
    pub fn split(&self, gates: &Array2<f32>) -> Result<GateSignals, ModelError> {
        if gates.ncols() != GATE_COUNT * self.hidden_size {
            return Err(ModelError::ShapeMismatch(format!(
                "gate projection must have {} channels, got {}",
                GATE_COUNT * self.hidden_size,
                gates.ncols()
            )));
        }
        let slice = |gate: GateOut| gates.slice(s![.., gate.channels(self.hidden_size)]).to_owned();

        let mut main = slice(GateOut::Main);
        let mut forget = slice(GateOut::Forget);
        let mut input = slice(GateOut::Input);
        let mut reset = slice(GateOut::Reset);

        main.mapv_inplace(tanh);
        self.recurrent_activation.apply_inplace(forget.view_mut());
        self.recurrent_activation.apply_inplace(input.view_mut());
        self.recurrent_activation.apply_inplace(reset.view_mut());

        Ok(GateSignals {
            main,
            forget,
            input,
            reset,
        })
    }
}
