use super::*;
use crate::neural_network::backend::{Backend, FusedLstmParams, default_backend};
use crate::neural_network::layer::serialize_weight::SerializableLstmCell;
use ndarray::{Array3, Ix3};
use serde_json::{from_reader, to_writer_pretty};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Build state of an `LstmCell`.
///
/// # Variants
///
/// - `Unbuilt` - The decomposed graph is (re)built on the next `reshape`
/// - `Built` - The decomposed graph is ready and every step runs through it
/// - `FastPathReady` - The decomposed graph is ready and steps run on the fused kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LstmBuildState {
    Unbuilt,
    Built,
    FastPathReady,
}

/// The decomposed form of one LSTM step: dropout on both projections, gate split and
/// state composition. The projections themselves stay on the cell so that the weight
/// handles survive a rebuild.
struct LstmGraph {
    input_dropout: Option<VariationalDropout>,
    recur_dropout: Option<VariationalDropout>,
    split: GateSplit,
    composer: StateComposer,
}

impl LstmGraph {
    fn new(config: &LstmCellConfig, training: bool) -> Result<Self, ModelError> {
        let make_dropout = |salt: u64| -> Result<Option<VariationalDropout>, ModelError> {
            if config.dropout_rate == 0.0 {
                return Ok(None);
            }
            let mut dropout = match config.seed {
                Some(seed) => VariationalDropout::with_seed(config.dropout_rate, seed.wrapping_add(salt))?,
                None => VariationalDropout::new(config.dropout_rate)?,
            };
            dropout.set_training(training);
            Ok(Some(dropout))
        };

        Ok(Self {
            input_dropout: make_dropout(0)?,
            recur_dropout: make_dropout(1)?,
            split: GateSplit::new(config.hidden_size, config.recurrent_activation),
            composer: StateComposer::new(config.compatibility_mode),
        })
    }

    fn dropouts_mut(&mut self) -> impl Iterator<Item = &mut VariationalDropout> {
        self.input_dropout
            .iter_mut()
            .chain(self.recur_dropout.iter_mut())
    }

    fn step(
        &self,
        x: ArrayView2<f32>,
        input_hidden: &FullyConnected,
        recur_hidden: &FullyConnected,
        state: &mut CarriedState,
    ) -> Result<Array2<f32>, ModelError> {
        let mut input_proj = input_hidden.project(x)?;
        if let Some(dropout) = &self.input_dropout {
            input_proj = dropout.apply(input_proj)?;
        }
        let mut recur_proj = recur_hidden.project(state.hidden.view())?;
        if let Some(dropout) = &self.recur_dropout {
            recur_proj = dropout.apply(recur_proj)?;
        }

        let gates = input_proj + &recur_proj;
        let signals = self.split.split(&gates)?;
        Ok(self.composer.compose(&signals, state))
    }
}

/// Single-timestep LSTM cell exposed as a graph node.
///
/// Each step computes
///
/// ```text
/// G     = x_t · Wᵀ + b + H_{t-1} · Rᵀ + r         (4 * hidden_size channels)
/// Main  = tanh(G[Main])
/// F,I,O = σ(G[Forget]), σ(G[Input]), σ(G[Reset])
/// C_t   = F ⊙ C_{t-1} + I ⊙ Main
/// H_t   = O ⊙ tanh(C_t)
/// ```
///
/// where σ is the recurrent activation (sigmoid by default). The surfaced output is `H_t`,
/// or `tanh(C_t)` in compatibility mode; the carried state is the same in both modes.
///
/// Two execution paths exist. The decomposed graph chains the gate projections, optional
/// variational dropout, gate split and state composer. When the dropout rate is 0 and the
/// backend offers a fused LSTM primitive for the recurrent activation, `reshape` also
/// builds a fused kernel and `run_once` dispatches to it. Both paths produce the same
/// state and output.
///
/// # Fields
///
/// - `config` - Hidden size, dropout rate, recurrent activation, compatibility mode and seed
/// - `backend` - Numeric backend asked for the fused kernel
/// - `input_hidden` - Input-to-gates projection, weights (4 * hidden_size, input_size)
/// - `recur_hidden` - State-to-gates projection, weights (4 * hidden_size, hidden_size)
/// - `graph` - Decomposed graph, `None` while unbuilt
/// - `fast_desc` - Fused kernel descriptor
/// - `fast_path_eligible` - Whether steps dispatch to the fused kernel
/// - `training` - Dropout is only applied in training mode
/// - `initial_state` - State the next run starts from, zeros if `None`
/// - `state` - Carried state of the current run
/// - `input_shape` - (batch, input_size) of the last `reshape`
/// - `shapes_verified` - Whether the current weights match `input_shape`; steps are refused otherwise
///
/// # Example
/// ```rust
/// use rustycell::prelude::*;
/// use ndarray::Array;
///
/// let mut cell = LstmCell::new(8, 0.0, false).unwrap();
/// cell.reshape(&[2, 4]).unwrap();
///
/// let x = Array::ones((2, 4)).into_dyn();
/// let h1 = cell.run_once(&x).unwrap();
/// let h2 = cell.run_once(&x).unwrap();
///
/// assert_eq!(h1.shape(), &[2, 8]);
/// assert_ne!(h1, h2);
/// ```
pub struct LstmCell {
    config: LstmCellConfig,
    backend: Arc<dyn Backend>,
    input_hidden: FullyConnected,
    recur_hidden: FullyConnected,
    graph: Option<LstmGraph>,
    fast_desc: FastLstmDesc,
    fast_path_eligible: bool,
    training: bool,
    initial_state: Option<CarriedState>,
    state: Option<CarriedState>,
    input_shape: Option<(usize, usize)>,
    shapes_verified: bool,
}

impl LstmCell {
    /// Creates a new LSTM cell on the default backend.
    ///
    /// # Parameters
    ///
    /// - `hidden_size` - Width of the hidden and cell state
    /// - `dropout_rate` - Tied dropout rate on both gate projections, in `[0, 1)`
    /// - `compatibility_mode` - Surface `tanh(C_t)` instead of `H_t`
    ///
    /// # Returns
    ///
    /// - `Ok(LstmCell)` - An unbuilt cell; weights are created on the first `reshape`
    /// - `Err(ModelError::ConfigurationError)` - Hidden size is 0 or the dropout rate is invalid
    pub fn new(
        hidden_size: usize,
        dropout_rate: f32,
        compatibility_mode: bool,
    ) -> Result<Self, ModelError> {
        Self::from_config(&LstmCellConfig {
            hidden_size,
            dropout_rate,
            compatibility_mode,
            ..LstmCellConfig::default()
        })
    }

    /// Creates a new LSTM cell from a configuration on the default backend.
    pub fn from_config(config: &LstmCellConfig) -> Result<Self, ModelError> {
        Self::with_backend(config, default_backend())
    }

    /// Creates a new LSTM cell from a configuration on the given backend.
    pub fn with_backend(
        config: &LstmCellConfig,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, ModelError> {
        config.validate()?;
        let channels = GATE_COUNT * config.hidden_size;
        Ok(Self {
            config: config.clone(),
            backend,
            input_hidden: FullyConnected::new(channels),
            recur_hidden: FullyConnected::new(channels),
            graph: None,
            fast_desc: FastLstmDesc::new(),
            fast_path_eligible: false,
            training: true,
            initial_state: None,
            state: None,
            input_shape: None,
            shapes_verified: false,
        })
    }

    /// Current configuration
    pub fn config(&self) -> &LstmCellConfig {
        &self.config
    }

    /// Backend asked for the fused kernel
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Replaces the backend. Fast-path eligibility is recomputed on the next `reshape`.
    pub fn set_backend(&mut self, backend: Arc<dyn Backend>) {
        self.backend = backend;
        self.invalidate_structure();
    }

    /// Hidden size, derived from the row count of the input projection
    pub fn get_hidden_size(&self) -> usize {
        self.input_hidden.get_number_of_elements() / GATE_COUNT
    }

    /// Changes the hidden size.
    ///
    /// If the size changes, all weights and free terms are dropped and re-created on the
    /// next `reshape`.
    ///
    /// # Errors
    ///
    /// - `ModelError::ConfigurationError` - `hidden_size` is 0
    pub fn set_hidden_size(&mut self, hidden_size: usize) -> Result<(), ModelError> {
        validate_hidden_size(hidden_size)?;
        if hidden_size == self.get_hidden_size() {
            return Ok(());
        }
        self.config.hidden_size = hidden_size;
        self.input_hidden
            .set_number_of_elements(GATE_COUNT * hidden_size);
        self.recur_hidden
            .set_number_of_elements(GATE_COUNT * hidden_size);
        self.invalidate_structure();
        Ok(())
    }

    /// Tied dropout rate of both gate projections
    pub fn get_dropout_rate(&self) -> f32 {
        self.config.dropout_rate
    }

    /// Changes the dropout rate. Rate 0 removes the dropout components.
    ///
    /// # Errors
    ///
    /// - `ModelError::ConfigurationError` - The rate is outside `[0, 1)`
    pub fn set_dropout_rate(&mut self, dropout_rate: f32) -> Result<(), ModelError> {
        validate_dropout_rate(dropout_rate)?;
        if dropout_rate != self.config.dropout_rate {
            self.config.dropout_rate = dropout_rate;
            self.invalidate_structure();
        }
        Ok(())
    }

    /// Activation of the Forget, Input and Reset gates
    pub fn get_recurrent_activation(&self) -> Activation {
        self.config.recurrent_activation
    }

    /// Changes the activation of the Forget, Input and Reset gates.
    ///
    /// # Parameters
    ///
    /// - `recurrent_activation` - New gate activation
    ///
    /// # Returns
    ///
    /// Nothing. A different activation returns the cell to `Unbuilt`; the next `reshape`
    /// rebuilds it and re-decides fast-path eligibility.
    pub fn set_recurrent_activation(&mut self, recurrent_activation: Activation) {
        if recurrent_activation != self.config.recurrent_activation {
            self.config.recurrent_activation = recurrent_activation;
            self.invalidate_structure();
        }
    }

    /// Whether the surfaced output is `tanh(C_t)` instead of `H_t`
    pub fn is_in_compatibility_mode(&self) -> bool {
        self.config.compatibility_mode
    }

    /// Switches the surfaced output between `H_t` and `tanh(C_t)`.
    ///
    /// # Parameters
    ///
    /// - `compatibility_mode` - `true` surfaces `tanh(C_t)`
    ///
    /// # Returns
    ///
    /// Nothing. A change returns the cell to `Unbuilt`. The carried state is unaffected.
    pub fn set_compatibility_mode(&mut self, compatibility_mode: bool) {
        if compatibility_mode != self.config.compatibility_mode {
            self.config.compatibility_mode = compatibility_mode;
            self.invalidate_structure();
        }
    }

    /// Input-to-gates weights, shape (4 * hidden_size, input_size)
    pub fn get_input_weights_data(&self) -> Option<Arc<Array2<f32>>> {
        self.input_hidden.get_weights_data()
    }

    /// Replaces the input-to-gates weights.
    ///
    /// The hidden size follows the row count of the new weights. If the weights no longer
    /// fit the last `reshape`, steps are refused until the cell is reshaped again.
    ///
    /// # Errors
    ///
    /// - `ModelError::ConfigurationError` - The row count is not a positive multiple of 4
    pub fn set_input_weights_data(
        &mut self,
        weights: Option<Arc<Array2<f32>>>,
    ) -> Result<(), ModelError> {
        if let Some(w) = &weights {
            let hidden_size = hidden_size_from_rows(w.nrows())?;
            if hidden_size != self.get_hidden_size() {
                self.config.hidden_size = hidden_size;
                self.invalidate_structure();
            }
        }
        self.input_hidden.set_weights_data(weights);
        self.weights_changed();
        Ok(())
    }

    /// Input-to-gates free term, length 4 * hidden_size
    pub fn get_input_free_term_data(&self) -> Option<Arc<Array1<f32>>> {
        self.input_hidden.get_free_term_data()
    }

    /// Replaces the input-to-gates free term.
    ///
    /// # Parameters
    ///
    /// - `free_term` - Vector of length 4 * hidden_size, or `None` for a zero free term
    ///
    /// # Returns
    ///
    /// Nothing. The fused kernel is dropped; a length that does not fit makes `run_once`
    /// fail until the next `reshape` reports it.
    pub fn set_input_free_term_data(&mut self, free_term: Option<Arc<Array1<f32>>>) {
        self.input_hidden.set_free_term_data(free_term);
        self.weights_changed();
    }

    /// State-to-gates weights, shape (4 * hidden_size, hidden_size)
    pub fn get_recur_weights_data(&self) -> Option<Arc<Array2<f32>>> {
        self.recur_hidden.get_weights_data()
    }

    /// Replaces the state-to-gates weights.
    ///
    /// # Parameters
    ///
    /// - `weights` - Matrix of shape (4 * hidden_size, hidden_size), or `None` to re-create it on the next `reshape`
    ///
    /// # Returns
    ///
    /// Nothing. The fused kernel is dropped; a shape that does not fit makes `run_once`
    /// fail until the next `reshape` reports it.
    pub fn set_recur_weights_data(&mut self, weights: Option<Arc<Array2<f32>>>) {
        self.recur_hidden.set_weights_data(weights);
        self.weights_changed();
    }

    /// State-to-gates free term, length 4 * hidden_size
    pub fn get_recur_free_term_data(&self) -> Option<Arc<Array1<f32>>> {
        self.recur_hidden.get_free_term_data()
    }

    /// Replaces the state-to-gates free term.
    ///
    /// # Parameters
    ///
    /// - `free_term` - Vector of length 4 * hidden_size, or `None` for a zero free term
    ///
    /// # Returns
    ///
    /// Nothing. Behaves like `set_input_free_term_data`.
    pub fn set_recur_free_term_data(&mut self, free_term: Option<Arc<Array1<f32>>>) {
        self.recur_hidden.set_free_term_data(free_term);
        self.weights_changed();
    }

    /// Mutates the input weights in place. Shared handles are copied first, so other cells
    /// holding the same weights are unaffected.
    ///
    /// # Errors
    ///
    /// - `ModelError::ProcessingError` - The weights do not exist yet
    pub fn update_input_weights<F>(&mut self, f: F) -> Result<(), ModelError>
    where
        F: FnOnce(&mut Array2<f32>),
    {
        let result = self.input_hidden.update_weights(f);
        self.weights_changed();
        result
    }

    /// Mutates the recurrent weights in place, copy-on-write like `update_input_weights`.
    pub fn update_recur_weights<F>(&mut self, f: F) -> Result<(), ModelError>
    where
        F: FnOnce(&mut Array2<f32>),
    {
        let result = self.recur_hidden.update_weights(f);
        self.weights_changed();
        result
    }

    /// Sets the state the next run starts from.
    ///
    /// Extents are verified against (batch, hidden_size) on the next `reshape` or
    /// `begin_sequence`.
    pub fn set_initial_state(&mut self, hidden: Array2<f32>, cell: Array2<f32>) {
        self.initial_state = Some(CarriedState { hidden, cell });
    }

    /// Makes the next run start from a zero state
    pub fn clear_initial_state(&mut self) {
        self.initial_state = None;
    }

    /// Hidden state after the last step, shape (batch, hidden_size)
    pub fn hidden_state(&self) -> Option<&Array2<f32>> {
        self.state.as_ref().map(|s| &s.hidden)
    }

    /// Cell state after the last step, shape (batch, hidden_size)
    pub fn cell_state(&self) -> Option<&Array2<f32>> {
        self.state.as_ref().map(|s| &s.cell)
    }

    pub fn build_state(&self) -> LstmBuildState {
        match (&self.graph, self.fast_path_eligible) {
            (None, _) => LstmBuildState::Unbuilt,
            (Some(_), false) => LstmBuildState::Built,
            (Some(_), true) => LstmBuildState::FastPathReady,
        }
    }

    /// Whether steps dispatch to the fused kernel
    pub fn is_fast_path_ready(&self) -> bool {
        self.build_state() == LstmBuildState::FastPathReady
    }

    /// Whether the fused kernel is currently built. It is dropped by weight changes and
    /// rebuilt lazily by the next step.
    pub fn has_fast_path_kernel(&self) -> bool {
        self.fast_desc.is_ready()
    }

    get_field!(is_training, training, bool);

    pub fn set_training(&mut self, is_training: bool) {
        self.training = is_training;
        if let Some(graph) = &mut self.graph {
            for dropout in graph.dropouts_mut() {
                dropout.set_training(is_training);
            }
        }
    }

    /// Starts a new run: restores the initial (or zero) state and draws fresh dropout masks.
    ///
    /// # Errors
    ///
    /// - `ModelError::ProcessingError` - `reshape` has not been called
    /// - `ModelError::ConfigurationError` - The initial state does not match (batch, hidden_size)
    pub fn begin_sequence(&mut self) -> Result<(), ModelError> {
        let (batch, _) = self.input_shape.ok_or_else(|| {
            ModelError::ProcessingError("LSTM cell must be reshaped before a run".to_string())
        })?;
        let hidden_size = self.get_hidden_size();

        let state = match &self.initial_state {
            Some(initial) => {
                initial.check_extents(batch, hidden_size)?;
                initial.clone()
            }
            None => CarriedState::zeros(batch, hidden_size),
        };
        self.state = Some(state);

        if let Some(graph) = &mut self.graph {
            for dropout in graph.dropouts_mut() {
                dropout.begin_sequence(batch, GATE_COUNT * hidden_size);
            }
        }
        Ok(())
    }

    /// Runs one timestep on a (batch, input_size) input.
    fn step(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>, ModelError> {
        let expected = self.input_shape.ok_or_else(|| {
            ModelError::ProcessingError("LSTM cell must be reshaped before running".to_string())
        })?;
        if x.dim() != expected {
            return Err(ModelError::ShapeMismatch(format!(
                "LSTM cell was reshaped for step input {:?}, got {:?}",
                expected,
                x.dim()
            )));
        }
        if !self.shapes_verified {
            return Err(ModelError::ProcessingError(
                "LSTM weights do not match the last reshape, call reshape before running"
                    .to_string(),
            ));
        }

        if self.fast_path_eligible {
            if !self.fast_desc.is_ready() {
                let params = self.fused_params(expected.0, expected.1)?;
                self.fast_desc.init(self.backend.as_ref(), params)?;
            }
            let state = self.state.as_mut().ok_or_else(missing_state)?;
            self.fast_desc.run(x, state)?;
            return Ok(if self.config.compatibility_mode {
                state.cell.mapv(tanh)
            } else {
                state.hidden.clone()
            });
        }

        let graph = self.graph.as_ref().ok_or_else(|| {
            ModelError::ProcessingError("LSTM graph has not been built".to_string())
        })?;
        let state = self.state.as_mut().ok_or_else(missing_state)?;
        graph.step(x, &self.input_hidden, &self.recur_hidden, state)
    }

    fn fused_params(&self, batch: usize, input_size: usize) -> Result<FusedLstmParams, ModelError> {
        let missing = |name: &str| {
            ModelError::ProcessingError(format!("{} weights have not been initialized", name))
        };
        Ok(FusedLstmParams {
            batch,
            input_size,
            hidden_size: self.get_hidden_size(),
            recurrent_activation: self.config.recurrent_activation,
            input_weights: self.get_input_weights_data().ok_or_else(|| missing("input"))?,
            input_free_term: self.get_input_free_term_data(),
            recur_weights: self.get_recur_weights_data().ok_or_else(|| missing("recurrent"))?,
            recur_free_term: self.get_recur_free_term_data(),
        })
    }

    /// Creates missing weights and verifies all weight shapes against the input width.
    fn prepare_weights(&mut self, input_size: usize) -> Result<(), ModelError> {
        let hidden_size = self.get_hidden_size();
        let channels = GATE_COUNT * hidden_size;

        let forget = GateOut::Forget.channels(hidden_size);
        if self.input_hidden.initialize_if_empty(input_size, false, |free_term| {
            free_term.slice_mut(s![forget]).fill(1.0)
        }) {
            debug!(hidden_size, input_size, "initialized LSTM input weights");
        }

        if self.recur_hidden.get_weights_data().is_none() {
            self.recur_hidden.set_number_of_elements(channels);
            self.recur_hidden.initialize_if_empty(hidden_size, true, |_| {});
            debug!(hidden_size, "initialized LSTM recurrent weights");
        }
        self.check_weight_shapes(input_size)
    }

    /// Verifies both projections against the input width and the hidden size.
    fn check_weight_shapes(&self, input_size: usize) -> Result<(), ModelError> {
        let hidden_size = self.get_hidden_size();
        let channels = GATE_COUNT * hidden_size;

        self.input_hidden.check_input(input_size, "input")?;
        if let Some(w) = self.recur_hidden.get_weights_data() {
            if w.dim() != (channels, hidden_size) {
                return Err(ModelError::ConfigurationError(format!(
                    "recurrent weights must have shape ({}, {}) for hidden size {}, got {:?}",
                    channels,
                    hidden_size,
                    hidden_size,
                    w.dim()
                )));
            }
        }
        self.recur_hidden.check_input(hidden_size, "recurrent")
    }

    /// Decides fast-path eligibility and (re)builds the fused kernel.
    ///
    /// A backend without the primitive is not an error: the cell logs it and keeps using
    /// the decomposed graph.
    fn prepare_fast_path(&mut self, batch: usize, input_size: usize) -> Result<(), ModelError> {
        self.fast_desc.reset();
        self.fast_path_eligible = self.config.dropout_rate == 0.0
            && self
                .backend
                .supports_fused_lstm(self.config.recurrent_activation);
        if !self.fast_path_eligible {
            debug!(
                backend = self.backend.name(),
                dropout_rate = self.config.dropout_rate,
                recurrent_activation = self.config.recurrent_activation.name(),
                "fused LSTM kernel not eligible, using decomposed graph"
            );
            return Ok(());
        }

        let params = self.fused_params(batch, input_size)?;
        match self.fast_desc.init(self.backend.as_ref(), params) {
            Ok(()) => {
                debug!(
                    backend = self.backend.name(),
                    batch,
                    hidden_size = self.get_hidden_size(),
                    "built fused LSTM kernel"
                );
                Ok(())
            }
            Err(ModelError::BackendUnsupported(reason)) => {
                debug!(
                    backend = self.backend.name(),
                    reason = reason.as_str(),
                    "fused LSTM kernel unavailable, falling back to decomposed graph"
                );
                self.fast_path_eligible = false;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Drops the fused kernel and re-checks the weights against the last `reshape`.
    fn weights_changed(&mut self) {
        self.fast_desc.reset();
        self.shapes_verified = match self.input_shape {
            Some((_, input_size)) => self.check_weight_shapes(input_size).is_ok(),
            None => false,
        };
    }

    /// Returns the cell to `Unbuilt`
    fn invalidate_structure(&mut self) {
        self.graph = None;
        self.fast_desc.reset();
        self.fast_path_eligible = false;
    }

    /// Saves configuration and weights as JSON.
    ///
    /// # Errors
    ///
    /// - `IoError::ModelError` - The weights have not been created yet (call `reshape` first)
    /// - `IoError::StdIoError` / `IoError::JsonError` - Writing failed
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), IoError> {
        let serializable = SerializableLstmCell::from_cell(self)?;

        let file = File::create(path).map_err(IoError::StdIoError)?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, &serializable).map_err(IoError::JsonError)?;
        writer.flush().map_err(IoError::StdIoError)?;
        Ok(())
    }

    /// Loads a cell saved by `save_to_path` onto the default backend.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let reader = IoError::load_in_buf_reader(path)?;
        let serializable: SerializableLstmCell = from_reader(reader).map_err(IoError::JsonError)?;
        serializable.to_cell()
    }
}

fn missing_state() -> ModelError {
    ModelError::ProcessingError("LSTM carried state has not been initialized".to_string())
}

impl Layer for LstmCell {
    /// Validates or creates the weights, builds the decomposed graph if needed, decides
    /// fast-path eligibility and starts a new run.
    ///
    /// Accepts (batch, input_size) or (batch, timesteps, input_size).
    fn reshape(&mut self, input_shape: &[usize]) -> Result<(), ModelError> {
        let (batch, input_size) = validate_step_shape(input_shape)?;
        validate_hidden_size(self.get_hidden_size())?;

        self.shapes_verified = false;
        self.prepare_weights(input_size)?;
        self.shapes_verified = true;

        if self.graph.is_none() {
            self.graph = Some(LstmGraph::new(&self.config, self.training)?);
            debug!(
                hidden_size = self.get_hidden_size(),
                dropout_rate = self.config.dropout_rate,
                compatibility_mode = self.config.compatibility_mode,
                "built decomposed LSTM graph"
            );
        }

        self.input_shape = Some((batch, input_size));
        self.prepare_fast_path(batch, input_size)?;
        self.begin_sequence()
    }

    /// Runs one timestep on a (batch, input_size) input and returns (batch, hidden_size).
    fn run_once(&mut self, input: &Tensor) -> Result<Tensor, ModelError> {
        let x = input.view().into_dimensionality::<Ix2>().map_err(|_| {
            ModelError::InputValidationError(format!(
                "LSTM step input must be 2D (batch, input), got {:?}",
                input.shape()
            ))
        })?;
        Ok(self.step(x)?.into_dyn())
    }

    /// Runs a whole sequence (batch, timesteps, input_size) from the initial state and returns
    /// the output of every step, (batch, timesteps, hidden_size).
    fn forward(&mut self, input: &Tensor) -> Result<Tensor, ModelError> {
        validate_input_3d(input)?;
        self.reshape(input.shape())?;

        let x3 = input.view().into_dimensionality::<Ix3>().map_err(|_| {
            ModelError::InputValidationError("input tensor is not 3D".to_string())
        })?;
        let (batch, timesteps, _) = x3.dim();
        let mut output = Array3::<f32>::zeros((batch, timesteps, self.get_hidden_size()));

        for t in 0..timesteps {
            let h = self.step(x3.slice(s![.., t, ..]))?;
            output.slice_mut(s![.., t, ..]).assign(&h);
        }
        Ok(output.into_dyn())
    }

    fn layer_type(&self) -> &str {
        "LSTM"
    }

    fn output_shape(&self) -> String {
        match self.input_shape {
            Some((batch, _)) => format!("({}, {})", batch, self.get_hidden_size()),
            None => format!("(None, {})", self.get_hidden_size()),
        }
    }

    fn param_count(&self) -> usize {
        self.input_hidden.param_count() + self.recur_hidden.param_count()
    }

    fn set_training_if_mode_dependent(&mut self, is_training: bool) {
        self.set_training(is_training);
    }
}
