use super::*;
use crate::neural_network::activation::{Activation, HARD_SIGMOID_ALPHA, HARD_SIGMOID_BETA};
use crate::neural_network::layer::recurrent_layer::{GATE_COUNT, LstmCell, LstmCellConfig};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Ix2, Ix3, concatenate, s};
use std::sync::Arc;

/// Position of the Main, Forget, Input and Reset blocks in ONNX gate order (i, o, f, c)
const ONNX_GATE_BLOCKS: [usize; GATE_COUNT] = [3, 2, 0, 1];

/// Re-packs the row blocks of an ONNX gate matrix into Main, Forget, Input, Reset order.
fn repack_rows(w: ArrayView2<f32>, hidden_size: usize) -> Result<Array2<f32>, ModelError> {
    let blocks: Vec<_> = ONNX_GATE_BLOCKS
        .iter()
        .map(|&b| w.slice(s![b * hidden_size..(b + 1) * hidden_size, ..]))
        .collect();
    concatenate(Axis(0), &blocks).map_err(|e| ModelError::ProcessingError(e.to_string()))
}

/// Same as `repack_rows` for a bias vector.
fn repack_free_term(b: ArrayView1<f32>, hidden_size: usize) -> Result<Array1<f32>, ModelError> {
    let blocks: Vec<_> = ONNX_GATE_BLOCKS
        .iter()
        .map(|&k| b.slice(s![k * hidden_size..(k + 1) * hidden_size]))
        .collect();
    concatenate(Axis(0), &blocks).map_err(|e| ModelError::ProcessingError(e.to_string()))
}

fn shape_error(what: &str, expected: String, actual: &[usize]) -> ModelError {
    ModelError::InputValidationError(format!(
        "LSTM {} must have shape {}, got {:?}",
        what, expected, actual
    ))
}

/// Runs an `LstmCell` on sequence-major data.
///
/// Input (seq, batch, input_size), output (seq, 1, batch, hidden_size), the layout of the
/// ONNX `Y` output with one direction.
pub struct SequenceMajorLstm {
    cell: LstmCell,
}

impl SequenceMajorLstm {
    pub fn new(cell: LstmCell) -> Self {
        Self { cell }
    }

    pub fn cell(&self) -> &LstmCell {
        &self.cell
    }
}

impl Layer for SequenceMajorLstm {
    fn reshape(&mut self, input_shape: &[usize]) -> Result<(), ModelError> {
        match input_shape {
            [seq, batch, input_size] => self.cell.reshape(&[*batch, *seq, *input_size]),
            _ => Err(shape_error(
                "input X",
                "(seq, batch, input)".to_string(),
                input_shape,
            )),
        }
    }

    fn run_once(&mut self, input: &Tensor) -> Result<Tensor, ModelError> {
        let x = input
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| shape_error("input X", "(seq, batch, input)".to_string(), input.shape()))?;
        let batch_major = x.permuted_axes([1, 0, 2]).to_owned().into_dyn();
        let y = self.cell.forward(&batch_major)?;
        let y = y
            .into_dimensionality::<Ix3>()
            .map_err(|e| ModelError::ProcessingError(e.to_string()))?;
        Ok(y
            .permuted_axes([1, 0, 2])
            .insert_axis(Axis(1))
            .as_standard_layout()
            .into_owned()
            .into_dyn())
    }

    fn layer_type(&self) -> &str {
        "LSTM"
    }

    fn output_shape(&self) -> String {
        self.cell.output_shape()
    }

    fn param_count(&self) -> usize {
        self.cell.param_count()
    }

    fn set_training_if_mode_dependent(&mut self, is_training: bool) {
        self.cell.set_training(is_training);
    }
}

/// LSTM operator, forward direction only.
///
/// Inputs: `X` (seq, batch, input), `W` (1, 4H, input), `R` (1, 4H, H), optional `B`
/// (1, 8H), `initial_h` and `initial_c` (1, batch, H). `sequence_lens` and peepholes are
/// not supported. `W`, `R`, `B` and the initial states must be constant.
///
/// Outputs: `Y` (seq, 1, batch, H); for constant `X` also `Y_h` and `Y_c` (1, batch, H).
pub struct LstmOperator {
    node: OperatorNode,
    opset_version: i64,
    hidden_size: Option<usize>,
    recurrent_activation: Activation,
}

impl LstmOperator {
    /// Factory registered under "LSTM"
    pub fn create(
        node: &OperatorNode,
        opset_version: i64,
    ) -> Result<Box<dyn Operator>, ModelError> {
        Ok(Box::new(Self::new(node, opset_version)?))
    }

    /// Validates the attributes.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - A non-forward direction, clipping, coupled input
    ///   and forget gates, batch-major layout, activations other than (f, Tanh, Tanh), or
    ///   activation parameters other than the HardSigmoid defaults
    pub fn new(node: &OperatorNode, opset_version: i64) -> Result<Self, ModelError> {
        validate_opset_version(opset_version)?;
        let unsupported = |what: String| {
            ModelError::InputValidationError(format!(
                "LSTM operator '{}': {} is not supported",
                node.name, what
            ))
        };

        let hidden_size = match node.get_int("hidden_size")? {
            Some(h) if h <= 0 => return Err(unsupported(format!("hidden_size {}", h))),
            Some(h) => Some(h as usize),
            None => None,
        };
        match node.get_string("direction")? {
            None | Some("forward") => {}
            Some(direction) => return Err(unsupported(format!("direction '{}'", direction))),
        }
        if node.get_float("clip")?.is_some() {
            return Err(unsupported("clip".to_string()));
        }
        if node.get_int("input_forget")?.unwrap_or(0) != 0 {
            return Err(unsupported("input_forget".to_string()));
        }
        if node.get_int("layout")?.unwrap_or(0) != 0 {
            return Err(unsupported("batch-major layout".to_string()));
        }

        let recurrent_activation = match node.get_strings("activations")? {
            None => Activation::Sigmoid,
            Some([f, g, h]) if g == "Tanh" && h == "Tanh" => Activation::from_onnx_name(f)
                .ok_or_else(|| unsupported(format!("recurrent activation '{}'", f)))?,
            Some(other) => return Err(unsupported(format!("activations {:?}", other))),
        };

        // Only HardSigmoid takes parameters, and only its default ones are implemented
        for (name, default) in [
            ("activation_alpha", HARD_SIGMOID_ALPHA),
            ("activation_beta", HARD_SIGMOID_BETA),
        ] {
            match node.get_floats(name)? {
                None => {}
                Some([value])
                    if recurrent_activation == Activation::HardSigmoid
                        && (value - default).abs() < 1e-6 => {}
                Some(values) => return Err(unsupported(format!("{} {:?}", name, values))),
            }
        }

        Ok(Self {
            node: node.clone(),
            opset_version,
            hidden_size,
            recurrent_activation,
        })
    }

    /// Constant data of an optional input, `None` if absent
    fn optional_data<'a>(
        &self,
        inputs: &'a [Option<ImportTensor>],
        index: usize,
        what: &str,
    ) -> Result<Option<&'a Tensor>, ModelError> {
        match inputs.get(index).and_then(Option::as_ref) {
            None => Ok(None),
            Some(t) => data_input(self, t, what).map(Some),
        }
    }

    /// Builds the cell from the constant inputs.
    fn build_cell(
        &self,
        inputs: &[Option<ImportTensor>],
        batch: usize,
        input_size: usize,
    ) -> Result<LstmCell, ModelError> {
        let w = data_input(self, required_input(self, inputs, 1)?, "W")?;
        let r = data_input(self, required_input(self, inputs, 2)?, "R")?;
        let r = r
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| shape_error("R", "(1, 4H, H)".to_string(), r.shape()))?;
        let hidden_size = self.hidden_size.unwrap_or(r.shape()[2]);
        let channels = GATE_COUNT * hidden_size;

        if r.shape() != [1, channels, hidden_size] {
            return Err(shape_error("R", format!("(1, {}, {})", channels, hidden_size), r.shape()));
        }
        if w.shape() != [1, channels, input_size] {
            return Err(shape_error("W", format!("(1, {}, {})", channels, input_size), w.shape()));
        }
        let w = w
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|e| ModelError::ProcessingError(e.to_string()))?;

        let optional = |index: usize, what: &str| self.optional_data(inputs, index, what);
        if optional(4, "sequence_lens")?.is_some() {
            return Err(ModelError::InputValidationError(format!(
                "LSTM operator '{}': sequence_lens is not supported",
                self.name()
            )));
        }
        if optional(7, "P")?.is_some() {
            return Err(ModelError::InputValidationError(format!(
                "LSTM operator '{}': peepholes are not supported",
                self.name()
            )));
        }

        let mut cell = LstmCell::from_config(&LstmCellConfig {
            hidden_size,
            recurrent_activation: self.recurrent_activation,
            ..LstmCellConfig::default()
        })?;
        cell.set_training(false);
        cell.set_input_weights_data(Some(Arc::new(repack_rows(
            w.index_axis(Axis(0), 0),
            hidden_size,
        )?)))?;
        cell.set_recur_weights_data(Some(Arc::new(repack_rows(
            r.index_axis(Axis(0), 0),
            hidden_size,
        )?)));

        if let Some(b) = optional(3, "B")? {
            if b.shape() != [1, 2 * channels] {
                return Err(shape_error("B", format!("(1, {})", 2 * channels), b.shape()));
            }
            let b = b
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|e| ModelError::ProcessingError(e.to_string()))?;
            let b = b.index_axis(Axis(0), 0);
            let (wb, rb) = b.split_at(Axis(0), channels);
            cell.set_input_free_term_data(Some(Arc::new(repack_free_term(wb, hidden_size)?)));
            cell.set_recur_free_term_data(Some(Arc::new(repack_free_term(rb, hidden_size)?)));
        }

        let initial = |index: usize, what: &str| -> Result<Option<Array2<f32>>, ModelError> {
            let Some(t) = optional(index, what)? else {
                return Ok(None);
            };
            if t.shape() != [1, batch, hidden_size] {
                return Err(shape_error(what, format!("(1, {}, {})", batch, hidden_size), t.shape()));
            }
            let t = t
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|e| ModelError::ProcessingError(e.to_string()))?;
            Ok(Some(t.index_axis(Axis(0), 0).to_owned()))
        };
        let initial_h = initial(5, "initial_h")?;
        let initial_c = initial(6, "initial_c")?;
        if initial_h.is_some() || initial_c.is_some() {
            let zeros = || Array2::zeros((batch, hidden_size));
            cell.set_initial_state(
                initial_h.unwrap_or_else(zeros),
                initial_c.unwrap_or_else(zeros),
            );
        }
        Ok(cell)
    }
}

impl Operator for LstmOperator {
    fn node(&self) -> &OperatorNode {
        &self.node
    }

    fn opset_version(&self) -> i64 {
        self.opset_version
    }

    fn process_tensors(
        &self,
        inputs: &[Option<ImportTensor>],
        graph: &mut Graph,
    ) -> Result<Vec<Option<ImportTensor>>, ModelError> {
        let x = required_input(self, inputs, 0)?;
        let (seq, batch, input_size) = match x.shape() {
            [seq, batch, input_size] => (*seq, *batch, *input_size),
            other => return Err(shape_error("input X", "(seq, batch, input)".to_string(), other)),
        };
        let cell = self.build_cell(inputs, batch, input_size)?;
        let hidden_size = cell.get_hidden_size();
        let wanted = |index: usize| {
            self.node
                .outputs
                .get(index)
                .is_some_and(|name| !name.is_empty())
        };
        let mut layer = SequenceMajorLstm::new(cell);
        layer.reshape(x.shape())?;

        let mut outputs: Vec<Option<ImportTensor>> = vec![None; self.output_count().max(1)];
        match x {
            ImportTensor::Data(data) => {
                outputs[0] = Some(ImportTensor::Data(layer.run_once(data)?));
                let last = |state: Option<&Array2<f32>>| -> Result<Tensor, ModelError> {
                    let state = state.ok_or_else(|| {
                        ModelError::ProcessingError("LSTM state is not available".to_string())
                    })?;
                    Ok(state.clone().insert_axis(Axis(0)).into_dyn())
                };
                if wanted(1) {
                    outputs[1] = Some(ImportTensor::Data(last(layer.cell().hidden_state())?));
                }
                if wanted(2) {
                    outputs[2] = Some(ImportTensor::Data(last(layer.cell().cell_state())?));
                }
            }
            ImportTensor::User(user) => {
                if wanted(1) || wanted(2) {
                    return Err(ModelError::InputValidationError(format!(
                        "LSTM operator '{}': Y_h and Y_c are only supported for constant inputs",
                        self.name()
                    )));
                }
                let y = graph.add_layer(
                    self.name(),
                    Box::new(layer),
                    user,
                    vec![seq, 1, batch, hidden_size],
                )?;
                outputs[0] = Some(ImportTensor::User(y));
            }
        }
        Ok(outputs)
    }
}
