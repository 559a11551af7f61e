use crate::error::ModelError;
use crate::neural_network::Tensor;
use crate::neural_network::neural_network_trait::Layer;
use ahash::AHashMap;
use tracing::debug;

/// A minimal graph that records and executes deferred layers
pub mod graph;
/// Constant and graph-backed tensors exchanged between operators
pub mod import_tensor;
/// The `LSTM` operator
pub mod lstm_operator;
/// Operator description and attribute access
pub mod node;
/// Operator type to factory table
pub mod registry;
/// The `Softmax` operator
pub mod softmax_operator;

pub use graph::*;
pub use import_tensor::*;
pub use lstm_operator::*;
pub use node::*;
pub use registry::*;
pub use softmax_operator::*;

/// Highest supported opset version
pub const MAX_OPSET_VERSION: i64 = 16;

/// An imported operator.
///
/// `process_tensors` either computes its outputs eagerly, when every input is constant
/// data, or adds equivalent layers to the graph and returns handles to their outputs.
pub trait Operator: Send + Sync {
    /// Description the operator was created from
    fn node(&self) -> &OperatorNode;

    /// Opset version the operator was created for
    fn opset_version(&self) -> i64;

    /// Operator name
    fn name(&self) -> &str {
        &self.node().name
    }

    /// Operator type ("LSTM", "Softmax", ...)
    fn op_type(&self) -> &str {
        &self.node().op_type
    }

    fn input_count(&self) -> usize {
        self.node().inputs.len()
    }

    /// Name of the `index`'th input. Optional inputs that are absent have an empty name.
    fn input_name(&self, index: usize) -> Result<&str, ModelError> {
        self.node()
            .inputs
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| index_error(self.name(), "input", index, self.input_count()))
    }

    fn output_count(&self) -> usize {
        self.node().outputs.len()
    }

    /// Name of the `index`'th output. Outputs nobody consumes have an empty name.
    fn output_name(&self, index: usize) -> Result<&str, ModelError> {
        self.node()
            .outputs
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| index_error(self.name(), "output", index, self.output_count()))
    }

    /// Computes or emits the operator's outputs.
    ///
    /// # Parameters
    ///
    /// - `inputs` - One entry per input, `None` for an absent optional input
    /// - `graph` - Graph receiving the layers when an input is graph-backed
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Option<ImportTensor>>)` - One entry per output, `None` for unused outputs
    /// - `Err(ModelError::InputValidationError)` - Inputs or attributes are not supported
    fn process_tensors(
        &self,
        inputs: &[Option<ImportTensor>],
        graph: &mut Graph,
    ) -> Result<Vec<Option<ImportTensor>>, ModelError>;
}

fn index_error(name: &str, kind: &str, index: usize, count: usize) -> ModelError {
    ModelError::InputValidationError(format!(
        "operator '{}' has {} {}s, index {} is out of range",
        name, count, kind, index
    ))
}

/// Checks that the opset version is in `1..=MAX_OPSET_VERSION`
pub(crate) fn validate_opset_version(opset_version: i64) -> Result<(), ModelError> {
    if !(1..=MAX_OPSET_VERSION).contains(&opset_version) {
        return Err(ModelError::InputValidationError(format!(
            "opset version must be in 1..={}, got {}",
            MAX_OPSET_VERSION, opset_version
        )));
    }
    Ok(())
}

/// Returns the `index`'th input, failing if it is absent
pub(crate) fn required_input<'a>(
    op: &dyn Operator,
    inputs: &'a [Option<ImportTensor>],
    index: usize,
) -> Result<&'a ImportTensor, ModelError> {
    inputs.get(index).and_then(Option::as_ref).ok_or_else(|| {
        ModelError::InputValidationError(format!(
            "{} operator '{}' requires input {}",
            op.op_type(),
            op.name(),
            index
        ))
    })
}

/// Returns the constant data of an input, failing if it is graph-backed
pub(crate) fn data_input<'a>(
    op: &dyn Operator,
    tensor: &'a ImportTensor,
    what: &str,
) -> Result<&'a Tensor, ModelError> {
    match tensor {
        ImportTensor::Data(data) => Ok(data),
        ImportTensor::User(_) => Err(ModelError::InputValidationError(format!(
            "{} operator '{}' requires constant {}",
            op.op_type(),
            op.name(),
            what
        ))),
    }
}

/// Whether any present input is graph-backed
pub(crate) fn has_user_input(inputs: &[Option<ImportTensor>]) -> bool {
    inputs
        .iter()
        .flatten()
        .any(|t| matches!(t, ImportTensor::User(_)))
}
