use super::*;
use crate::neural_network::layer::Softmax;

/// Softmax operator.
///
/// Before opset 13 the input is coerced to 2D at `axis` (default 1) and softmax runs over
/// the flattened trailing part. From opset 13 softmax runs along the single `axis`
/// (default -1).
pub struct SoftmaxOperator {
    node: OperatorNode,
    opset_version: i64,
    axis: isize,
}

impl SoftmaxOperator {
    /// Factory registered under "Softmax"
    pub fn create(
        node: &OperatorNode,
        opset_version: i64,
    ) -> Result<Box<dyn Operator>, ModelError> {
        Ok(Box::new(Self::new(node, opset_version)?))
    }

    pub fn new(node: &OperatorNode, opset_version: i64) -> Result<Self, ModelError> {
        validate_opset_version(opset_version)?;
        let default_axis = if opset_version < 13 { 1 } else { -1 };
        let axis = node.get_int("axis")?.unwrap_or(default_axis);
        Ok(Self {
            node: node.clone(),
            opset_version,
            axis: axis as isize,
        })
    }

    get_field!(get_axis, axis, isize);

    fn make_layer(&self) -> Softmax {
        if self.opset_version < 13 {
            Softmax::coerced_2d(self.axis)
        } else {
            Softmax::new(self.axis)
        }
    }
}

impl Operator for SoftmaxOperator {
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
        let input = required_input(self, inputs, 0)?;
        let mut layer = self.make_layer();

        let output = match input {
            ImportTensor::Data(data) => ImportTensor::Data(layer.forward(data)?),
            ImportTensor::User(user) => {
                layer.reshape(&user.shape)?;
                let output = graph.add_layer(
                    self.name(),
                    Box::new(layer),
                    user,
                    user.shape.clone(),
                )?;
                ImportTensor::User(output)
            }
        };
        Ok(vec![Some(output)])
    }
}
