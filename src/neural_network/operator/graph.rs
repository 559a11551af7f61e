use super::*;

struct GraphLayer {
    name: String,
    source: String,
    layer: Box<dyn Layer>,
}

/// Layers added by operators whose inputs are graph-backed.
///
/// Every layer consumes the output of one earlier node (a graph input or another layer),
/// so insertion order is already an execution order.
///
/// # Example
/// ```rust
/// use rustycell::prelude::*;
/// use ndarray::array;
///
/// let mut graph = Graph::new();
/// let logits = graph.add_input("logits", vec![1, 3]).unwrap();
/// let probabilities = graph
///     .add_layer("softmax", Box::new(Softmax::new(-1)), &logits, vec![1, 3])
///     .unwrap();
///
/// let outputs = graph
///     .run(vec![("logits".to_string(), array![[1.0f32, 2.0, 3.0]].into_dyn())])
///     .unwrap();
/// let sum: f32 = outputs[&probabilities.node].sum();
/// assert!((sum - 1.0).abs() < 1e-6);
/// ```
#[derive(Default)]
pub struct Graph {
    inputs: AHashMap<String, Vec<usize>>,
    layers: Vec<GraphLayer>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_name_free(&self, name: &str) -> Result<(), ModelError> {
        if self.inputs.contains_key(name) || self.layers.iter().any(|l| l.name == name) {
            return Err(ModelError::InputValidationError(format!(
                "graph already has a node named '{}'",
                name
            )));
        }
        Ok(())
    }

    /// Declares a graph input fed at `run` time.
    pub fn add_input(
        &mut self,
        name: impl Into<String>,
        shape: Vec<usize>,
    ) -> Result<UserTensor, ModelError> {
        let name = name.into();
        self.check_name_free(&name)?;
        self.inputs.insert(name.clone(), shape.clone());
        Ok(UserTensor { node: name, shape })
    }

    /// Appends a layer consuming `input`.
    ///
    /// # Parameters
    ///
    /// - `name` - Unique node name
    /// - `layer` - Layer run on the value of `input`
    /// - `input` - Handle to an existing node
    /// - `output_shape` - Shape of the layer's output
    ///
    /// # Returns
    ///
    /// - `Ok(UserTensor)` - Handle to the layer's output
    /// - `Err(ModelError::InputValidationError)` - The name is taken or `input` is unknown
    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        layer: Box<dyn Layer>,
        input: &UserTensor,
        output_shape: Vec<usize>,
    ) -> Result<UserTensor, ModelError> {
        let name = name.into();
        self.check_name_free(&name)?;
        let known = self.inputs.contains_key(&input.node)
            || self.layers.iter().any(|l| l.name == input.node);
        if !known {
            return Err(ModelError::InputValidationError(format!(
                "layer '{}' consumes unknown node '{}'",
                name, input.node
            )));
        }
        debug!(
            layer = name.as_str(),
            layer_type = layer.layer_type(),
            source = input.node.as_str(),
            "added graph layer"
        );
        self.layers.push(GraphLayer {
            name: name.clone(),
            source: input.node.clone(),
            layer,
        });
        Ok(UserTensor {
            node: name,
            shape: output_shape,
        })
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer names in execution order
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }

    /// Layer type of a node, `None` for inputs and unknown names
    pub fn layer_type(&self, name: &str) -> Option<&str> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.layer.layer_type())
    }

    /// Switches every mode-dependent layer between training and inference.
    pub fn set_training(&mut self, is_training: bool) {
        for graph_layer in &mut self.layers {
            graph_layer.layer.set_training_if_mode_dependent(is_training);
        }
    }

    /// Runs every layer.
    ///
    /// # Parameters
    ///
    /// - `feeds` - Value of every graph input
    ///
    /// # Returns
    ///
    /// - `Ok(AHashMap<String, Tensor>)` - Value of every node, inputs included
    /// - `Err(ModelError)` - An input is missing, has the wrong shape, or a layer failed
    pub fn run(
        &mut self,
        feeds: impl IntoIterator<Item = (String, Tensor)>,
    ) -> Result<AHashMap<String, Tensor>, ModelError> {
        let mut values: AHashMap<String, Tensor> = feeds.into_iter().collect();
        for (name, shape) in &self.inputs {
            match values.get(name) {
                None => {
                    return Err(ModelError::InputValidationError(format!(
                        "graph input '{}' was not fed",
                        name
                    )));
                }
                Some(value) if value.shape() != shape.as_slice() => {
                    return Err(ModelError::ShapeMismatch(format!(
                        "graph input '{}' expects shape {:?}, got {:?}",
                        name,
                        shape,
                        value.shape()
                    )));
                }
                Some(_) => {}
            }
        }

        for graph_layer in &mut self.layers {
            let input = values.get(&graph_layer.source).ok_or_else(|| {
                ModelError::ProcessingError(format!(
                    "value of node '{}' is not available",
                    graph_layer.source
                ))
            })?;
            let output = graph_layer.layer.forward(input)?;
            values.insert(graph_layer.name.clone(), output);
        }
        Ok(values)
    }
}
