use super::*;

/// Value of an operator attribute
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Int(i64),
    Float(f32),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
}

impl Attribute {
    fn kind(&self) -> &'static str {
        match self {
            Attribute::Int(_) => "int",
            Attribute::Float(_) => "float",
            Attribute::String(_) => "string",
            Attribute::Ints(_) => "ints",
            Attribute::Floats(_) => "floats",
            Attribute::Strings(_) => "strings",
        }
    }
}

/// Description of one operator in an imported model.
///
/// # Fields
///
/// - `name` - Operator name, unique within the model
/// - `op_type` - Operator type used to look up its factory
/// - `inputs` - Input tensor names, an empty name marks an absent optional input
/// - `outputs` - Output tensor names, an empty name marks an unused output
/// - `attributes` - Named attributes
///
/// # Example
/// ```rust
/// use rustycell::prelude::*;
///
/// let node = OperatorNode::new("softmax_0", "Softmax")
///     .with_inputs(["logits"])
///     .with_outputs(["probabilities"])
///     .with_attribute("axis", Attribute::Int(1));
///
/// assert_eq!(node.get_int("axis").unwrap(), Some(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperatorNode {
    pub name: String,
    pub op_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attributes: AHashMap<String, Attribute>,
}

impl OperatorNode {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            ..Self::default()
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Attribute) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    fn type_error(&self, name: &str, expected: &str, found: &Attribute) -> ModelError {
        ModelError::InputValidationError(format!(
            "attribute '{}' of operator '{}' must be {}, got {}",
            name,
            self.name,
            expected,
            found.kind()
        ))
    }

    /// Integer attribute, `None` if absent
    pub fn get_int(&self, name: &str) -> Result<Option<i64>, ModelError> {
        match self.attributes.get(name) {
            None => Ok(None),
            Some(Attribute::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(self.type_error(name, "an int", other)),
        }
    }

    /// Float attribute, `None` if absent
    pub fn get_float(&self, name: &str) -> Result<Option<f32>, ModelError> {
        match self.attributes.get(name) {
            None => Ok(None),
            Some(Attribute::Float(v)) => Ok(Some(*v)),
            Some(other) => Err(self.type_error(name, "a float", other)),
        }
    }

    /// List-of-floats attribute, `None` if absent
    pub fn get_floats(&self, name: &str) -> Result<Option<&[f32]>, ModelError> {
        match self.attributes.get(name) {
            None => Ok(None),
            Some(Attribute::Floats(v)) => Ok(Some(v.as_slice())),
            Some(other) => Err(self.type_error(name, "a list of floats", other)),
        }
    }

    /// String attribute, `None` if absent
    pub fn get_string(&self, name: &str) -> Result<Option<&str>, ModelError> {
        match self.attributes.get(name) {
            None => Ok(None),
            Some(Attribute::String(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(self.type_error(name, "a string", other)),
        }
    }

    /// List-of-strings attribute, `None` if absent
    pub fn get_strings(&self, name: &str) -> Result<Option<&[String]>, ModelError> {
        match self.attributes.get(name) {
            None => Ok(None),
            Some(Attribute::Strings(v)) => Ok(Some(v.as_slice())),
            Some(other) => Err(self.type_error(name, "a list of strings", other)),
        }
    }
}
