use super::*;
use std::sync::LazyLock;

/// Builds an operator from its description and an opset version
pub type OperatorFactory = fn(&OperatorNode, i64) -> Result<Box<dyn Operator>, ModelError>;

/// Table from operator type to factory.
///
/// New operator types are supported by registering a factory; the dispatcher itself never
/// changes.
///
/// # Example
/// ```rust
/// use rustycell::prelude::*;
///
/// let registry = OperatorRegistry::with_default_operators();
/// assert!(registry.is_supported_operator("LSTM"));
/// assert!(!registry.is_supported_operator("GRU"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    factories: AHashMap<String, OperatorFactory>,
}

impl OperatorRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every operator shipped by the crate
    pub fn with_default_operators() -> Self {
        let mut registry = Self::new();
        registry.register("LSTM", LstmOperator::create);
        registry.register("Softmax", SoftmaxOperator::create);
        registry
    }

    /// Registers a factory, returning the one it replaces
    pub fn register(
        &mut self,
        op_type: impl Into<String>,
        factory: OperatorFactory,
    ) -> Option<OperatorFactory> {
        self.factories.insert(op_type.into(), factory)
    }

    pub fn is_supported_operator(&self, op_type: &str) -> bool {
        self.factories.contains_key(op_type)
    }

    /// Registered operator types, sorted
    pub fn supported_operators(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Creates the operator for `node`.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - Unsupported type, opset version outside
    ///   `1..=MAX_OPSET_VERSION`, or attributes the operator rejects
    pub fn create_operator(
        &self,
        node: &OperatorNode,
        opset_version: i64,
    ) -> Result<Box<dyn Operator>, ModelError> {
        validate_opset_version(opset_version)?;
        let factory = self.factories.get(&node.op_type).ok_or_else(|| {
            ModelError::InputValidationError(format!(
                "operator type '{}' of '{}' is not supported",
                node.op_type, node.name
            ))
        })?;
        let operator = factory(node, opset_version)?;
        debug!(
            name = node.name.as_str(),
            op_type = node.op_type.as_str(),
            opset_version,
            "created operator"
        );
        Ok(operator)
    }
}

static DEFAULT_REGISTRY: LazyLock<OperatorRegistry> =
    LazyLock::new(OperatorRegistry::with_default_operators);

/// Creates an operator through the process-wide default registry.
pub fn create_operator(
    node: &OperatorNode,
    opset_version: i64,
) -> Result<Box<dyn Operator>, ModelError> {
    DEFAULT_REGISTRY.create_operator(node, opset_version)
}

/// Whether the default registry knows `op_type`
pub fn is_supported_operator(op_type: &str) -> bool {
    DEFAULT_REGISTRY.is_supported_operator(op_type)
}
