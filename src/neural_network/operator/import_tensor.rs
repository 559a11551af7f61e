use super::*;

/// Handle to the output of a graph node whose value is only known when the graph runs.
///
/// # Fields
///
/// - `node` - Name of the graph input or layer producing the value
/// - `shape` - Shape of the value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTensor {
    pub node: String,
    pub shape: Vec<usize>,
}

/// A tensor flowing between imported operators.
///
/// # Variants
///
/// - `Data` - Constant data, operators fold it eagerly
/// - `User` - Graph-backed value, operators add layers consuming it
#[derive(Debug, Clone, PartialEq)]
pub enum ImportTensor {
    Data(Tensor),
    User(UserTensor),
}

impl ImportTensor {
    pub fn shape(&self) -> &[usize] {
        match self {
            ImportTensor::Data(data) => data.shape(),
            ImportTensor::User(user) => &user.shape,
        }
    }

    pub fn as_data(&self) -> Option<&Tensor> {
        match self {
            ImportTensor::Data(data) => Some(data),
            ImportTensor::User(_) => None,
        }
    }

    pub fn as_user(&self) -> Option<&UserTensor> {
        match self {
            ImportTensor::Data(_) => None,
            ImportTensor::User(user) => Some(user),
        }
    }
}
