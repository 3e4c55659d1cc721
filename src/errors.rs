//! Error types for schema construction, registration, verification and
//! inference.

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::attrs::{AttrError, AttrType};
use crate::data_type::DataType;
use crate::schema::OpId;
use crate::shape::RefineError;

/// Error raised by an inference function when the operator instance
/// violates its contract.
///
/// Inability to determine a type or shape is not an error. Inference
/// functions handle that by leaving outputs unresolved.
#[derive(Clone, Debug, PartialEq)]
pub enum InferError {
    /// An attribute holds a different kind of value than the schema declares.
    Attr(AttrError),

    /// An attribute was read which the schema does not declare.
    UndeclaredAttr { name: String },

    /// An attribute has an invalid value.
    InvalidAttrValue {
        /// Name of the attribute.
        name: String,
        /// Description of the problem.
        error: String,
    },

    /// An attribute which specifies an element type has a value that is not
    /// a valid `TensorProto.DataType` code.
    InvalidElemTypeCode { name: String, code: i64 },

    /// An axis is outside the range `[-ndim, ndim)` for an input of known rank.
    AxisOutOfRange { axis: i64, ndim: usize },

    /// An inference function tried to write an output slot that the context
    /// does not have.
    OutputIndexOutOfRange { index: usize, count: usize },

    /// An update to an output contradicts what is already known about it.
    Conflict { output: usize, error: RefineError },

    /// The node has a number of outputs the schema does not allow.
    OutputCount {
        min: usize,
        /// Maximum output count, or `usize::MAX` for a variadic output.
        max: usize,
        actual: usize,
    },
}

impl InferError {
    pub(crate) fn invalid_attr(name: &str, error: impl AsRef<str>) -> Self {
        InferError::InvalidAttrValue {
            name: name.to_string(),
            error: error.as_ref().to_string(),
        }
    }
}

impl From<AttrError> for InferError {
    fn from(val: AttrError) -> Self {
        InferError::Attr(val)
    }
}

impl Display for InferError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InferError::Attr(err) => write!(f, "{}", err),
            InferError::UndeclaredAttr { name } => {
                write!(f, "attribute \"{}\" is not declared by the schema", name)
            }
            InferError::InvalidAttrValue { name, error } => {
                write!(f, "error in attribute \"{}\": {}", name, error)
            }
            InferError::InvalidElemTypeCode { name, code } => {
                write!(f, "attribute \"{}\" has invalid data type {}", name, code)
            }
            InferError::AxisOutOfRange { axis, ndim } => {
                write!(f, "axis {} is out of range for rank {}", axis, ndim)
            }
            InferError::OutputIndexOutOfRange { index, count } => {
                write!(f, "output {} is out of range ({} outputs)", index, count)
            }
            InferError::Conflict { output, error } => {
                write!(f, "output {}: {}", output, error)
            }
            InferError::OutputCount { min, max, actual } => {
                write!(f, "expected {}..={} outputs but got {}", min, max, actual)
            }
        }
    }
}

impl Error for InferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InferError::Attr(err) => Some(err),
            InferError::Conflict { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// An [`InferError`] annotated with the operator and node it occurred in.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeError {
    /// Identity of the operator's schema.
    pub op: OpId,
    /// Name of the node, if it has one.
    pub node: Option<String>,
    pub error: InferError,
}

impl Display for NodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.node {
            Some(node) => write!(f, "node \"{}\" ({}): {}", node, self.op, self.error),
            None => write!(f, "{}: {}", self.op, self.error),
        }
    }
}

impl Error for NodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

/// Input or output slot list of a schema.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SlotKind {
    Input,
    Output,
}

impl Display for SlotKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotKind::Input => write!(f, "input"),
            SlotKind::Output => write!(f, "output"),
        }
    }
}

/// Error when a schema declaration is malformed.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaError {
    /// The schema has an empty name.
    MissingName,

    /// The same input or output index was declared twice.
    DuplicateSlot { kind: SlotKind, index: usize },

    /// Slot indices are not contiguous from zero.
    MissingSlot { kind: SlotKind, index: usize },

    /// A variadic slot is followed by another slot.
    VariadicNotLast { kind: SlotKind, index: usize },

    /// An attribute with the same name was declared twice.
    DuplicateAttr { name: String },

    /// A type constraint with the same name was declared twice.
    DuplicateTypeConstraint { name: String },

    /// A slot refers to a type constraint which was not declared, and the
    /// type string is not a literal `tensor(<type>)`.
    UndeclaredTypeConstraint {
        kind: SlotKind,
        index: usize,
        type_str: String,
    },

    /// An attribute's default value has a different kind than the attribute.
    DefaultTypeMismatch {
        name: String,
        expected: AttrType,
        actual: AttrType,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::MissingName => write!(f, "schema has no name"),
            SchemaError::DuplicateSlot { kind, index } => {
                write!(f, "{} {} declared more than once", kind, index)
            }
            SchemaError::MissingSlot { kind, index } => {
                write!(f, "{} {} is not declared", kind, index)
            }
            SchemaError::VariadicNotLast { kind, index } => {
                write!(f, "variadic {} {} is not the last {}", kind, index, kind)
            }
            SchemaError::DuplicateAttr { name } => {
                write!(f, "attribute \"{}\" declared more than once", name)
            }
            SchemaError::DuplicateTypeConstraint { name } => {
                write!(f, "type constraint \"{}\" declared more than once", name)
            }
            SchemaError::UndeclaredTypeConstraint {
                kind,
                index,
                type_str,
            } => write!(
                f,
                "{} {} uses undeclared type constraint \"{}\"",
                kind, index, type_str
            ),
            SchemaError::DefaultTypeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "attribute \"{}\" has type {} but its default has type {}",
                name, expected, actual
            ),
        }
    }
}

impl Error for SchemaError {}

/// Error when adding a schema to a registry.
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryError {
    /// A schema with the same domain, name and version is already registered.
    DuplicateSchema(OpId),

    /// The schema declaration is malformed.
    InvalidSchema { name: String, error: SchemaError },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateSchema(op) => write!(f, "{} is already registered", op),
            RegistryError::InvalidSchema { name, error } => {
                write!(f, "invalid schema for \"{}\": {}", name, error)
            }
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RegistryError::InvalidSchema { error, .. } => Some(error),
            RegistryError::DuplicateSchema(_) => None,
        }
    }
}

/// Error when an operator instance does not satisfy its schema.
#[derive(Clone, Debug, PartialEq)]
pub enum VerifyError {
    /// The number of inputs is outside the range the schema allows.
    InputCount { min: usize, max: usize, actual: usize },

    /// The number of outputs is outside the range the schema allows.
    OutputCount { min: usize, max: usize, actual: usize },

    /// A required attribute is missing.
    MissingAttr { name: String },

    /// The node has an attribute the schema does not declare.
    UndeclaredAttr { name: String },

    /// An attribute has a different kind than the schema declares.
    Attr(AttrError),

    /// An input's element type is not allowed by its slot's type constraint.
    InputType {
        index: usize,
        type_str: String,
        actual: DataType,
    },

    /// Inputs bound to the same type constraint have different element types.
    InconsistentType {
        type_str: String,
        first: DataType,
        other: DataType,
    },
}

impl Display for VerifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::InputCount { min, max, actual } => {
                write!(f, "expected {}..={} inputs but got {}", min, max, actual)
            }
            VerifyError::OutputCount { min, max, actual } => {
                write!(f, "expected {}..={} outputs but got {}", min, max, actual)
            }
            VerifyError::MissingAttr { name } => {
                write!(f, "required attribute \"{}\" is missing", name)
            }
            VerifyError::UndeclaredAttr { name } => {
                write!(f, "unrecognized attribute \"{}\"", name)
            }
            VerifyError::Attr(err) => write!(f, "{}", err),
            VerifyError::InputType {
                index,
                type_str,
                actual,
            } => write!(
                f,
                "input {} has type {} which is not allowed by \"{}\"",
                index, actual, type_str
            ),
            VerifyError::InconsistentType {
                type_str,
                first,
                other,
            } => write!(
                f,
                "inputs bound to \"{}\" have different types {} and {}",
                type_str, first, other
            ),
        }
    }
}

impl Error for VerifyError {}

#[cfg(test)]
mod tests {
    use super::{InferError, NodeError, RegistryError, SchemaError, SlotKind};
    use crate::attrs::{AttrError, AttrType};
    use crate::schema::OpId;

    #[test]
    fn test_error_messages() {
        let op = OpId::new("", "ReduceSum", 1);

        let err = NodeError {
            op: op.clone(),
            node: Some("sum_1".to_string()),
            error: InferError::AxisOutOfRange { axis: 3, ndim: 2 },
        };
        assert_eq!(
            err.to_string(),
            "node \"sum_1\" (ReduceSum-1): axis 3 is out of range for rank 2"
        );

        let err = InferError::OutputCount {
            min: 1,
            max: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "expected 1..=2 outputs but got 3");

        let err = RegistryError::DuplicateSchema(op);
        assert_eq!(err.to_string(), "ReduceSum-1 is already registered");

        let err = SchemaError::DuplicateSlot {
            kind: SlotKind::Input,
            index: 0,
        };
        assert_eq!(err.to_string(), "input 0 declared more than once");

        let err: InferError = AttrError::TypeMismatch {
            name: "axis".to_string(),
            expected: AttrType::Int,
            actual: AttrType::String,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "attribute \"axis\" has type STRING but INT was requested"
        );
    }
}
