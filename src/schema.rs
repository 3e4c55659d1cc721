//! Operator schemas.
//!
//! A schema is the immutable declarative contract for one version of an
//! operator: its inputs, outputs, type constraints, attributes and the
//! function which infers output types and shapes. Schemas are created with
//! [`OpSchemaBuilder`] and stored in a
//! [`SchemaRegistry`](crate::SchemaRegistry).

use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::attrs::{AttrType, AttrValue};
use crate::data_type::DataType;
use crate::errors::{InferError, VerifyError};
use crate::infer_ctx::InferenceContext;
use crate::node::NodeInfo;

mod builder;

pub use builder::{OpSchemaBuilder, SchemaFragment};

/// Name of the default operator domain.
pub const ONNX_DOMAIN: &str = "";

/// Alternative name for [`ONNX_DOMAIN`].
pub const ONNX_DOMAIN_ALIAS: &str = "ai.onnx";

/// Map domain aliases to their canonical name.
pub fn normalize_domain(domain: &str) -> &str {
    if domain == ONNX_DOMAIN_ALIAS {
        ONNX_DOMAIN
    } else {
        domain
    }
}

/// Identity of a schema in a registry.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct OpId {
    pub domain: String,
    pub name: String,
    pub version: u32,
}

impl OpId {
    pub fn new(domain: &str, name: &str, version: u32) -> Self {
        OpId {
            domain: normalize_domain(domain).to_string(),
            name: name.to_string(),
            version,
        }
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.domain.is_empty() {
            write!(f, "{}-{}", self.name, self.version)
        } else {
            write!(f, "{}::{}-{}", self.domain, self.name, self.version)
        }
    }
}

/// Maturity of an operator definition.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SupportLevel {
    #[default]
    Common,
    Experimental,
}

/// Cardinality of an input or output slot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ParamOption {
    /// Exactly one value.
    #[default]
    Single,
    /// Zero or one value.
    Optional,
    /// One or more values. Only allowed for the last slot.
    Variadic,
}

/// Declaration of an input or output slot.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FormalParameter {
    name: String,

    /// Type constraint name (eg. "T") or a literal type such as
    /// "tensor(int64)".
    type_str: String,

    option: ParamOption,

    /// Element type when `type_str` is a literal type.
    #[cfg_attr(feature = "serde", serde(skip))]
    fixed_type: Option<DataType>,
}

impl FormalParameter {
    pub fn new(name: &str, type_str: &str, option: ParamOption) -> Self {
        FormalParameter {
            name: name.to_string(),
            type_str: type_str.to_string(),
            option,
            fixed_type: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_str(&self) -> &str {
        &self.type_str
    }

    pub fn option(&self) -> ParamOption {
        self.option
    }

    /// Return the element type if the slot has a literal type rather than a
    /// type constraint.
    pub fn fixed_type(&self) -> Option<DataType> {
        self.fixed_type
    }
}

/// Named set of element types shared by one or more slots.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct TypeConstraint {
    name: String,
    allowed: Vec<DataType>,
}

impl TypeConstraint {
    pub fn new(name: &str, allowed: &[DataType]) -> Self {
        TypeConstraint {
            name: name.to_string(),
            allowed: allowed.to_vec(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allowed(&self) -> &[DataType] {
        &self.allowed
    }
}

/// Declaration of an attribute.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AttrSpec {
    name: String,
    attr_type: AttrType,

    /// True if every instance must set this attribute.
    required: bool,

    /// Value used when the attribute is absent.
    default: Option<AttrValue>,
}

impl AttrSpec {
    /// Declare an attribute with a default value.
    pub fn with_default(name: &str, attr_type: AttrType, default: impl Into<AttrValue>) -> Self {
        AttrSpec {
            name: name.to_string(),
            attr_type,
            required: false,
            default: Some(default.into()),
        }
    }

    /// Declare an optional attribute with no default.
    pub fn optional(name: &str, attr_type: AttrType) -> Self {
        AttrSpec {
            name: name.to_string(),
            attr_type,
            required: false,
            default: None,
        }
    }

    /// Declare an attribute which must be set on every instance.
    pub fn required(name: &str, attr_type: AttrType) -> Self {
        AttrSpec {
            name: name.to_string(),
            attr_type,
            required: true,
            default: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&AttrValue> {
        self.default.as_ref()
    }
}

/// Function which infers output types and shapes of an operator.
///
/// Inference functions must be pure. They read the context's attributes and
/// inputs and refine its outputs. Outputs which cannot be resolved are left
/// unchanged. Errors are reserved for operator instances which violate the
/// operator's contract.
pub type InferFn = fn(&mut InferenceContext) -> Result<(), InferError>;

#[cfg(feature = "serde")]
fn serialize_is_some<S: serde::Serializer>(
    infer_fn: &Option<InferFn>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_bool(infer_fn.is_some())
}

/// Schema for one version of an operator.
///
/// Schemas are immutable once built.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct OpSchema {
    name: String,
    domain: String,
    since_version: u32,
    doc: Option<String>,
    support_level: SupportLevel,
    inputs: Vec<FormalParameter>,
    outputs: Vec<FormalParameter>,
    type_constraints: Vec<TypeConstraint>,
    attrs: Vec<AttrSpec>,
    allow_unchecked_attrs: bool,

    #[cfg_attr(
        feature = "serde",
        serde(rename = "has_inference", serialize_with = "serialize_is_some")
    )]
    infer_fn: Option<InferFn>,
}

impl OpSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn since_version(&self) -> u32 {
        self.since_version
    }

    pub fn id(&self) -> OpId {
        OpId::new(&self.domain, &self.name, self.since_version)
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn support_level(&self) -> SupportLevel {
        self.support_level
    }

    pub fn inputs(&self) -> &[FormalParameter] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[FormalParameter] {
        &self.outputs
    }

    pub fn type_constraints(&self) -> &[TypeConstraint] {
        &self.type_constraints
    }

    pub fn type_constraint(&self, name: &str) -> Option<&TypeConstraint> {
        self.type_constraints.iter().find(|tc| tc.name == name)
    }

    pub fn attrs(&self) -> &[AttrSpec] {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrSpec> {
        self.attrs.iter().find(|attr| attr.name == name)
    }

    /// Return true if instances may have attributes the schema does not
    /// declare.
    pub fn allows_unchecked_attrs(&self) -> bool {
        self.allow_unchecked_attrs
    }

    pub fn has_inference(&self) -> bool {
        self.infer_fn.is_some()
    }

    /// Return the element types allowed for a slot.
    pub fn allowed_types<'a>(&'a self, param: &'a FormalParameter) -> Option<&'a [DataType]> {
        if let Some(dtype) = param.fixed_type.as_ref() {
            return Some(std::slice::from_ref(dtype));
        }
        self.type_constraint(&param.type_str).map(|tc| tc.allowed())
    }

    pub fn min_inputs(&self) -> usize {
        min_count(&self.inputs)
    }

    pub fn max_inputs(&self) -> usize {
        max_count(&self.inputs)
    }

    pub fn min_outputs(&self) -> usize {
        min_count(&self.outputs)
    }

    pub fn max_outputs(&self) -> usize {
        max_count(&self.outputs)
    }

    /// Return the slot which the index'th input binds to.
    ///
    /// Inputs beyond the last slot bind to it if it is variadic.
    pub fn input_param(&self, index: usize) -> Option<&FormalParameter> {
        param_for_index(&self.inputs, index)
    }

    pub fn output_param(&self, index: usize) -> Option<&FormalParameter> {
        param_for_index(&self.outputs, index)
    }

    /// Run this schema's inference function.
    ///
    /// Attribute reads in the inference function are checked against the
    /// attributes this schema declares. If the schema has no inference
    /// function the outputs are left unchanged.
    pub fn infer<'a>(&'a self, ctx: &mut InferenceContext<'a>) -> Result<(), InferError> {
        let Some(infer_fn) = self.infer_fn else {
            debug!(op = %self.id(), "no inference function");
            return Ok(());
        };
        ctx.bind_schema(self);
        debug!(
            op = %self.id(),
            inputs = ctx.num_inputs(),
            outputs = ctx.num_outputs(),
            "running inference"
        );
        infer_fn(ctx)
    }

    /// Check that an operator instance satisfies this schema.
    ///
    /// This checks input and output counts, that required attributes are
    /// present, that attributes are declared (unless unchecked attributes are
    /// allowed) and have the declared kinds, and that known input element
    /// types satisfy their type constraints.
    pub fn verify(&self, node: &NodeInfo) -> Result<(), VerifyError> {
        let (min, max, actual) = (self.min_inputs(), self.max_inputs(), node.inputs.len());
        if actual < min || actual > max {
            return Err(VerifyError::InputCount { min, max, actual });
        }
        let (min, max, actual) = (self.min_outputs(), self.max_outputs(), node.num_outputs);
        if actual < min || actual > max {
            return Err(VerifyError::OutputCount { min, max, actual });
        }

        for spec in self.attrs.iter().filter(|spec| spec.required) {
            if !node.attrs.contains(&spec.name) {
                return Err(VerifyError::MissingAttr {
                    name: spec.name.clone(),
                });
            }
        }
        for (name, value) in node.attrs.iter() {
            match self.attr(name) {
                Some(spec) if spec.attr_type != value.attr_type() => {
                    return Err(VerifyError::Attr(crate::attrs::AttrError::TypeMismatch {
                        name: name.to_string(),
                        expected: spec.attr_type,
                        actual: value.attr_type(),
                    }));
                }
                Some(_) => {}
                None if self.allow_unchecked_attrs => {}
                None => {
                    return Err(VerifyError::UndeclaredAttr {
                        name: name.to_string(),
                    });
                }
            }
        }

        let mut bound_types: FxHashMap<&str, DataType> = FxHashMap::default();
        for (index, input) in node.inputs.iter().enumerate() {
            let (Some(dtype), Some(param)) = (input.elem_type, self.input_param(index)) else {
                continue;
            };
            if let Some(allowed) = self.allowed_types(param) {
                if !allowed.contains(&dtype) {
                    return Err(VerifyError::InputType {
                        index,
                        type_str: param.type_str.clone(),
                        actual: dtype,
                    });
                }
            }
            if param.fixed_type.is_some() {
                continue;
            }
            match bound_types.get(param.type_str.as_str()) {
                Some(&first) if first != dtype => {
                    return Err(VerifyError::InconsistentType {
                        type_str: param.type_str.clone(),
                        first,
                        other: dtype,
                    });
                }
                Some(_) => {}
                None => {
                    bound_types.insert(&param.type_str, dtype);
                }
            }
        }

        Ok(())
    }
}

fn min_count(params: &[FormalParameter]) -> usize {
    params
        .iter()
        .rposition(|p| p.option != ParamOption::Optional)
        .map(|pos| pos + 1)
        .unwrap_or(0)
}

fn max_count(params: &[FormalParameter]) -> usize {
    match params.last() {
        Some(p) if p.option == ParamOption::Variadic => usize::MAX,
        _ => params.len(),
    }
}

fn param_for_index(params: &[FormalParameter], index: usize) -> Option<&FormalParameter> {
    params.get(index).or_else(|| {
        params
            .last()
            .filter(|p| p.option == ParamOption::Variadic)
    })
}

#[cfg(test)]
mod tests {
    use opschema_testing::TestCases;

    use super::{normalize_domain, OpId, OpSchema, OpSchemaBuilder, ParamOption};
    use crate::attrs::{AttrError, AttrType, Attributes};
    use crate::data_type::DataType;
    use crate::errors::VerifyError;
    use crate::node::NodeInfo;
    use crate::shape::ValueType;

    fn fill_schema() -> OpSchema {
        OpSchemaBuilder::new("Fill")
            .required_attr("value", AttrType::Float)
            .optional_attr("shape", AttrType::Ints)
            .input_with(0, "input", "T1", ParamOption::Optional)
            .output(0, "output", "tensor(float)")
            .type_constraint("T1", &[DataType::Int32, DataType::Int64])
            .build()
            .unwrap()
    }

    fn concat_schema() -> OpSchema {
        OpSchemaBuilder::new("Concat")
            .input_with(0, "inputs", "T", ParamOption::Variadic)
            .output(0, "concat", "T")
            .type_constraint("T", &DataType::ALL_NUMERIC)
            .build()
            .unwrap()
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("ai.onnx"), "");
        assert_eq!(normalize_domain(""), "");
        assert_eq!(normalize_domain("com.example"), "com.example");
        assert_eq!(OpId::new("ai.onnx", "Not", 1).to_string(), "Not-1");
        assert_eq!(
            OpId::new("com.example", "Foo", 2).to_string(),
            "com.example::Foo-2"
        );
    }

    #[test]
    fn test_arity() {
        let fill = fill_schema();
        assert_eq!((fill.min_inputs(), fill.max_inputs()), (0, 1));
        assert_eq!((fill.min_outputs(), fill.max_outputs()), (1, 1));

        let concat = concat_schema();
        assert_eq!((concat.min_inputs(), concat.max_inputs()), (1, usize::MAX));
        assert_eq!(concat.input_param(5).map(|p| p.name()), Some("inputs"));
        assert_eq!(fill.input_param(1), None);
    }

    #[test]
    fn test_allowed_types() {
        let fill = fill_schema();
        assert_eq!(
            fill.allowed_types(&fill.outputs()[0]),
            Some([DataType::Float].as_slice())
        );
        assert_eq!(
            fill.allowed_types(&fill.inputs()[0]),
            Some([DataType::Int32, DataType::Int64].as_slice())
        );
    }

    #[test]
    fn test_verify() {
        #[derive(Debug)]
        struct Case {
            schema: OpSchema,
            node: NodeInfo,
            expected: Result<(), VerifyError>,
        }

        let f32_vec = ValueType::tensor(DataType::Float, &[4]);
        let i32_vec = ValueType::tensor(DataType::Int32, &[4]);
        let i64_vec = ValueType::tensor(DataType::Int64, &[4]);
        let value_attr = Attributes::new().with("value", 1.0f32);

        let cases = [
            Case {
                schema: fill_schema(),
                node: NodeInfo::new("Fill", 1).with_attrs(value_attr.clone()),
                expected: Ok(()),
            },
            Case {
                schema: fill_schema(),
                node: NodeInfo::new("Fill", 1),
                expected: Err(VerifyError::MissingAttr {
                    name: "value".to_string(),
                }),
            },
            Case {
                schema: fill_schema(),
                node: NodeInfo::new("Fill", 1).with_attrs(value_attr.clone().with("dtype", 1i64)),
                expected: Err(VerifyError::UndeclaredAttr {
                    name: "dtype".to_string(),
                }),
            },
            Case {
                schema: fill_schema(),
                node: NodeInfo::new("Fill", 1)
                    .with_attrs(Attributes::new().with("value", 1i64)),
                expected: Err(VerifyError::Attr(AttrError::TypeMismatch {
                    name: "value".to_string(),
                    expected: AttrType::Float,
                    actual: AttrType::Int,
                })),
            },
            Case {
                schema: fill_schema(),
                node: NodeInfo::new("Fill", 1)
                    .with_attrs(value_attr.clone())
                    .with_inputs([f32_vec.clone()]),
                expected: Err(VerifyError::InputType {
                    index: 0,
                    type_str: "T1".to_string(),
                    actual: DataType::Float,
                }),
            },
            Case {
                schema: fill_schema(),
                node: NodeInfo::new("Fill", 1)
                    .with_attrs(value_attr.clone())
                    .with_inputs([i32_vec.clone(), i32_vec.clone()]),
                expected: Err(VerifyError::InputCount {
                    min: 0,
                    max: 1,
                    actual: 2,
                }),
            },
            Case {
                schema: fill_schema(),
                node: NodeInfo::new("Fill", 1)
                    .with_attrs(value_attr.clone())
                    .with_num_outputs(2),
                expected: Err(VerifyError::OutputCount {
                    min: 1,
                    max: 1,
                    actual: 2,
                }),
            },
            Case {
                schema: concat_schema(),
                node: NodeInfo::new("Concat", 1).with_inputs([i32_vec.clone(), i32_vec.clone()]),
                expected: Ok(()),
            },
            Case {
                schema: concat_schema(),
                node: NodeInfo::new("Concat", 1).with_inputs([i32_vec.clone(), i64_vec.clone()]),
                expected: Err(VerifyError::InconsistentType {
                    type_str: "T".to_string(),
                    first: DataType::Int32,
                    other: DataType::Int64,
                }),
            },
            Case {
                schema: concat_schema(),
                node: NodeInfo::new("Concat", 1),
                expected: Err(VerifyError::InputCount {
                    min: 1,
                    max: usize::MAX,
                    actual: 0,
                }),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(case.schema.verify(&case.node), case.expected);
        });
    }
}
