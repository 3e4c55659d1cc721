use tracing::warn;

use super::{
    normalize_domain, AttrSpec, FormalParameter, InferFn, OpSchema, ParamOption, SupportLevel,
    TypeConstraint,
};
use crate::attrs::{AttrType, AttrValue};
use crate::data_type::DataType;
use crate::errors::{RegistryError, SchemaError, SlotKind};
use crate::schema_registry::SchemaRegistry;

/// Reusable part of a schema declaration.
///
/// Families of operators which share a contract, such as the binary logical
/// operators or the reductions, are declared by a function that returns a
/// fragment. The fragment is applied to each member's builder with
/// [`OpSchemaBuilder::fill_using`].
#[derive(Clone, Debug, Default)]
pub struct SchemaFragment {
    doc: Option<String>,
    attrs: Vec<AttrSpec>,
    inputs: Vec<(usize, FormalParameter)>,
    outputs: Vec<(usize, FormalParameter)>,
    type_constraints: Vec<TypeConstraint>,
    infer_fn: Option<InferFn>,
}

impl SchemaFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Declare an attribute with a default value.
    pub fn attr(mut self, name: &str, attr_type: AttrType, default: impl Into<AttrValue>) -> Self {
        self.attrs.push(AttrSpec::with_default(name, attr_type, default));
        self
    }

    /// Declare an attribute which may be absent and has no default.
    pub fn optional_attr(mut self, name: &str, attr_type: AttrType) -> Self {
        self.attrs.push(AttrSpec::optional(name, attr_type));
        self
    }

    pub fn required_attr(mut self, name: &str, attr_type: AttrType) -> Self {
        self.attrs.push(AttrSpec::required(name, attr_type));
        self
    }

    /// Declare a single-valued input.
    pub fn input(self, index: usize, name: &str, type_str: &str) -> Self {
        self.input_with(index, name, type_str, ParamOption::Single)
    }

    pub fn input_with(
        mut self,
        index: usize,
        name: &str,
        type_str: &str,
        option: ParamOption,
    ) -> Self {
        self.inputs
            .push((index, FormalParameter::new(name, type_str, option)));
        self
    }

    /// Declare a single-valued output.
    pub fn output(self, index: usize, name: &str, type_str: &str) -> Self {
        self.output_with(index, name, type_str, ParamOption::Single)
    }

    pub fn output_with(
        mut self,
        index: usize,
        name: &str,
        type_str: &str,
        option: ParamOption,
    ) -> Self {
        self.outputs
            .push((index, FormalParameter::new(name, type_str, option)));
        self
    }

    pub fn type_constraint(mut self, name: &str, allowed: &[DataType]) -> Self {
        self.type_constraints
            .push(TypeConstraint::new(name, allowed));
        self
    }

    pub fn inference_fn(mut self, infer_fn: InferFn) -> Self {
        self.infer_fn = Some(infer_fn);
        self
    }

    /// Merge `other` into this fragment.
    ///
    /// Declarations are appended. The doc and inference function of `other`
    /// replace those of `self` if set.
    fn merge(&mut self, other: SchemaFragment) {
        if other.doc.is_some() {
            self.doc = other.doc;
        }
        if other.infer_fn.is_some() {
            self.infer_fn = other.infer_fn;
        }
        self.attrs.extend(other.attrs);
        self.inputs.extend(other.inputs);
        self.outputs.extend(other.outputs);
        self.type_constraints.extend(other.type_constraints);
    }
}

/// Builder for an [`OpSchema`].
///
/// Declarations are validated when [`build`](OpSchemaBuilder::build) is
/// called.
///
/// ```
/// use opschema::{AttrType, DataType, OpSchemaBuilder};
/// use opschema::infer_shapes::propagate_shape_and_type_from_first_input;
///
/// let schema = OpSchemaBuilder::new("Scale")
///     .support_level(opschema::SupportLevel::Experimental)
///     .attr("scale", AttrType::Float, 1.0f32)
///     .input(0, "input", "T")
///     .output(0, "output", "T")
///     .type_constraint("T", &DataType::FLOAT_TYPES)
///     .inference_fn(propagate_shape_and_type_from_first_input)
///     .build()
///     .unwrap();
/// assert_eq!(schema.id().to_string(), "Scale-1");
/// ```
#[derive(Clone, Debug)]
pub struct OpSchemaBuilder {
    name: String,
    domain: String,
    since_version: u32,
    support_level: SupportLevel,
    allow_unchecked_attrs: bool,
    parts: SchemaFragment,
}

/// Generate builder methods which forward to the [`SchemaFragment`] that
/// holds the builder's declarations.
macro_rules! forward_to_parts {
    ($($(#[$meta:meta])* fn $method:ident($($arg:ident: $type:ty),*);)*) => {
        $(
            $(#[$meta])*
            pub fn $method(mut self, $($arg: $type),*) -> Self {
                self.parts = self.parts.$method($($arg),*);
                self
            }
        )*
    };
}

impl OpSchemaBuilder {
    /// Start declaring version 1 of an operator in the default domain.
    pub fn new(name: &str) -> Self {
        OpSchemaBuilder {
            name: name.to_string(),
            domain: String::new(),
            since_version: 1,
            support_level: SupportLevel::Common,
            allow_unchecked_attrs: false,
            parts: SchemaFragment::new(),
        }
    }

    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = normalize_domain(domain).to_string();
        self
    }

    pub fn since_version(mut self, version: u32) -> Self {
        self.since_version = version;
        self
    }

    pub fn support_level(mut self, level: SupportLevel) -> Self {
        self.support_level = level;
        self
    }

    /// Allow instances to carry attributes the schema does not declare.
    pub fn allow_unchecked_attrs(mut self) -> Self {
        self.allow_unchecked_attrs = true;
        self
    }

    forward_to_parts! {
        fn doc(doc: impl Into<String>);

        /// Declare an attribute with a default value.
        fn attr(name: &str, attr_type: AttrType, default: impl Into<AttrValue>);

        /// Declare an attribute which may be absent and has no default.
        fn optional_attr(name: &str, attr_type: AttrType);

        fn required_attr(name: &str, attr_type: AttrType);

        /// Declare a single-valued input.
        ///
        /// `type_str` is either the name of a type constraint or a literal
        /// type such as "tensor(int64)".
        fn input(index: usize, name: &str, type_str: &str);

        fn input_with(index: usize, name: &str, type_str: &str, option: ParamOption);

        /// Declare a single-valued output.
        fn output(index: usize, name: &str, type_str: &str);

        fn output_with(index: usize, name: &str, type_str: &str, option: ParamOption);

        fn type_constraint(name: &str, allowed: &[DataType]);

        fn inference_fn(infer_fn: InferFn);
    }

    /// Apply a schema fragment.
    pub fn fill_using(mut self, fragment: SchemaFragment) -> Self {
        self.parts.merge(fragment);
        self
    }

    /// Validate the declarations and create the schema.
    pub fn build(self) -> Result<OpSchema, SchemaError> {
        if self.name.is_empty() {
            return Err(SchemaError::MissingName);
        }

        let SchemaFragment {
            doc,
            attrs,
            inputs,
            outputs,
            type_constraints,
            infer_fn,
        } = self.parts;

        for (i, tc) in type_constraints.iter().enumerate() {
            if type_constraints[..i].iter().any(|prev| prev.name == tc.name) {
                return Err(SchemaError::DuplicateTypeConstraint {
                    name: tc.name.clone(),
                });
            }
        }

        for (i, attr) in attrs.iter().enumerate() {
            if attrs[..i].iter().any(|prev| prev.name == attr.name) {
                return Err(SchemaError::DuplicateAttr {
                    name: attr.name.clone(),
                });
            }
            if let Some(default) = &attr.default {
                if default.attr_type() != attr.attr_type {
                    return Err(SchemaError::DefaultTypeMismatch {
                        name: attr.name.clone(),
                        expected: attr.attr_type,
                        actual: default.attr_type(),
                    });
                }
            }
        }

        let inputs = resolve_slots(SlotKind::Input, inputs, &type_constraints)?;
        let outputs = resolve_slots(SlotKind::Output, outputs, &type_constraints)?;

        let schema = OpSchema {
            name: self.name,
            domain: self.domain,
            since_version: self.since_version,
            doc,
            support_level: self.support_level,
            inputs,
            outputs,
            type_constraints,
            attrs,
            allow_unchecked_attrs: self.allow_unchecked_attrs,
            infer_fn,
        };

        for tc in schema.type_constraints.iter() {
            let used = schema
                .inputs
                .iter()
                .chain(schema.outputs.iter())
                .any(|param| param.type_str == tc.name);
            if !used {
                warn!(
                    op = %schema.id(),
                    constraint = tc.name.as_str(),
                    "type constraint is not used by any input or output"
                );
            }
        }

        Ok(schema)
    }

    /// Build the schema and add it to `registry`.
    pub fn register(self, registry: &mut SchemaRegistry) -> Result<(), RegistryError> {
        let name = self.name.clone();
        let schema = self
            .build()
            .map_err(|error| RegistryError::InvalidSchema { name, error })?;
        registry.register(schema)
    }
}

/// Order slots by index, check they form a valid sequence and resolve their
/// type strings.
fn resolve_slots(
    kind: SlotKind,
    mut slots: Vec<(usize, FormalParameter)>,
    type_constraints: &[TypeConstraint],
) -> Result<Vec<FormalParameter>, SchemaError> {
    slots.sort_by_key(|(index, _)| *index);

    let count = slots.len();
    let mut params = Vec::with_capacity(count);
    for (pos, (index, mut param)) in slots.into_iter().enumerate() {
        if index < pos {
            return Err(SchemaError::DuplicateSlot { kind, index });
        }
        if index > pos {
            return Err(SchemaError::MissingSlot { kind, index: pos });
        }
        if param.option == ParamOption::Variadic && pos + 1 != count {
            return Err(SchemaError::VariadicNotLast { kind, index });
        }
        if !type_constraints.iter().any(|tc| tc.name == param.type_str) {
            let Some(dtype) = DataType::from_type_str(&param.type_str) else {
                return Err(SchemaError::UndeclaredTypeConstraint {
                    kind,
                    index,
                    type_str: param.type_str,
                });
            };
            param.fixed_type = Some(dtype);
        }
        params.push(param);
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use opschema_testing::TestCases;

    use super::{OpSchemaBuilder, SchemaFragment};
    use crate::attrs::{AttrType, AttrValue};
    use crate::data_type::DataType;
    use crate::errors::{RegistryError, SchemaError, SlotKind};
    use crate::schema::{ParamOption, SupportLevel};
    use crate::schema_registry::SchemaRegistry;

    #[test]
    fn test_build_schema() {
        let schema = OpSchemaBuilder::new("ArgMax")
            .domain("ai.onnx")
            .since_version(3)
            .doc("Index of the largest element")
            .attr("axis", AttrType::Int, 0i64)
            .attr("keepdims", AttrType::Int, 1i64)
            .output(0, "reduced", "tensor(int64)")
            .input(0, "data", "T")
            .type_constraint("T", &DataType::ALL_NUMERIC)
            .build()
            .unwrap();

        assert_eq!(schema.id().to_string(), "ArgMax-3");
        assert_eq!(schema.domain(), "");
        assert_eq!(schema.doc(), Some("Index of the largest element"));
        assert_eq!(schema.support_level(), SupportLevel::Common);
        assert_eq!(schema.inputs()[0].name(), "data");
        assert_eq!(schema.inputs()[0].fixed_type(), None);
        assert_eq!(schema.outputs()[0].fixed_type(), Some(DataType::Int64));
        assert_eq!(
            schema.attr("keepdims").and_then(|a| a.default_value()),
            Some(&AttrValue::Int(1))
        );
        assert!(!schema.has_inference());
    }

    #[test]
    fn test_build_errors() {
        #[derive(Clone, Debug)]
        struct Case {
            builder: OpSchemaBuilder,
            expected: SchemaError,
        }

        let base = OpSchemaBuilder::new("Op").type_constraint("T", &DataType::ALL);

        let cases = [
            Case {
                builder: OpSchemaBuilder::new(""),
                expected: SchemaError::MissingName,
            },
            Case {
                builder: base.clone().input(0, "a", "T").input(0, "b", "T"),
                expected: SchemaError::DuplicateSlot {
                    kind: SlotKind::Input,
                    index: 0,
                },
            },
            Case {
                builder: base.clone().output(0, "a", "T").output(2, "b", "T"),
                expected: SchemaError::MissingSlot {
                    kind: SlotKind::Output,
                    index: 1,
                },
            },
            Case {
                builder: base
                    .clone()
                    .input_with(0, "a", "T", ParamOption::Variadic)
                    .input(1, "b", "T"),
                expected: SchemaError::VariadicNotLast {
                    kind: SlotKind::Input,
                    index: 0,
                },
            },
            Case {
                builder: base.clone().input(0, "a", "U"),
                expected: SchemaError::UndeclaredTypeConstraint {
                    kind: SlotKind::Input,
                    index: 0,
                    type_str: "U".to_string(),
                },
            },
            Case {
                builder: base.clone().type_constraint("T", &[DataType::Bool]),
                expected: SchemaError::DuplicateTypeConstraint {
                    name: "T".to_string(),
                },
            },
            Case {
                builder: base
                    .clone()
                    .attr("axis", AttrType::Int, 0i64)
                    .optional_attr("axis", AttrType::Int),
                expected: SchemaError::DuplicateAttr {
                    name: "axis".to_string(),
                },
            },
            Case {
                builder: base.clone().attr("alpha", AttrType::Float, 1i64),
                expected: SchemaError::DefaultTypeMismatch {
                    name: "alpha".to_string(),
                    expected: AttrType::Float,
                    actual: AttrType::Int,
                },
            },
        ];

        cases.test_each_clone(|case| {
            assert_eq!(case.builder.build().err(), Some(case.expected));
        });
    }

    #[test]
    fn test_fill_using() {
        fn unary_fragment() -> SchemaFragment {
            SchemaFragment::new()
                .doc("Unary op")
                .input(0, "X", "T")
                .output(0, "Y", "T")
                .type_constraint("T", &DataType::FLOAT_TYPES)
        }

        let schema = OpSchemaBuilder::new("Scale")
            .fill_using(unary_fragment())
            .attr("scale", AttrType::Float, 1.0f32)
            .build()
            .unwrap();

        assert_eq!(schema.doc(), Some("Unary op"));
        assert_eq!(schema.inputs().len(), 1);
        assert_eq!(schema.outputs().len(), 1);
        assert!(schema.attr("scale").is_some());
        assert_eq!(
            schema.type_constraint("T").map(|tc| tc.allowed()),
            Some(DataType::FLOAT_TYPES.as_slice())
        );
    }

    #[test]
    fn test_register_invalid_schema() {
        let mut registry = SchemaRegistry::new();
        let err = OpSchemaBuilder::new("Bad")
            .input(0, "x", "T")
            .register(&mut registry)
            .err();
        assert!(matches!(
            err,
            Some(RegistryError::InvalidSchema { ref name, .. }) if name == "Bad"
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unused_type_constraint_is_allowed() {
        let mut registry = SchemaRegistry::new();
        OpSchemaBuilder::new("Identity")
            .input(0, "input", "T")
            .output(0, "output", "T")
            .type_constraint("T", &DataType::ALL)
            .type_constraint("Unused", &[DataType::Int64])
            .register(&mut registry)
            .unwrap();

        let schema = registry.lookup("", "Identity", 1).unwrap();
        assert_eq!(schema.type_constraints().len(), 2);
        assert_eq!(
            schema.type_constraint("Unused").map(|tc| tc.allowed()),
            Some([DataType::Int64].as_slice())
        );
    }
}
