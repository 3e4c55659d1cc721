//! Per-invocation state for type and shape inference.

use tracing::warn;

use crate::attrs::{AttrValue, Attributes, FromAttr};
use crate::env::env_flag;
use crate::errors::InferError;
use crate::schema::OpSchema;
use crate::shape::ValueType;

/// Options which control how inference functions are run.
#[derive(Clone, Debug, PartialEq)]
pub struct InferOptions {
    /// If true, reading an attribute which the schema does not declare is an
    /// error. Otherwise such reads behave as if the attribute were absent and
    /// a warning is logged.
    ///
    /// This has no effect for schemas that allow unchecked attributes.
    pub strict_attrs: bool,
}

impl Default for InferOptions {
    fn default() -> Self {
        InferOptions { strict_attrs: true }
    }
}

impl InferOptions {
    /// Create options from environment variables.
    ///
    /// `OPSCHEMA_STRICT_ATTRS` sets [`strict_attrs`](Self::strict_attrs).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        InferOptions {
            strict_attrs: env_flag("OPSCHEMA_STRICT_ATTRS", defaults.strict_attrs),
        }
    }
}

/// Inputs and outputs of one inference call for one operator instance.
///
/// The caller supplies the instance's attributes and the descriptors of its
/// inputs, and reserves one output descriptor per output. An inference
/// function reads the attributes and inputs and refines the outputs. After
/// inference the caller reads the outputs back with
/// [`outputs`](Self::outputs) or [`into_outputs`](Self::into_outputs).
///
/// Inputs beyond the end of `inputs` are treated as absent, which is how
/// omitted optional inputs are represented.
#[derive(Debug)]
pub struct InferenceContext<'a> {
    attrs: &'a Attributes,
    inputs: &'a [ValueType],
    outputs: Vec<ValueType>,

    /// Schema whose inference function is running, used to check attribute
    /// reads.
    schema: Option<&'a OpSchema>,

    options: InferOptions,
}

impl<'a> InferenceContext<'a> {
    /// Create a context with `num_outputs` unknown outputs.
    pub fn new(attrs: &'a Attributes, inputs: &'a [ValueType], num_outputs: usize) -> Self {
        Self::with_outputs(attrs, inputs, vec![ValueType::unknown(); num_outputs])
    }

    /// Create a context with existing output descriptors.
    ///
    /// This is used when the caller already has partial information about
    /// the outputs, eg. from a previous inference pass. Inference only
    /// refines these descriptors.
    pub fn with_outputs(
        attrs: &'a Attributes,
        inputs: &'a [ValueType],
        outputs: Vec<ValueType>,
    ) -> Self {
        InferenceContext {
            attrs,
            inputs,
            outputs,
            schema: None,
            options: InferOptions::default(),
        }
    }

    pub fn with_options(mut self, options: InferOptions) -> Self {
        self.options = options;
        self
    }

    /// Restrict attribute reads to those declared by `schema`.
    pub(crate) fn bind_schema(&mut self, schema: &'a OpSchema) {
        self.schema = Some(schema);
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Return the descriptor for an input, or `None` if it is absent.
    pub fn input(&self, index: usize) -> Option<&'a ValueType> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&ValueType> {
        self.outputs.get(index)
    }

    pub fn outputs(&self) -> &[ValueType] {
        &self.outputs
    }

    pub fn into_outputs(self) -> Vec<ValueType> {
        self.outputs
    }

    pub(crate) fn output_mut(&mut self, index: usize) -> Result<&mut ValueType, InferError> {
        let count = self.outputs.len();
        self.outputs
            .get_mut(index)
            .ok_or(InferError::OutputIndexOutOfRange { index, count })
    }

    /// Return true if the attribute may be read, or an error if reading it
    /// is a contract violation.
    fn check_attr(&self, name: &str) -> Result<bool, InferError> {
        let Some(schema) = self.schema else {
            return Ok(true);
        };
        if schema.allows_unchecked_attrs() || schema.attr(name).is_some() {
            return Ok(true);
        }
        if self.options.strict_attrs {
            Err(InferError::UndeclaredAttr {
                name: name.to_string(),
            })
        } else {
            warn!(op = %schema.id(), attr = name, "read of undeclared attribute");
            Ok(false)
        }
    }

    /// Get an attribute's value, or `None` if absent.
    pub fn attr(&self, name: &str) -> Result<Option<&'a AttrValue>, InferError> {
        if !self.check_attr(name)? {
            return Ok(None);
        }
        Ok(self.attrs.get(name))
    }

    /// Return true if the instance has an attribute with the given name.
    pub fn has_attr(&self, name: &str) -> Result<bool, InferError> {
        Ok(self.attr(name)?.is_some())
    }

    /// Get an attribute converted to `T`, or `None` if absent.
    pub fn get_attr_as<T: FromAttr<'a>>(&self, name: &str) -> Result<Option<T>, InferError> {
        if !self.check_attr(name)? {
            return Ok(None);
        }
        let attrs: &'a Attributes = self.attrs;
        Ok(attrs.get_as(name)?)
    }

    /// Get an attribute converted to `T`, or `default` if absent.
    pub fn get_attr_or<T: FromAttr<'a>>(&self, name: &str, default: T) -> Result<T, InferError> {
        Ok(self.get_attr_as(name)?.unwrap_or(default))
    }

    /// Get the elements of a list-valued attribute.
    ///
    /// See [`Attributes::get_repeated`].
    pub fn get_repeated_attr<T>(&self, name: &str) -> Result<&'a [T], InferError>
    where
        &'a [T]: FromAttr<'a>,
    {
        self.get_attr_or::<&'a [T]>(name, &[])
    }
}
