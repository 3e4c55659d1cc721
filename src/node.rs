#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::attrs::Attributes;
use crate::schema::{normalize_domain, OpId};
use crate::shape::ValueType;

#[cfg(feature = "serde")]
fn default_version() -> u32 {
    1
}

fn default_num_outputs() -> usize {
    1
}

/// Description of one operator instance in a graph.
///
/// This is what a graph-level checker passes to
/// [`SchemaRegistry::infer_node`](crate::SchemaRegistry::infer_node) and
/// [`OpSchema::verify`](crate::OpSchema::verify). Omitted optional inputs
/// are represented by truncating `inputs`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeInfo {
    /// Name of the node, used in error reports.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub domain: String,

    pub op_type: String,

    /// Version of the operator schema to use.
    #[cfg_attr(feature = "serde", serde(default = "default_version"))]
    pub version: u32,

    #[cfg_attr(feature = "serde", serde(default))]
    pub attrs: Attributes,

    #[cfg_attr(feature = "serde", serde(default))]
    pub inputs: Vec<ValueType>,

    #[cfg_attr(feature = "serde", serde(default = "default_num_outputs"))]
    pub num_outputs: usize,
}

impl NodeInfo {
    /// Create a node in the default domain with no attributes, no inputs and
    /// one output.
    pub fn new(op_type: &str, version: u32) -> Self {
        NodeInfo {
            name: None,
            domain: String::new(),
            op_type: op_type.to_string(),
            version,
            attrs: Attributes::new(),
            inputs: Vec::new(),
            num_outputs: default_num_outputs(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = ValueType>) -> Self {
        self.inputs = inputs.into_iter().collect();
        self
    }

    pub fn with_num_outputs(mut self, num_outputs: usize) -> Self {
        self.num_outputs = num_outputs;
        self
    }

    /// Return the identity of the schema this node refers to.
    pub fn op_id(&self) -> OpId {
        OpId::new(normalize_domain(&self.domain), &self.op_type, self.version)
    }
}
