//! opschema is a registry of operator schemas with static type and shape
//! inference for [ONNX](https://onnx.ai)-style computation graphs.
//!
//! # Overview
//!
//! Each version of an operator is described by an [`OpSchema`]: its inputs
//! and outputs, the element types they accept, its attributes and a function
//! which infers the element types and shapes of the outputs from those of the
//! inputs. Schemas are declared with [`OpSchemaBuilder`] and collected in a
//! [`SchemaRegistry`].
//!
//! A graph-level checker looks up the schema for each node and runs its
//! inference function through an [`InferenceContext`], which holds the node's
//! attributes and input descriptors and one descriptor per output. Inference
//! only refines outputs: anything which cannot be determined statically, such
//! as a shape which depends on the contents of an input, is left unknown.
//!
//! ```
//! use opschema::{Attributes, DataType, NodeInfo, SchemaRegistry, ValueType};
//!
//! let registry = SchemaRegistry::with_all_ops();
//!
//! let node = NodeInfo::new("ReduceSum", 1)
//!     .with_attrs(Attributes::new().with("axes", vec![1i64]))
//!     .with_inputs([ValueType::tensor(DataType::Float, &[2, 3, 4])]);
//! let outputs = registry.infer_node(&node).unwrap().unwrap();
//!
//! assert_eq!(outputs, [ValueType::tensor(DataType::Float, &[2, 1, 4])]);
//! ```
//!
//! # Threading
//!
//! A registry is populated once at startup and is then read-only. Inference
//! functions only modify the context passed to them, so inference for
//! independent nodes can run concurrently. See
//! [`SchemaRegistry::infer_nodes`].
//!
//! # Crate features
//!
//! - `serde` - Implements serde `Serialize` and `Deserialize` for
//!   descriptors, attributes and node descriptions, and `Serialize` for
//!   schemas.

mod attrs;
mod data_type;
mod env;
mod errors;
mod infer_ctx;
mod node;
mod schema;
mod schema_registry;
mod shape;

pub mod defs;
pub mod infer_shapes;

pub use attrs::{Attr, AttrError, AttrType, AttrValue, Attributes, FromAttr};
pub use data_type::{DataType, UnknownDataType};
pub use env::str_as_bool;
pub use errors::{InferError, NodeError, RegistryError, SchemaError, SlotKind, VerifyError};
pub use infer_ctx::{InferOptions, InferenceContext};
pub use node::NodeInfo;
pub use schema::{
    normalize_domain, AttrSpec, FormalParameter, InferFn, OpId, OpSchema, OpSchemaBuilder,
    ParamOption, SchemaFragment, SupportLevel, TypeConstraint, ONNX_DOMAIN, ONNX_DOMAIN_ALIAS,
};
pub use schema_registry::{NodeInferResult, SchemaRegistry};
pub use shape::{Dim, RefineError, Shape, ValueType};
