use std::collections::BTreeMap;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::errors::{InferError, NodeError, RegistryError};
use crate::infer_ctx::{InferOptions, InferenceContext};
use crate::node::NodeInfo;
use crate::schema::{normalize_domain, OpId, OpSchema};
use crate::shape::ValueType;

/// Result of running inference for one node.
pub type NodeInferResult = Result<Vec<ValueType>, NodeError>;

/// Collection of operator schemas, keyed by domain, name and version.
///
/// A registry is populated once, during startup, and is then only read.
/// Since inference functions do not modify the registry, inference for
/// independent nodes can run concurrently from any number of threads.
///
/// New registries have no schemas registered. To create a registry with all
/// built-in operators, use [`SchemaRegistry::with_all_ops`].
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// Map of domain => operator name => version => schema.
    schemas: FxHashMap<String, FxHashMap<String, BTreeMap<u32, OpSchema>>>,
    len: usize,
}

impl SchemaRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry with all built-in operators registered.
    ///
    /// # Panics
    ///
    /// Panics if the built-in definitions are invalid.
    pub fn with_all_ops() -> Self {
        let mut registry = Self::new();
        if let Err(err) = crate::defs::register_all_schemas(&mut registry) {
            panic!("failed to register built-in schemas: {}", err);
        }
        registry
    }

    /// Add a schema to the registry.
    ///
    /// Fails if a schema with the same domain, name and version is already
    /// registered. Other versions of the same operator may coexist.
    pub fn register(&mut self, schema: OpSchema) -> Result<(), RegistryError> {
        let versions = self
            .schemas
            .entry(schema.domain().to_string())
            .or_default()
            .entry(schema.name().to_string())
            .or_default();

        if versions.contains_key(&schema.since_version()) {
            return Err(RegistryError::DuplicateSchema(schema.id()));
        }

        debug!(op = %schema.id(), "registered schema");
        versions.insert(schema.since_version(), schema);
        self.len += 1;

        Ok(())
    }

    /// Find the schema with an exact domain, name and version.
    ///
    /// Returns `None` if there is no such schema. Resolving a requested
    /// version to the latest compatible one is left to the caller, who can
    /// use [`versions`](Self::versions) to do it.
    pub fn lookup(&self, domain: &str, name: &str, version: u32) -> Option<&OpSchema> {
        self.schemas
            .get(normalize_domain(domain))?
            .get(name)?
            .get(&version)
    }

    pub fn contains(&self, domain: &str, name: &str, version: u32) -> bool {
        self.lookup(domain, name, version).is_some()
    }

    /// Return the registered versions of an operator in ascending order.
    pub fn versions(&self, domain: &str, name: &str) -> Vec<u32> {
        self.schemas
            .get(normalize_domain(domain))
            .and_then(|ops| ops.get(name))
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Iterate over all schemas, ordered by domain, name and version.
    pub fn iter(&self) -> impl Iterator<Item = &OpSchema> {
        let mut schemas: Vec<&OpSchema> = self
            .schemas
            .values()
            .flat_map(|ops| ops.values())
            .flat_map(|versions| versions.values())
            .collect();
        schemas.sort_by(|a, b| {
            (a.domain(), a.name(), a.since_version()).cmp(&(
                b.domain(),
                b.name(),
                b.since_version(),
            ))
        });
        schemas.into_iter()
    }

    /// Return the number of registered schemas.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Infer output types and shapes of a node using its schema.
    ///
    /// Returns `None` if no schema is registered for the node's operator, so
    /// that the caller can decide how to handle unknown operators.
    pub fn infer_node(&self, node: &NodeInfo) -> Option<NodeInferResult> {
        self.infer_node_with_options(node, &InferOptions::default())
    }

    /// Variant of [`infer_node`](Self::infer_node) with custom options.
    pub fn infer_node_with_options(
        &self,
        node: &NodeInfo,
        options: &InferOptions,
    ) -> Option<NodeInferResult> {
        let schema = self.lookup(&node.domain, &node.op_type, node.version)?;
        let result = unknown_outputs(schema, node.num_outputs).and_then(|outputs| {
            let mut ctx = InferenceContext::with_outputs(&node.attrs, &node.inputs, outputs)
                .with_options(options.clone());
            schema.infer(&mut ctx)?;
            Ok(ctx.into_outputs())
        });
        Some(result.map_err(|error| NodeError {
            op: schema.id(),
            node: node.name.clone(),
            error,
        }))
    }

    /// Run [`infer_node`](Self::infer_node) for many independent nodes in
    /// parallel.
    ///
    /// Results are returned in the same order as `nodes`.
    pub fn infer_nodes(&self, nodes: &[NodeInfo]) -> Vec<Option<NodeInferResult>> {
        nodes.par_iter().map(|node| self.infer_node(node)).collect()
    }

    /// Return the identities of all registered schemas, in the order of
    /// [`iter`](Self::iter).
    pub fn op_ids(&self) -> Vec<OpId> {
        self.iter().map(|schema| schema.id()).collect()
    }
}

/// Allocate `count` unknown output descriptors for a node of `schema`.
///
/// The count comes from the node description, so it is checked against the
/// schema and allocation failure is reported as an error.
fn unknown_outputs(schema: &OpSchema, count: usize) -> Result<Vec<ValueType>, InferError> {
    let (min, max) = (schema.min_outputs(), schema.max_outputs());
    let count_error = || InferError::OutputCount {
        min,
        max,
        actual: count,
    };
    if count < min || count > max {
        return Err(count_error());
    }
    let mut outputs = Vec::new();
    outputs
        .try_reserve_exact(count)
        .map_err(|_| count_error())?;
    outputs.resize(count, ValueType::unknown());
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::SchemaRegistry;
    use crate::attrs::{AttrType, Attributes};
    use crate::data_type::DataType;
    use crate::errors::{InferError, NodeError, RegistryError};
    use crate::infer_shapes::reduce_inference;
    use crate::node::NodeInfo;
    use crate::schema::{OpId, OpSchemaBuilder};
    use crate::shape::ValueType;

    fn reduce_sum(version: u32) -> OpSchemaBuilder {
        OpSchemaBuilder::new("ReduceSum")
            .since_version(version)
            .optional_attr("axes", AttrType::Ints)
            .attr("keepdims", AttrType::Int, 1i64)
            .input(0, "data", "T")
            .output(0, "reduced", "T")
            .type_constraint("T", &DataType::HIGH_PRECISION_NUMERIC)
            .inference_fn(reduce_inference)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = SchemaRegistry::new();
        assert!(reg.is_empty());

        reduce_sum(1).register(&mut reg).unwrap();
        reduce_sum(13).register(&mut reg).unwrap();

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.versions("", "ReduceSum"), [1, 13]);
        assert!(reg.contains("", "ReduceSum", 1));
        assert!(reg.contains("ai.onnx", "ReduceSum", 13));
        assert!(!reg.contains("", "ReduceSum", 2));
        assert!(reg.lookup("", "ReduceMax", 1).is_none());
        assert!(reg.lookup("com.example", "ReduceSum", 1).is_none());
        assert_eq!(
            reg.lookup("", "ReduceSum", 13).map(|s| s.since_version()),
            Some(13)
        );
    }

    #[test]
    fn test_duplicate_schema() {
        let mut reg = SchemaRegistry::new();
        reduce_sum(1).register(&mut reg).unwrap();

        let err = reduce_sum(1).domain("ai.onnx").register(&mut reg).err();
        assert_eq!(
            err,
            Some(RegistryError::DuplicateSchema(OpId::new("", "ReduceSum", 1)))
        );
        assert_eq!(reg.len(), 1);

        // Same name in another domain is a different operator.
        reduce_sum(1)
            .domain("com.example")
            .register(&mut reg)
            .unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_iter_is_sorted() {
        let mut reg = SchemaRegistry::new();
        for (domain, name, version) in [
            ("", "Not", 1),
            ("com.example", "Foo", 1),
            ("", "And", 7),
            ("", "And", 1),
        ] {
            OpSchemaBuilder::new(name)
                .domain(domain)
                .since_version(version)
                .register(&mut reg)
                .unwrap();
        }

        let ids: Vec<String> = reg.op_ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, ["And-1", "And-7", "Not-1", "com.example::Foo-1"]);
    }

    #[test]
    fn test_infer_node() {
        let mut reg = SchemaRegistry::new();
        reduce_sum(1).register(&mut reg).unwrap();

        let node = NodeInfo::new("ReduceSum", 1)
            .with_attrs(Attributes::new().with("axes", vec![0i64]))
            .with_inputs([ValueType::tensor(DataType::Float, &[3, 4])]);
        let outputs = reg.infer_node(&node).unwrap().unwrap();
        assert_eq!(outputs, [ValueType::tensor(DataType::Float, &[1, 4])]);

        let unknown = NodeInfo::new("ReduceSum", 2);
        assert!(reg.infer_node(&unknown).is_none());

        let invalid = NodeInfo::new("ReduceSum", 1)
            .with_name("sum_0")
            .with_attrs(Attributes::new().with("axes", vec![2i64]))
            .with_inputs([ValueType::tensor(DataType::Float, &[3, 4])]);
        assert_eq!(
            reg.infer_node(&invalid).unwrap(),
            Err(NodeError {
                op: OpId::new("", "ReduceSum", 1),
                node: Some("sum_0".to_string()),
                error: InferError::AxisOutOfRange { axis: 2, ndim: 2 },
            })
        );

        let too_many_outputs = NodeInfo::new("ReduceSum", 1)
            .with_inputs([ValueType::tensor(DataType::Float, &[3, 4])])
            .with_num_outputs(usize::MAX);
        assert_eq!(
            reg.infer_node(&too_many_outputs)
                .unwrap()
                .map_err(|err| err.error),
            Err(InferError::OutputCount {
                min: 1,
                max: 1,
                actual: usize::MAX,
            })
        );
    }
}
