use crate::attrs::AttrType;
use crate::data_type::DataType;
use crate::errors::RegistryError;
use crate::infer_shapes::{arg_reduce_inference, reduce_inference};
use crate::schema::{OpSchemaBuilder, SchemaFragment};
use crate::schema_registry::SchemaRegistry;

/// Declarations for a `Reduce*` operator which computes `name` (eg. "sum")
/// over a set of axes.
pub fn reduce_fragment(name: &str) -> SchemaFragment {
    let doc = format!(
        "Computes the {} of the input's elements along the provided axes. \
         If `keepdims` is 1 the result has the same rank as the input, with \
         reduced dimensions of size 1. If `keepdims` is 0 the reduced \
         dimensions are removed.",
        name
    );
    SchemaFragment::new()
        .doc(doc)
        .optional_attr("axes", AttrType::Ints)
        .attr("keepdims", AttrType::Int, 1i64)
        .input(0, "data", "T")
        .output(0, "reduced", "T")
        .type_constraint("T", &DataType::HIGH_PRECISION_NUMERIC)
        .inference_fn(reduce_inference)
}

/// Declarations for an operator which computes the indices of the `name`
/// (eg. "max") elements along an axis.
pub fn arg_reduce_fragment(name: &str) -> SchemaFragment {
    let doc = format!(
        "Computes the indices of the {} elements of the input along the \
         provided axis. The result has type int64.",
        name
    );
    SchemaFragment::new()
        .doc(doc)
        .attr("axis", AttrType::Int, 0i64)
        .attr("keepdims", AttrType::Int, 1i64)
        .input(0, "data", "T")
        .output(0, "reduced", "tensor(int64)")
        .type_constraint("T", &DataType::ALL_NUMERIC)
        .inference_fn(arg_reduce_inference)
}

pub(super) fn register(reg: &mut SchemaRegistry) -> Result<(), RegistryError> {
    let reductions = [
        ("ReduceMax", "max"),
        ("ReduceMin", "min"),
        ("ReduceSum", "sum"),
        ("ReduceSumSquare", "sum square"),
        ("ReduceMean", "mean"),
        ("ReduceProd", "product"),
        ("ReduceLogSum", "log sum"),
        ("ReduceLogSumExp", "log sum exponent"),
        ("ReduceL1", "L1 norm"),
        ("ReduceL2", "L2 norm"),
    ];
    for (op, name) in reductions {
        OpSchemaBuilder::new(op)
            .fill_using(reduce_fragment(name))
            .register(reg)?;
    }

    for (op, name) in [("ArgMax", "max"), ("ArgMin", "min")] {
        OpSchemaBuilder::new(op)
            .fill_using(arg_reduce_fragment(name))
            .register(reg)?;
    }

    Ok(())
}
