use crate::attrs::AttrType;
use crate::data_type::DataType;
use crate::errors::RegistryError;
use crate::infer_shapes::logical_op_inference;
use crate::schema::{OpSchemaBuilder, SchemaFragment};
use crate::schema_registry::SchemaRegistry;

/// Declarations shared by binary logical and comparison operators.
///
/// `name` is the operation's name as used in the documentation, eg. "and".
/// The caller declares the `T` (input) and `T1` (output) type constraints.
pub fn binary_logic_fragment(name: &str) -> SchemaFragment {
    let doc = format!(
        "Returns the result of the `{}` logical operation applied elementwise \
         to `A` and `B`.\n\nIf `broadcast` is set, `B` is broadcast to the \
         shape of `A`.",
        name
    );
    SchemaFragment::new()
        .doc(doc)
        .attr("broadcast", AttrType::Int, 0i64)
        .optional_attr("axis", AttrType::Int)
        .input(0, "A", "T")
        .input(1, "B", "T")
        .output(0, "C", "T1")
        .inference_fn(logical_op_inference)
}

pub(super) fn register(reg: &mut SchemaRegistry) -> Result<(), RegistryError> {
    macro_rules! binary_logic_op {
        ($op:literal, $doc_name:literal, $types:expr) => {
            OpSchemaBuilder::new($op)
                .fill_using(binary_logic_fragment($doc_name))
                .type_constraint("T", $types)
                .type_constraint("T1", &[DataType::Bool])
                .register(reg)?
        };
    }

    binary_logic_op!("And", "and", &[DataType::Bool]);
    binary_logic_op!("Or", "or", &[DataType::Bool]);
    binary_logic_op!("Xor", "xor", &[DataType::Bool]);
    binary_logic_op!("Greater", "greater", &DataType::FLOAT_TYPES);
    binary_logic_op!("Less", "less", &DataType::FLOAT_TYPES);
    binary_logic_op!(
        "Equal",
        "equal",
        &[DataType::Bool, DataType::Int32, DataType::Int64]
    );

    OpSchemaBuilder::new("Not")
        .doc("Returns the elementwise negation of the input.")
        .input(0, "X", "T")
        .output(0, "Y", "T")
        .type_constraint("T", &[DataType::Bool])
        .inference_fn(logical_op_inference)
        .register(reg)?;

    Ok(())
}
