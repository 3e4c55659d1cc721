use crate::attrs::AttrType;
use crate::data_type::DataType;
use crate::errors::RegistryError;
use crate::infer_shapes::{
    constant_fill_inference, given_tensor_fill_inference,
    propagate_shape_and_type_from_first_input,
};
use crate::schema::{OpSchemaBuilder, ParamOption, SupportLevel};
use crate::schema_registry::SchemaRegistry;

/// Start declaring an experimental operator.
fn experimental(op: &str) -> OpSchemaBuilder {
    OpSchemaBuilder::new(op).support_level(SupportLevel::Experimental)
}

/// Start declaring an experimental elementwise operator over float tensors,
/// whose output has the type and shape of its input.
fn float_unary(op: &str, input: &str, output: &str) -> OpSchemaBuilder {
    experimental(op)
        .input(0, input, "T")
        .output(0, output, "T")
        .type_constraint("T", &DataType::FLOAT_TYPES)
        .inference_fn(propagate_shape_and_type_from_first_input)
}

pub(super) fn register(reg: &mut SchemaRegistry) -> Result<(), RegistryError> {
    float_unary("Affine", "X", "Y")
        .doc("Applies `y = alpha * x + beta` elementwise.")
        .attr("alpha", AttrType::Float, 1.0f32)
        .attr("beta", AttrType::Float, 0.0f32)
        .register(reg)?;

    float_unary("ThresholdedRelu", "X", "Y")
        .doc("Applies `y = x` for `x > alpha` and `y = 0` otherwise, elementwise.")
        .attr("alpha", AttrType::Float, 1.0f32)
        .register(reg)?;

    float_unary("ScaledTanh", "input", "output")
        .doc("Applies `alpha * tanh(beta * x)` elementwise.")
        .optional_attr("alpha", AttrType::Float)
        .optional_attr("beta", AttrType::Float)
        .register(reg)?;

    float_unary("ParametricSoftplus", "X", "Y")
        .doc("Applies `y = alpha * ln(exp(beta * x) + 1)` elementwise.")
        .optional_attr("alpha", AttrType::Float)
        .optional_attr("beta", AttrType::Float)
        .register(reg)?;

    float_unary("Scale", "input", "output")
        .doc("Multiplies the input elementwise by `scale`.")
        .attr("scale", AttrType::Float, 1.0f32)
        .register(reg)?;

    float_unary("ImageScaler", "input", "output")
        .doc("Scales and biases an image. `bias` has one value per channel.")
        .optional_attr("bias", AttrType::Floats)
        .attr("scale", AttrType::Float, 1.0f32)
        .register(reg)?;

    float_unary("MeanVarianceNormalization", "input", "output")
        .doc("Normalizes the input to zero mean and, optionally, unit variance.")
        .attr("across_channels", AttrType::Int, 0i64)
        .attr("normalize_variance", AttrType::Int, 1i64)
        .register(reg)?;

    let fill_types = [
        DataType::Float,
        DataType::Int32,
        DataType::Int64,
        DataType::Bool,
    ];
    experimental("ConstantFill")
        .doc(
            "Fills the output with `value`, converted to the type given by \
             `dtype`. The output shape is given by `shape`, or is the shape of \
             the optional input followed by `extra_shape`. If \
             `input_as_shape` is set the input holds the output shape.",
        )
        .attr("value", AttrType::Float, 0.0f32)
        .attr("dtype", AttrType::Int, i64::from(DataType::Float.code()))
        .optional_attr("shape", AttrType::Ints)
        .optional_attr("extra_shape", AttrType::Ints)
        .optional_attr("input_as_shape", AttrType::Int)
        .input_with(0, "input", "T1", ParamOption::Optional)
        .output(0, "output", "T2")
        .type_constraint("T1", &fill_types)
        .type_constraint("T2", &fill_types)
        .inference_fn(constant_fill_inference)
        .register(reg)?;

    experimental("GivenTensorFill")
        .doc("Fills the output with `values`.")
        .optional_attr("values", AttrType::Floats)
        .optional_attr("shape", AttrType::Ints)
        .optional_attr("input_as_shape", AttrType::Int)
        .optional_attr("extra_shape", AttrType::Ints)
        .input_with(0, "shape", "T", ParamOption::Optional)
        .output(0, "X", "T")
        .type_constraint("T", &DataType::FLOAT_TYPES)
        .inference_fn(given_tensor_fill_inference)
        .register(reg)?;

    experimental("GRUUnit")
        .doc("Computes the activations of a GRU for one timestep.")
        .optional_attr("drop_states", AttrType::Int)
        .input(0, "hidden_prev", "T")
        .input(1, "gates", "T")
        .input(2, "seq_lengths", "T")
        .input(3, "t", "T")
        .output(0, "hidden", "T")
        .type_constraint("T", &DataType::FLOAT_TYPES)
        .register(reg)?;

    experimental("ATen")
        .doc("Invokes an ATen operator by name.")
        .allow_unchecked_attrs()
        .input_with(0, "input", "T", ParamOption::Variadic)
        .output_with(0, "output", "T", ParamOption::Variadic)
        .type_constraint(
            "T",
            &[
                DataType::Bool,
                DataType::Int32,
                DataType::Int64,
                DataType::Float16,
                DataType::Float,
                DataType::Double,
            ],
        )
        .register(reg)?;

    experimental("Crop")
        .doc("Crops an image to the given spatial dimensions.")
        .optional_attr("border", AttrType::Ints)
        .optional_attr("scale", AttrType::Ints)
        .input(0, "input", "T")
        .output(0, "output", "T")
        .type_constraint("T", &DataType::FLOAT_TYPES)
        .register(reg)?;

    Ok(())
}
