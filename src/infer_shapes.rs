//! Library of type and shape inference functions.
//!
//! The primitives in this module read an [`InferenceContext`]'s inputs and
//! attributes and refine its outputs. The composite functions built on them
//! are used directly as the inference functions of operator schemas.
//!
//! Inability to determine a type or shape is never an error. The affected
//! output is left as it was. Errors are reserved for operator instances
//! which violate the operator's contract, such as an out-of-range axis.

use smallvec::SmallVec;

use crate::data_type::DataType;
use crate::errors::InferError;
use crate::infer_ctx::InferenceContext;
use crate::shape::{Dim, Shape};

/// Return true if input `index` is present and has a known rank.
///
/// Individual dimensions may still be unknown.
pub fn has_input_shape(ctx: &InferenceContext, index: usize) -> bool {
    ctx.input(index).is_some_and(|input| input.shape.has_rank())
}

/// Copy the shape of an input to an output.
///
/// Does nothing if the input is absent or has unknown rank.
pub fn propagate_shape_from_input_to_output(
    ctx: &mut InferenceContext,
    input: usize,
    output: usize,
) -> Result<(), InferError> {
    let Some(input) = ctx.input(input) else {
        return Ok(());
    };
    if !input.shape.has_rank() {
        return Ok(());
    }
    update_output_shape(ctx, output, &input.shape)
}

/// Copy the element type of an input to an output.
///
/// Does nothing if the input is absent or its element type is unknown.
pub fn propagate_elem_type_from_input_to_output(
    ctx: &mut InferenceContext,
    input: usize,
    output: usize,
) -> Result<(), InferError> {
    let Some(elem_type) = ctx.input(input).and_then(|input| input.elem_type) else {
        return Ok(());
    };
    update_output_elem_type(ctx, output, elem_type)
}

/// Set the element type of an output.
///
/// Fails if the output already has a different element type.
pub fn update_output_elem_type(
    ctx: &mut InferenceContext,
    output: usize,
    elem_type: DataType,
) -> Result<(), InferError> {
    ctx.output_mut(output)?
        .refine_elem_type(elem_type)
        .map_err(|error| InferError::Conflict { output, error })
}

/// Refine the shape of an output with a fully or partially known shape.
///
/// Fails if `shape` contradicts what is already known about the output.
pub fn update_output_shape(
    ctx: &mut InferenceContext,
    output: usize,
    shape: &Shape,
) -> Result<(), InferError> {
    ctx.output_mut(output)?
        .refine_shape(shape)
        .map_err(|error| InferError::Conflict { output, error })
}

/// Inference for elementwise operators whose output has the type and shape
/// of their first input.
pub fn propagate_shape_and_type_from_first_input(
    ctx: &mut InferenceContext,
) -> Result<(), InferError> {
    propagate_elem_type_from_input_to_output(ctx, 0, 0)?;
    if !has_input_shape(ctx, 0) {
        return Ok(());
    }
    propagate_shape_from_input_to_output(ctx, 0, 0)
}

/// Set an output's shape from an INTS attribute, where each entry is the
/// size of one dimension.
///
/// Returns `Ok(false)` if the attribute is absent. Negative sizes are an
/// error.
pub fn propagate_shape_from_attribute_to_output(
    ctx: &mut InferenceContext,
    attr_name: &str,
    output: usize,
) -> Result<bool, InferError> {
    if !ctx.has_attr(attr_name)? {
        return Ok(false);
    }
    let dims = ctx
        .get_repeated_attr::<i64>(attr_name)?
        .iter()
        .map(|&size| {
            usize::try_from(size)
                .map(Dim::Fixed)
                .map_err(|_| InferError::invalid_attr(attr_name, format!("negative size {}", size)))
        })
        .collect::<Result<Shape, _>>()?;
    update_output_shape(ctx, output, &dims)?;
    Ok(true)
}

/// Set an output's element type from an INT attribute which holds a
/// [`DataType`] code.
///
/// If the attribute is absent, `default` is used.
pub fn propagate_elem_type_from_attribute_to_output(
    ctx: &mut InferenceContext,
    attr_name: &str,
    output: usize,
    default: DataType,
) -> Result<(), InferError> {
    let elem_type = match ctx.get_attr_as::<i64>(attr_name)? {
        Some(code) => DataType::from_code(code).ok_or_else(|| InferError::InvalidElemTypeCode {
            name: attr_name.to_string(),
            code,
        })?,
        None => default,
    };
    update_output_elem_type(ctx, output, elem_type)
}

/// Inference for logical and comparison operators.
///
/// The output is always boolean. Its shape is copied from the first input
/// if that has a known rank. The broadcast shape of both operands is not
/// computed. With `broadcast` set the right operand is broadcast to the
/// left, so the left operand's shape is used as the result.
pub fn logical_op_inference(ctx: &mut InferenceContext) -> Result<(), InferError> {
    update_output_elem_type(ctx, 0, DataType::Bool)?;
    if !has_input_shape(ctx, 0) {
        return Ok(());
    }
    propagate_shape_from_input_to_output(ctx, 0, 0)
}

/// Shape inference for fill operators.
///
/// In order of precedence:
///
/// 1. If the `shape` attribute is set, it is the output shape.
/// 2. If `input_as_shape` is non-zero the shape depends on the contents of
///    the first input, so the output shape is left unknown.
/// 3. Otherwise, if the first input has a known rank, the output shape is
///    the input shape followed by the dimensions in `extra_shape`. If any
///    extra dimension is negative the output shape is left unknown.
pub fn fill_shape_inference(ctx: &mut InferenceContext) -> Result<(), InferError> {
    if propagate_shape_from_attribute_to_output(ctx, "shape", 0)? {
        return Ok(());
    }
    if ctx.get_attr_or("input_as_shape", false)? {
        return Ok(());
    }

    let extra_shape = ctx.get_repeated_attr::<i64>("extra_shape")?;
    let Some(input_dims) = ctx.input(0).and_then(|input| input.shape.dims()) else {
        return Ok(());
    };

    let mut dims: SmallVec<[Dim; 4]> = input_dims.iter().cloned().collect();
    for &size in extra_shape {
        let Ok(size) = usize::try_from(size) else {
            return Ok(());
        };
        dims.push(Dim::Fixed(size));
    }
    update_output_shape(ctx, 0, &Shape::new(dims))
}

/// Inference for `ConstantFill`.
///
/// The element type comes from the `dtype` attribute (float by default).
pub fn constant_fill_inference(ctx: &mut InferenceContext) -> Result<(), InferError> {
    propagate_elem_type_from_attribute_to_output(ctx, "dtype", 0, DataType::Float)?;
    fill_shape_inference(ctx)
}

/// Inference for `GivenTensorFill`.
///
/// The element type comes from the first input.
pub fn given_tensor_fill_inference(ctx: &mut InferenceContext) -> Result<(), InferError> {
    propagate_elem_type_from_input_to_output(ctx, 0, 0)?;
    fill_shape_inference(ctx)
}

/// Resolve an axis given as a value in `[-ndim, ndim)` to one in `[0, ndim)`.
pub fn resolve_axis(axis: i64, ndim: usize) -> Result<usize, InferError> {
    let rank = ndim as i64;
    let resolved = if axis < 0 { axis + rank } else { axis };
    if resolved < 0 || resolved >= rank {
        return Err(InferError::AxisOutOfRange { axis, ndim });
    }
    Ok(resolved as usize)
}

/// Resolve a list of axes with [`resolve_axis`].
///
/// The result is sorted and has duplicates removed.
pub fn resolve_axes(axes: &[i64], ndim: usize) -> Result<SmallVec<[usize; 4]>, InferError> {
    let mut resolved = axes
        .iter()
        .map(|&axis| resolve_axis(axis, ndim))
        .collect::<Result<SmallVec<[usize; 4]>, _>>()?;
    resolved.sort_unstable();
    resolved.dedup();
    Ok(resolved)
}

/// Compute the shape produced by reducing `dims` over `axes`.
///
/// Reduced dimensions become 1 if `keep_dims` is true, otherwise they are
/// removed. `axes` must be resolved indices into `dims`.
pub fn reduce_shape(dims: &[Dim], axes: &[usize], keep_dims: bool) -> Shape {
    dims.iter()
        .enumerate()
        .filter_map(|(i, dim)| {
            if !axes.contains(&i) {
                Some(dim.clone())
            } else if keep_dims {
                Some(Dim::Fixed(1))
            } else {
                None
            }
        })
        .collect()
}

/// Inference for `Reduce*` operators.
///
/// The output has the element type of the input. The input is reduced over
/// the `axes` attribute, or all axes if it is absent or empty. `keepdims`
/// controls whether reduced axes are kept with size 1.
pub fn reduce_inference(ctx: &mut InferenceContext) -> Result<(), InferError> {
    propagate_elem_type_from_input_to_output(ctx, 0, 0)?;

    let axes = ctx.get_repeated_attr::<i64>("axes")?;
    let keep_dims = ctx.get_attr_or("keepdims", true)?;

    let Some(dims) = ctx.input(0).and_then(|input| input.shape.dims()) else {
        return Ok(());
    };
    let axes: SmallVec<[usize; 4]> = if axes.is_empty() {
        (0..dims.len()).collect()
    } else {
        resolve_axes(axes, dims.len())?
    };

    update_output_shape(ctx, 0, &reduce_shape(dims, &axes, keep_dims))
}

/// Inference for `ArgMax` and `ArgMin`.
///
/// The output is always int64. The input is reduced over the single
/// `axis` attribute (default 0).
pub fn arg_reduce_inference(ctx: &mut InferenceContext) -> Result<(), InferError> {
    update_output_elem_type(ctx, 0, DataType::Int64)?;

    let axis = ctx.get_attr_or("axis", 0i64)?;
    let keep_dims = ctx.get_attr_or("keepdims", true)?;

    let Some(dims) = ctx.input(0).and_then(|input| input.shape.dims()) else {
        return Ok(());
    };
    let axis = resolve_axis(axis, dims.len())?;

    update_output_shape(ctx, 0, &reduce_shape(dims, &[axis], keep_dims))
}
