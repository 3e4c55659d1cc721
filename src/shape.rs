//! Element type and shape descriptors for operator inputs and outputs.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::data_type::DataType;

/// Size of a single dimension in a [`Shape`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Dim {
    /// A dimension with a known size.
    Fixed(usize),
    /// A named dimension such as "batch".
    ///
    /// Inference treats these as unknown, but copying a shape preserves the
    /// name so that callers which resolve symbols can do so afterwards.
    Symbolic(String),
    /// A dimension with unknown size.
    Unknown,
}

impl Dim {
    /// Return the size of this dimension if it is fixed.
    pub fn value(&self) -> Option<usize> {
        match self {
            Dim::Fixed(size) => Some(*size),
            Dim::Symbolic(_) | Dim::Unknown => None,
        }
    }

    /// Return true if this dimension has a fixed size.
    pub fn is_fixed(&self) -> bool {
        self.value().is_some()
    }

    /// Replace this dimension with `new` if that refines it.
    ///
    /// A fixed size can only be "refined" to the same size. Unknown or
    /// symbolic dimensions can become fixed or symbolic. Refining with
    /// `Dim::Unknown` is a no-op.
    fn refine(&mut self, new: &Dim) -> Result<(), (Dim, Dim)> {
        if let (Dim::Fixed(cur), Dim::Fixed(new_size)) = (&*self, new) {
            if cur != new_size {
                return Err((self.clone(), new.clone()));
            }
        }
        if !self.is_fixed() && *new != Dim::Unknown {
            *self = new.clone();
        }
        Ok(())
    }
}

impl From<usize> for Dim {
    fn from(size: usize) -> Self {
        Dim::Fixed(size)
    }
}

impl From<&str> for Dim {
    fn from(name: &str) -> Self {
        Dim::Symbolic(name.to_string())
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(size) => write!(f, "{}", size),
            Dim::Symbolic(name) => write!(f, "{}", name),
            Dim::Unknown => write!(f, "?"),
        }
    }
}

/// Shape of a tensor, which may have unknown rank.
///
/// When the rank is known the shape is a sequence of [`Dim`]s, some of which
/// may be unknown. The rank of a known shape never changes, and its
/// dimensions are only refined from unknown to fixed (see [`Shape::refine`]).
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Shape(Option<SmallVec<[Dim; 4]>>);

impl Shape {
    /// Create a shape with unknown rank.
    pub fn unknown() -> Self {
        Shape(None)
    }

    /// Create a shape with known rank from a sequence of dimensions.
    pub fn new(dims: impl IntoIterator<Item = Dim>) -> Self {
        Shape(Some(dims.into_iter().collect()))
    }

    /// Create a shape where all dimensions have fixed sizes.
    pub fn from_fixed(sizes: &[usize]) -> Self {
        Self::new(sizes.iter().copied().map(Dim::Fixed))
    }

    /// Create a shape for a scalar (rank 0).
    pub fn scalar() -> Self {
        Self::new([])
    }

    /// Return the rank, if known.
    pub fn ndim(&self) -> Option<usize> {
        self.0.as_ref().map(|dims| dims.len())
    }

    /// Return the dimensions, if the rank is known.
    pub fn dims(&self) -> Option<&[Dim]> {
        self.0.as_deref()
    }

    /// Return true if the rank is known.
    ///
    /// Individual dimensions may still be unknown.
    pub fn has_rank(&self) -> bool {
        self.0.is_some()
    }

    /// Return the dimension sizes if the rank and all sizes are known.
    pub fn to_fixed(&self) -> Option<Vec<usize>> {
        self.dims()?.iter().map(|d| d.value()).collect()
    }

    /// Refine this shape with information from `new`.
    ///
    /// If this shape has unknown rank it becomes a copy of `new`. Otherwise
    /// `new` must have unknown rank (in which case this is a no-op) or the
    /// same rank, and each dimension is refined individually. Fixed sizes
    /// are never changed to a different fixed size.
    pub fn refine(&mut self, new: &Shape) -> Result<(), RefineError> {
        let Some(new_dims) = new.dims() else {
            return Ok(());
        };
        let Some(cur_dims) = self.0.as_mut() else {
            *self = new.clone();
            return Ok(());
        };

        if cur_dims.len() != new_dims.len() {
            return Err(RefineError::Rank {
                current: cur_dims.len(),
                new: new_dims.len(),
            });
        }

        // Check all dims before modifying any, so a failed refinement
        // leaves the shape unchanged.
        let mut refined = cur_dims.clone();
        for (index, (cur, new)) in refined.iter_mut().zip(new_dims).enumerate() {
            cur.refine(new)
                .map_err(|(current, new)| RefineError::Dim {
                    index,
                    current,
                    new,
                })?;
        }
        *cur_dims = refined;

        Ok(())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(sizes: [usize; N]) -> Self {
        Shape::from_fixed(&sizes)
    }
}

impl FromIterator<Dim> for Shape {
    fn from_iter<I: IntoIterator<Item = Dim>>(iter: I) -> Self {
        Shape::new(iter)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(dims) = self.dims() else {
            return write!(f, "unknown");
        };
        write!(f, "[")?;
        for (i, dim) in dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        write!(f, "]")
    }
}

/// Error when an update to a descriptor would contradict information it
/// already holds.
#[derive(Clone, Debug, PartialEq)]
pub enum RefineError {
    /// The element type is already set to a different type.
    ElemType { current: DataType, new: DataType },
    /// The shape already has a different rank.
    Rank { current: usize, new: usize },
    /// A dimension already has a different fixed size.
    Dim { index: usize, current: Dim, new: Dim },
}

impl fmt::Display for RefineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefineError::ElemType { current, new } => {
                write!(f, "element type is {} and cannot change to {}", current, new)
            }
            RefineError::Rank { current, new } => {
                write!(f, "rank is {} and cannot change to {}", current, new)
            }
            RefineError::Dim {
                index,
                current,
                new,
            } => write!(
                f,
                "dimension {} is {} and cannot change to {}",
                index, current, new
            ),
        }
    }
}

impl std::error::Error for RefineError {}

/// Element type and shape of an operator input or output.
///
/// Either part may be unknown. Descriptors are refined monotonically: once
/// the element type or a dimension size is known, it cannot change.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValueType {
    #[cfg_attr(feature = "serde", serde(default))]
    pub elem_type: Option<DataType>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub shape: Shape,
}

impl ValueType {
    /// Create a descriptor with unknown element type and unknown rank.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn new(elem_type: Option<DataType>, shape: Shape) -> Self {
        ValueType { elem_type, shape }
    }

    /// Create a descriptor for a tensor with a known type and fixed shape.
    pub fn tensor(elem_type: DataType, shape: &[usize]) -> Self {
        ValueType {
            elem_type: Some(elem_type),
            shape: Shape::from_fixed(shape),
        }
    }

    /// Set the element type, which must be unset or equal to `elem_type`.
    pub fn refine_elem_type(&mut self, elem_type: DataType) -> Result<(), RefineError> {
        match self.elem_type {
            Some(current) if current != elem_type => Err(RefineError::ElemType {
                current,
                new: elem_type,
            }),
            _ => {
                self.elem_type = Some(elem_type);
                Ok(())
            }
        }
    }

    /// Refine the shape. See [`Shape::refine`].
    pub fn refine_shape(&mut self, shape: &Shape) -> Result<(), RefineError> {
        self.shape.refine(shape)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.elem_type {
            Some(dtype) => write!(f, "{}", dtype)?,
            None => write!(f, "?")?,
        }
        write!(f, " {}", self.shape)
    }
}
