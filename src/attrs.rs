//! Operator attributes and typed accessors.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kind of value an attribute holds.
///
/// These correspond to the `AttributeProto.AttributeType` values in the ONNX
/// format which are relevant for shape inference.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AttrType {
    Float,
    Int,
    String,
    Floats,
    Ints,
    Strings,
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrType::Float => "FLOAT",
            AttrType::Int => "INT",
            AttrType::String => "STRING",
            AttrType::Floats => "FLOATS",
            AttrType::Ints => "INTS",
            AttrType::Strings => "STRINGS",
        };
        write!(f, "{}", name)
    }
}

/// Value of an operator attribute.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AttrValue {
    Float(f32),
    Int(i64),
    String(String),
    Floats(Vec<f32>),
    Ints(Vec<i64>),
    Strings(Vec<String>),
}

impl AttrValue {
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::Float(_) => AttrType::Float,
            AttrValue::Int(_) => AttrType::Int,
            AttrValue::String(_) => AttrType::String,
            AttrValue::Floats(_) => AttrType::Floats,
            AttrValue::Ints(_) => AttrType::Ints,
            AttrValue::Strings(_) => AttrType::Strings,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Float(x) => write!(f, "{}", x),
            AttrValue::Int(x) => write!(f, "{}", x),
            AttrValue::String(x) => write!(f, "\"{}\"", x),
            AttrValue::Floats(x) => write!(f, "{:?}", x),
            AttrValue::Ints(x) => write!(f, "{:?}", x),
            AttrValue::Strings(x) => write!(f, "{:?}", x),
        }
    }
}

macro_rules! impl_from_for_attr_value {
    ($type:ty, $variant:ident) => {
        impl From<$type> for AttrValue {
            fn from(val: $type) -> Self {
                AttrValue::$variant(val.into())
            }
        }
    };
}

impl_from_for_attr_value!(f32, Float);
impl_from_for_attr_value!(i64, Int);
impl_from_for_attr_value!(&str, String);
impl_from_for_attr_value!(String, String);
impl_from_for_attr_value!(Vec<f32>, Floats);
impl_from_for_attr_value!(Vec<i64>, Ints);
impl_from_for_attr_value!(&[i64], Ints);
impl_from_for_attr_value!(&[f32], Floats);
impl_from_for_attr_value!(Vec<String>, Strings);

/// Error when an attribute does not have the kind of value requested.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrError {
    TypeMismatch {
        /// Name of the attribute.
        name: String,
        /// Kind of value requested.
        expected: AttrType,
        /// Kind of value the attribute holds.
        actual: AttrType,
    },
}

impl fmt::Display for AttrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrError::TypeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "attribute \"{}\" has type {} but {} was requested",
                name, actual, expected
            ),
        }
    }
}

impl std::error::Error for AttrError {}

/// Conversion from an attribute value to a Rust type.
pub trait FromAttr<'a>: Sized {
    /// Kind of attribute this type is read from.
    const ATTR_TYPE: AttrType;

    /// Extract the value, or return `None` if `value` has the wrong kind.
    fn from_attr(value: &'a AttrValue) -> Option<Self>;
}

macro_rules! impl_from_attr {
    ($type:ty, $variant:ident, |$x:ident| $conv:expr) => {
        impl<'a> FromAttr<'a> for $type {
            const ATTR_TYPE: AttrType = AttrType::$variant;

            fn from_attr(value: &'a AttrValue) -> Option<Self> {
                match value {
                    AttrValue::$variant($x) => Some($conv),
                    _ => None,
                }
            }
        }
    };
}

impl_from_attr!(f32, Float, |x| *x);
impl_from_attr!(i64, Int, |x| *x);
impl_from_attr!(bool, Int, |x| *x != 0);
impl_from_attr!(&'a str, String, |x| x.as_str());
impl_from_attr!(&'a [f32], Floats, |x| x.as_slice());
impl_from_attr!(&'a [i64], Ints, |x| x.as_slice());
impl_from_attr!(&'a [String], Strings, |x| x.as_slice());

/// A named attribute value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attr {
    pub name: String,
    pub value: AttrValue,
}

/// Attributes of one operator instance.
///
/// Attributes are kept in the order they were added. Adding an attribute
/// with the same name as an existing one replaces it.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Attributes {
    attrs: Vec<Attr>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an attribute.
    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) {
        let value = value.into();
        if let Some(attr) = self.attrs.iter_mut().find(|attr| attr.name == name) {
            attr.value = value;
        } else {
            self.attrs.push(Attr {
                name: name.to_string(),
                value,
            });
        }
    }

    /// Builder-style variant of [`set`](Attributes::set).
    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Get an attribute's value, or `None` if absent.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get an attribute and convert it to `T`.
    ///
    /// Returns `Ok(None)` if the attribute is absent and an error if it holds
    /// a different kind of value than `T` is read from.
    pub fn get_as<'a, T: FromAttr<'a>>(&'a self, name: &str) -> Result<Option<T>, AttrError> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        T::from_attr(value)
            .map(Some)
            .ok_or_else(|| AttrError::TypeMismatch {
                name: name.to_string(),
                expected: T::ATTR_TYPE,
                actual: value.attr_type(),
            })
    }

    /// Get an attribute converted to `T`, or `default` if absent.
    pub fn get_or<'a, T: FromAttr<'a>>(&'a self, name: &str, default: T) -> Result<T, AttrError> {
        Ok(self.get_as(name)?.unwrap_or(default))
    }

    /// Get the elements of a list-valued attribute.
    ///
    /// An absent attribute yields an empty slice, the same as an attribute
    /// set to an empty list. Use [`contains`](Attributes::contains) to
    /// distinguish the two.
    pub fn get_repeated<'a, T>(&'a self, name: &str) -> Result<&'a [T], AttrError>
    where
        &'a [T]: FromAttr<'a>,
    {
        self.get_or::<&'a [T]>(name, &[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs
            .iter()
            .map(|attr| (attr.name.as_str(), &attr.value))
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl<S: Into<String>, V: Into<AttrValue>> FromIterator<(S, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (name, value) in iter {
            attrs.set(&name.into(), value);
        }
        attrs
    }
}
