use opschema::{AttrType, AttrValue, DataType, Dim, Shape, ValueType};

/// Parse an input descriptor such as `float[2,3]`.
///
/// The element type is a type name as used in `tensor(<name>)` strings, or
/// `?` if unknown. It is optionally followed by a comma-separated list of
/// dimensions in brackets, where each dimension is a size, a symbolic name
/// or `?`. If the brackets are omitted the rank is unknown. `float[]` is a
/// scalar.
pub fn parse_value_type(spec: &str) -> Result<ValueType, ParseError> {
    let spec = spec.trim();
    let (type_str, dims_str) = match spec.find('[') {
        Some(pos) => (&spec[..pos], Some(&spec[pos..])),
        None => (spec, None),
    };

    let elem_type = match type_str.trim() {
        "?" => None,
        name => Some(
            name.parse::<DataType>()
                .map_err(|_| ParseError::new(spec, ParseErrorKind::InvalidType))?,
        ),
    };

    let shape = match dims_str {
        None => Shape::unknown(),
        Some(dims_str) => {
            let Some(inner) = dims_str
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
            else {
                return Err(ParseError::new(
                    spec,
                    ParseErrorKind::InvalidFormat {
                        message: "expected dimensions to end with ']'".into(),
                    },
                ));
            };
            split_list(inner)
                .map(|dim| parse_dim(spec, dim))
                .collect::<Result<Shape, _>>()?
        }
    };

    Ok(ValueType::new(elem_type, shape))
}

fn parse_dim(spec: &str, dim: &str) -> Result<Dim, ParseError> {
    if dim == "?" {
        return Ok(Dim::Unknown);
    }
    if let Ok(size) = dim.parse::<usize>() {
        return Ok(Dim::Fixed(size));
    }
    let is_name = dim
        .chars()
        .next()
        .is_some_and(|ch| ch.is_alphabetic() || ch == '_')
        && dim.chars().all(|ch| ch.is_alphanumeric() || ch == '_');
    if !is_name {
        return Err(ParseError::new(spec, ParseErrorKind::InvalidDim));
    }
    Ok(Dim::Symbolic(dim.to_string()))
}

/// Parse an attribute specifier in the form `name=value`.
///
/// Integers and floats are parsed as INT and FLOAT attributes. Lists are
/// written in brackets (`[1,2]`) and are INTS if every item is an integer,
/// else FLOATS if every item is a number, else STRINGS. Anything else is a
/// STRING. Quotes force a value to be a string.
pub fn parse_attr(spec: &str) -> Result<(String, AttrValue), ParseError> {
    let Some((name, value)) = spec.split_once('=') else {
        return Err(ParseError::new(
            spec,
            ParseErrorKind::InvalidFormat {
                message: "expected <name>=<value> but no '=' was found".into(),
            },
        ));
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::new(spec, ParseErrorKind::InvalidName));
    }

    let value = value.trim();
    let value = if let Some(inner) = value.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let items: Vec<&str> = split_list(inner).collect();
        if let Ok(ints) = items.iter().map(|s| s.parse()).collect::<Result<Vec<i64>, _>>() {
            AttrValue::Ints(ints)
        } else if let Ok(floats) = items.iter().map(|s| s.parse()).collect::<Result<Vec<f32>, _>>()
        {
            AttrValue::Floats(floats)
        } else {
            AttrValue::Strings(items.iter().map(|s| unquote(s).to_string()).collect())
        }
    } else if let Ok(int) = value.parse::<i64>() {
        AttrValue::Int(int)
    } else if let Ok(float) = value.parse::<f32>() {
        AttrValue::Float(float)
    } else {
        AttrValue::String(unquote(value).to_string())
    };

    Ok((name.to_string(), value))
}

/// Convert an attribute value parsed by [`parse_attr`] to the kind the
/// operator's schema declares for it.
///
/// Whole numbers parse as INT, so `scale=2` becomes a FLOAT here if `scale`
/// is declared as one. Values which cannot be converted are returned as-is
/// and reported by schema verification.
pub fn coerce_attr(value: AttrValue, expected: AttrType) -> AttrValue {
    match (value, expected) {
        (AttrValue::Int(x), AttrType::Float) => AttrValue::Float(x as f32),
        (AttrValue::Int(x), AttrType::String) => AttrValue::String(x.to_string()),
        (AttrValue::Ints(xs), AttrType::Floats) => {
            AttrValue::Floats(xs.into_iter().map(|x| x as f32).collect())
        }
        (AttrValue::Ints(xs), AttrType::Strings) => {
            AttrValue::Strings(xs.into_iter().map(|x| x.to_string()).collect())
        }
        (value, _) => value,
    }
}

/// Split a comma-separated list, trimming items. An empty string is an empty
/// list.
fn split_list(list: &str) -> impl Iterator<Item = &str> {
    let list = list.trim();
    list.split(',')
        .map(str::trim)
        .filter(move |_| !list.is_empty())
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::enum_variant_names)] // Don't warn about all variants having "Invalid" prefix.
enum ParseErrorKind {
    /// Spec does not have the expected structure.
    InvalidFormat { message: String },
    /// Attribute name is empty.
    InvalidName,
    /// Element type is not a known type name.
    InvalidType,
    /// Dimension is not a size, name or "?".
    InvalidDim,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    spec: String,
    kind: ParseErrorKind,
}

impl ParseError {
    fn new(spec: &str, kind: ParseErrorKind) -> ParseError {
        ParseError {
            spec: spec.to_string(),
            kind,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ParseErrorKind::InvalidFormat { message } => {
                write!(fmt, "invalid format for \"{}\": {}", self.spec, message)
            }
            ParseErrorKind::InvalidName => {
                write!(fmt, "missing attribute name in \"{}\"", self.spec)
            }
            ParseErrorKind::InvalidType => {
                write!(fmt, "unknown element type in \"{}\"", self.spec)
            }
            ParseErrorKind::InvalidDim => write!(
                fmt,
                "invalid dimension in \"{}\". Must be a size, a name or \"?\".",
                self.spec
            ),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use opschema::{AttrType, AttrValue, DataType, Dim, Shape, ValueType};
    use opschema_testing::TestCases;

    use super::{coerce_attr, parse_attr, parse_value_type, ParseError, ParseErrorKind};

    #[test]
    fn test_parse_value_type() {
        #[derive(Debug)]
        struct Case<'a> {
            spec: &'a str,
            expected: Result<ValueType, ParseError>,
        }

        let cases = [
            Case {
                spec: "float[2,3]",
                expected: Ok(ValueType::tensor(DataType::Float, &[2, 3])),
            },
            Case {
                spec: "int64[batch, ?, 4]",
                expected: Ok(ValueType::new(
                    Some(DataType::Int64),
                    Shape::new([Dim::from("batch"), Dim::Unknown, Dim::Fixed(4)]),
                )),
            },
            Case {
                spec: "bool[]",
                expected: Ok(ValueType::tensor(DataType::Bool, &[])),
            },
            Case {
                spec: "double",
                expected: Ok(ValueType::new(Some(DataType::Double), Shape::unknown())),
            },
            Case {
                spec: "?[5]",
                expected: Ok(ValueType::new(None, Shape::from_fixed(&[5]))),
            },
            Case {
                spec: "floaty[2]",
                expected: Err(ParseError::new("floaty[2]", ParseErrorKind::InvalidType)),
            },
            Case {
                spec: "float[2,-1]",
                expected: Err(ParseError::new("float[2,-1]", ParseErrorKind::InvalidDim)),
            },
            Case {
                spec: "float[2",
                expected: Err(ParseError::new(
                    "float[2",
                    ParseErrorKind::InvalidFormat {
                        message: "expected dimensions to end with ']'".into(),
                    },
                )),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(parse_value_type(case.spec), case.expected);
        })
    }

    #[test]
    fn test_parse_attr() {
        #[derive(Debug)]
        struct Case<'a> {
            spec: &'a str,
            expected: Result<(String, AttrValue), ParseError>,
        }

        let attr = |name: &str, value: AttrValue| -> Result<(String, AttrValue), ParseError> {
            Ok((name.to_string(), value))
        };

        let cases = [
            Case {
                spec: "axis=1",
                expected: attr("axis", AttrValue::Int(1)),
            },
            Case {
                spec: "alpha=0.5",
                expected: attr("alpha", AttrValue::Float(0.5)),
            },
            Case {
                spec: "axes=[0, -1]",
                expected: attr("axes", AttrValue::Ints(vec![0, -1])),
            },
            Case {
                spec: "bias=[1.5,2]",
                expected: attr("bias", AttrValue::Floats(vec![1.5, 2.0])),
            },
            Case {
                spec: "extra_shape=[]",
                expected: attr("extra_shape", AttrValue::Ints(vec![])),
            },
            Case {
                spec: "operator=add",
                expected: attr("operator", AttrValue::String("add".into())),
            },
            Case {
                spec: "label=\"1\"",
                expected: attr("label", AttrValue::String("1".into())),
            },
            Case {
                spec: "names=[a,b]",
                expected: attr(
                    "names",
                    AttrValue::Strings(vec!["a".into(), "b".into()]),
                ),
            },
            Case {
                spec: "axis",
                expected: Err(ParseError::new(
                    "axis",
                    ParseErrorKind::InvalidFormat {
                        message: "expected <name>=<value> but no '=' was found".into(),
                    },
                )),
            },
            Case {
                spec: "=1",
                expected: Err(ParseError::new("=1", ParseErrorKind::InvalidName)),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(parse_attr(case.spec), case.expected);
        })
    }

    #[test]
    fn test_coerce_attr() {
        #[derive(Clone, Debug)]
        struct Case {
            value: AttrValue,
            expected_type: AttrType,
            expected: AttrValue,
        }

        let cases = [
            Case {
                value: AttrValue::Int(2),
                expected_type: AttrType::Float,
                expected: AttrValue::Float(2.0),
            },
            Case {
                value: AttrValue::Ints(vec![1, 2]),
                expected_type: AttrType::Floats,
                expected: AttrValue::Floats(vec![1.0, 2.0]),
            },
            Case {
                value: AttrValue::Ints(vec![]),
                expected_type: AttrType::Floats,
                expected: AttrValue::Floats(vec![]),
            },
            Case {
                value: AttrValue::Int(3),
                expected_type: AttrType::String,
                expected: AttrValue::String("3".into()),
            },
            Case {
                value: AttrValue::Int(1),
                expected_type: AttrType::Int,
                expected: AttrValue::Int(1),
            },
            // Lossy conversions are left for verification to report.
            Case {
                value: AttrValue::Float(0.5),
                expected_type: AttrType::Int,
                expected: AttrValue::Float(0.5),
            },
        ];

        cases.test_each_clone(|case| {
            assert_eq!(coerce_attr(case.value, case.expected_type), case.expected);
        })
    }
}
