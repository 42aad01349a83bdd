use std::fmt;

use super::error::FormatError;
use super::error::NavigationError;
use crate::variables::Variable;
use crate::variables::Variables;

const VARIABLES_ROOT: &str = "variables";

/// One dot separated token of a path inside the `map` field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    fn expected(&self) -> &'static str {
        match self {
            PathSegment::Key(_) => "object",
            PathSegment::Index(_) => "list",
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A path such as `variables.input.files.0`, with the `variables` root
/// stripped.
///
/// A segment made only of decimal digits is always an index, so object keys
/// that look like numbers cannot be addressed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VariablePath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl VariablePath {
    pub fn parse(path: &str) -> Result<Self, FormatError> {
        if path.is_empty() {
            return Err(FormatError::EmptyPath);
        }

        let mut tokens = path.split('.');
        match tokens.next() {
            Some(VARIABLES_ROOT) => {}
            Some(first) if is_index(first) => return Err(FormatError::BatchRequestsNotSupported),
            _ => return Err(FormatError::InvalidPathRoot(path.to_string())),
        }

        let segments = tokens
            .map(|token| {
                if is_index(token) {
                    token
                        .parse()
                        .map(PathSegment::Index)
                        .map_err(|_| FormatError::InvalidIndex(path.to_string()))
                } else {
                    Ok(PathSegment::Key(token.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if segments.is_empty() {
            return Err(FormatError::MissingVariableName(path.to_string()));
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

fn is_index(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Write `value` at `path` inside `root`.
///
/// Every container on the way must already exist with the right shape: the
/// operations payload carries the skeleton, with `null` placeholders at the
/// upload positions. Whatever is at the final position is overwritten.
pub fn place(
    value: Variable,
    root: &mut Variables,
    path: &VariablePath,
) -> Result<(), NavigationError> {
    let Some((first, rest)) = path.segments.split_first() else {
        return Err(NavigationError::ValueNotFound {
            path: path.to_string(),
            segment: String::new(),
        });
    };

    let name = match first {
        PathSegment::Key(name) => name,
        PathSegment::Index(_) => {
            return Err(NavigationError::ShapeMismatch {
                path: path.to_string(),
                segment: first.to_string(),
                expected: "list",
                found: "object",
            });
        }
    };

    let Some((last, parents)) = rest.split_last() else {
        root.insert(name.clone(), value);
        return Ok(());
    };

    let mut cursor = root
        .get_mut(name.as_str())
        .ok_or_else(|| NavigationError::ValueNotFound {
            path: path.to_string(),
            segment: name.clone(),
        })?;
    for segment in parents {
        cursor = step(cursor, segment, path)?;
    }

    match (cursor, last) {
        (Variable::Object(object), PathSegment::Key(key)) => {
            object.insert(key.clone(), value);
            Ok(())
        }
        (Variable::List(list), PathSegment::Index(index)) => {
            let len = list.len();
            let slot = list
                .get_mut(*index)
                .ok_or_else(|| NavigationError::IndexOutOfBounds {
                    path: path.to_string(),
                    index: *index,
                    len,
                })?;
            *slot = value;
            Ok(())
        }
        (other, segment) => Err(NavigationError::ShapeMismatch {
            path: path.to_string(),
            segment: segment.to_string(),
            expected: segment.expected(),
            found: other.kind(),
        }),
    }
}

fn step<'a>(
    container: &'a mut Variable,
    segment: &PathSegment,
    path: &VariablePath,
) -> Result<&'a mut Variable, NavigationError> {
    match (container, segment) {
        (Variable::Object(object), PathSegment::Key(key)) => {
            object
                .get_mut(key.as_str())
                .ok_or_else(|| NavigationError::ValueNotFound {
                    path: path.to_string(),
                    segment: key.clone(),
                })
        }
        (Variable::List(list), PathSegment::Index(index)) => {
            let len = list.len();
            list.get_mut(*index)
                .ok_or_else(|| NavigationError::IndexOutOfBounds {
                    path: path.to_string(),
                    index: *index,
                    len,
                })
        }
        (other, segment) => Err(NavigationError::ShapeMismatch {
            path: path.to_string(),
            segment: segment.to_string(),
            expected: segment.expected(),
            found: other.kind(),
        }),
    }
}
