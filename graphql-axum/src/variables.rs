//! The variables tree handed to the executor.
//!
//! Variables start out as the JSON object submitted by the client. Multipart
//! requests then get [`Upload`] handles injected at the positions named by the
//! upload map, so the tree needs a variant JSON does not have.

use indexmap::IndexMap;
use serde::Serialize;
use serde::Serializer;
use serde_json_bytes::ByteString;

use crate::json_ext::Value;
use crate::upload::Upload;

/// GraphQL variables: the root of the tree is always keyed.
pub type Variables = IndexMap<String, Variable>;

/// A node in the [`Variables`] tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Variable {
    /// `null`, also used by clients as the placeholder at upload positions.
    #[default]
    Null,

    /// A boolean, number or string.
    Scalar(Value),

    /// A keyed container.
    Object(Variables),

    /// An ordered container.
    List(Vec<Variable>),

    /// A file submitted as a multipart form part.
    Upload(Upload),
}

impl Variable {
    pub fn is_null(&self) -> bool {
        matches!(self, Variable::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variable::Scalar(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Variable::Scalar(value) => value.as_i64(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Variables> {
        match self {
            Variable::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Variable]> {
        match self {
            Variable::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_upload(&self) -> Option<&Upload> {
        match self {
            Variable::Upload(upload) => Some(upload),
            _ => None,
        }
    }

    /// Field lookup on a keyed container.
    pub fn get(&self, key: &str) -> Option<&Variable> {
        self.as_object().and_then(|object| object.get(key))
    }

    /// Short name of the variant, used in error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Variable::Null => "null",
            Variable::Scalar(Value::Bool(_)) => "boolean",
            Variable::Scalar(Value::Number(_)) => "number",
            Variable::Scalar(_) => "string",
            Variable::Object(_) => "object",
            Variable::List(_) => "list",
            Variable::Upload(_) => "upload",
        }
    }

    /// Build the variables tree from a JSON object.
    pub fn from_object(object: crate::json_ext::Object) -> Variables {
        object
            .into_iter()
            .map(|(key, value)| (key.as_str().to_owned(), Variable::from(value)))
            .collect()
    }
}

impl From<Value> for Variable {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Variable::Null,
            Value::Array(list) => Variable::List(list.into_iter().map(Variable::from).collect()),
            Value::Object(object) => Variable::Object(Variable::from_object(object)),
            scalar => Variable::Scalar(scalar),
        }
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Variable::Scalar(Value::String(ByteString::from(value)))
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Variable::Scalar(Value::String(ByteString::from(value)))
    }
}

impl From<Upload> for Variable {
    fn from(upload: Upload) -> Self {
        Variable::Upload(upload)
    }
}

/// Uploads serialize as their metadata, which keeps the tree printable in
/// logs and echoable by executors.
impl Serialize for Variable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Variable::Null => serializer.serialize_unit(),
            Variable::Scalar(value) => value.serialize(serializer),
            Variable::Object(object) => object.serialize(serializer),
            Variable::List(list) => list.serialize(serializer),
            Variable::Upload(upload) => upload.serialize(serializer),
        }
    }
}
