use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;

use crate::graphql::Error;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// A GraphQL response, as returned by the executor and sent back to the client.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Response {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(data: Option<Value>, errors: Vec<Error>, extensions: Map<ByteString, Value>) -> Self {
        Self {
            data,
            errors,
            extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json as bjson;

    use super::*;

    #[test]
    fn empty_response_serializes_to_empty_object() {
        assert_eq!(
            serde_json::to_string(&Response::default()).unwrap(),
            "{}"
        );
    }

    #[test]
    fn response_round_trips_engine_output() {
        let response = Response::builder()
            .data(bjson!({ "hello": "world" }))
            .error(Error::builder().message("partial failure").build())
            .build();

        let serialized = serde_json::to_string(&response).unwrap();
        assert_eq!(
            serialized,
            r#"{"data":{"hello":"world"},"errors":[{"message":"partial failure"}]}"#
        );
        assert_eq!(
            serde_json::from_str::<Response>(&serialized).unwrap(),
            response
        );
    }
}
