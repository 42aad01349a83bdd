use derivative::Derivative;
use serde::Deserialize;
use serde::Serialize;
use serde::de::Error;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::file_uploads::FormAccessor;
use crate::file_uploads::FormData;
use crate::json_ext::Object;

/// The basic GraphQL request parameters: `query`, `operationName` and `variables`.
///
/// This is both the shape of a JSON request body and of the `operations`
/// field of a multipart request.
#[derive(Clone, Derivative, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[derivative(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Request {
    /// The GraphQL operation (e.g., query, mutation) string.
    ///
    /// For historical purposes, the term "query" is commonly used to refer to
    /// *any* GraphQL operation which might be, e.g., a `mutation`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub query: Option<String>,

    /// The (optional) GraphQL operation name.
    ///
    /// When specified, this name must match the name of an operation in the
    /// GraphQL document.  When excluded, there must exist only a single
    /// operation in the GraphQL document.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation_name: Option<String>,

    /// The (optional) GraphQL variables in the form of a JSON object.
    ///
    /// For multipart requests this object carries `null` placeholders where
    /// the uploaded files will be injected.
    #[serde(
        skip_serializing_if = "Object::is_empty",
        default,
        deserialize_with = "deserialize_null_default"
    )]
    pub variables: Object,
}

// NOTE: this deserialize helper is used to transform `null` to Default::default()
fn deserialize_null_default<'de, D, T: Default + Deserialize<'de>>(
    deserializer: D,
) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
{
    <Option<T>>::deserialize(deserializer).map(|x| x.unwrap_or_default())
}

#[buildstructor::buildstructor]
impl Request {
    #[builder(visibility = "pub")]
    /// This is the constructor (or builder) to use when constructing a GraphQL
    /// `Request`.
    fn new(
        query: Option<String>,
        operation_name: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor’s map special-casing
        variables: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            query,
            operation_name,
            variables,
        }
    }

    /// Deserialize a JSON request body.
    pub fn deserialize_from_bytes(data: &[u8]) -> Result<Request, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Convert encoded URL query string parameters (also known as "search
    /// params") into a GraphQL [`Request`].
    ///
    /// `variables` is expected to hold a JSON encoded object.
    pub fn from_urlencoded_query(url_encoded_query: String) -> Result<Request, serde_json::Error> {
        let form = FormData::from_urlencoded(url_encoded_query.as_bytes())
            .map_err(serde_json::Error::custom)?;
        Self::from_form(&form)
    }

    /// Read the basic parameters out of submitted form fields.
    ///
    /// Fields that are absent leave the matching parameter unset.
    pub(crate) fn from_form(form: &impl FormAccessor) -> Result<Request, serde_json::Error> {
        let variables: Object = match form.value("variables") {
            Some(variables) if !variables.trim().is_empty() => {
                serde_json::from_str::<Option<Object>>(variables)?.unwrap_or_default()
            }
            _ => Object::default(),
        };

        Ok(Self::builder()
            .and_query(form.value("query").map(str::to_owned))
            .and_operation_name(form.value("operationName").map(str::to_owned))
            .variables(variables)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use serde_json_bytes::json as bjson;
    use test_log::test;

    use super::*;

    #[test]
    fn test_request() {
        let data = json!(
        {
          "query": "query aTest($arg1: String!) { test(who: $arg1) }",
          "operationName": "aTest",
          "variables": { "arg1": "me" }
        })
        .to_string();
        let result = serde_json::from_str::<Request>(data.as_str());
        assert_eq!(
            result.unwrap(),
            Request::builder()
                .query("query aTest($arg1: String!) { test(who: $arg1) }".to_owned())
                .operation_name("aTest")
                .variables(bjson!({ "arg1": "me" }).as_object().unwrap().clone())
                .build()
        );
    }

    #[test]
    fn test_no_variables() {
        let result = Request::deserialize_from_bytes(
            json!(
            {
              "query": "query aTest($arg1: String!) { test(who: $arg1) }",
              "operationName": "aTest",
            })
            .to_string()
            .as_bytes(),
        );
        assert_eq!(
            result.unwrap(),
            Request::builder()
                .query("query aTest($arg1: String!) { test(who: $arg1) }".to_owned())
                .operation_name("aTest")
                .build()
        );
    }

    #[test]
    // some clients send { "variables": null } when they have nothing to send
    fn test_variables_is_null() {
        let result = Request::deserialize_from_bytes(
            json!(
            {
              "query": "{ hello }",
              "variables": null,
            })
            .to_string()
            .as_bytes(),
        );
        assert_eq!(
            result.unwrap(),
            Request::builder().query("{ hello }").build()
        );
    }

    #[test]
    fn batched_body_is_rejected() {
        let result = Request::deserialize_from_bytes(br#"[{"query":"{ hello }"}]"#);
        assert!(result.is_err());
    }

    #[test]
    fn from_urlencoded_query_works() {
        let query_string =
            "query=query+hello%7Bhello%7D&operationName=hello&variables=%7B%7D".to_string();

        let req = Request::from_urlencoded_query(query_string).unwrap();

        assert_eq!(
            req,
            Request::builder()
                .query("query hello{hello}")
                .operation_name("hello")
                .build()
        );
    }

    #[test]
    fn from_urlencoded_query_with_variables_works() {
        let query_string = "query=query+double%28%24value%3AInt%29%7Bdouble%28value%3A%24value%29%7D&operationName=double&variables=%7B%22value%22%3A5%7D".to_string();

        let req = Request::from_urlencoded_query(query_string).unwrap();

        assert_eq!(
            req,
            Request::builder()
                .query("query double($value:Int){double(value:$value)}")
                .operation_name("double")
                .variables(bjson!({ "value": 5 }).as_object().unwrap().clone())
                .build()
        );
    }

    #[test]
    fn from_urlencoded_query_rejects_invalid_variables() {
        let query_string = "query=%7Bhello%7D&variables=%7Bnope".to_string();
        assert!(Request::from_urlencoded_query(query_string).is_err());
    }
}
