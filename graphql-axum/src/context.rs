//! Per-request context.
//!
//! Every request gets a fresh [`Context`], built by folding it through the
//! registered context providers, and handed to the executor.

use std::fmt;
use std::sync::Arc;

use http::HeaderMap;
use http::HeaderName;
use http::HeaderValue;
use http::Method;
use http::Uri;
use http::Version;
use http::request::Parts;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::BoxError;

use crate::json_ext::Value;

/// A function building up the context of a request.
///
/// Providers run synchronously, once per request, in registration order.
pub type ContextProviderFn = Arc<dyn Fn(&RequestHandle, Context) -> Context + Send + Sync>;

/// Holds [`Context`] entries.
pub(crate) type Entries = IndexMap<String, Value>;

/// Request-scoped data made available to the executor and its resolvers.
///
/// Entries are JSON values under string keys. The incoming request itself is
/// always available through [`Context::request_handle`].
#[derive(Clone, Default)]
pub struct Context {
    entries: Entries,
    request: Option<RequestHandle>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle of the request being served.
    ///
    /// Set before any user supplied provider runs.
    pub fn request_handle(&self) -> Option<&RequestHandle> {
        self.request.as_ref()
    }

    /// Get a value from the context using the provided key.
    ///
    /// Semantics:
    ///  - If the operation fails, that's because we can't turn the value into the type.
    ///  - If the operation succeeds, the value is an [`Option`].
    pub fn get<K, V>(&self, key: K) -> Result<Option<V>, BoxError>
    where
        K: AsRef<str>,
        V: DeserializeOwned,
    {
        self.entries
            .get(key.as_ref())
            .map(|value| serde_json_bytes::from_value(value.clone()))
            .transpose()
            .map_err(|e| e.into())
    }

    /// Insert a value into the context using the provided key and value.
    ///
    /// Semantics:
    ///  - If the operation fails, then the pair has not been inserted.
    ///  - If the operation succeeds, the result is the old value as an [`Option`].
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Result<Option<Value>, BoxError>
    where
        K: Into<String>,
        V: Serialize,
    {
        let value = serde_json_bytes::to_value(value)?;
        Ok(self.insert_json_value(key, value))
    }

    /// Insert a value in the context using the provided key and value.
    ///
    /// Returns the previous value, if any.
    pub fn insert_json_value<K>(&mut self, key: K, value: Value) -> Option<Value>
    where
        K: Into<String>,
    {
        self.entries.insert(key.into(), value)
    }

    /// Consume the context and return it with one more entry.
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.insert_json_value(key, value.into());
        self
    }

    /// Get a json value from the context using the provided key.
    pub fn get_json_value<K>(&self, key: K) -> Option<Value>
    where
        K: AsRef<str>,
    {
        self.entries.get(key.as_ref()).cloned()
    }

    /// Iterate over the entries, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("entries", &self.entries)
            .field("request", &self.request.is_some())
            .finish()
    }
}

/// The HTTP request being served, as seen by context providers and resolvers.
///
/// Resolvers can also use it to add headers to the HTTP response.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<RequestHandleInner>,
}

struct RequestHandleInner {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    response_headers: Mutex<HeaderMap>,
}

impl RequestHandle {
    pub(crate) fn new(parts: &Parts) -> Self {
        Self {
            inner: Arc::new(RequestHandleInner {
                method: parts.method.clone(),
                uri: parts.uri.clone(),
                version: parts.version,
                headers: parts.headers.clone(),
                response_headers: Mutex::new(HeaderMap::new()),
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn version(&self) -> Version {
        self.inner.version
    }

    /// Headers of the incoming request.
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Set a header on the HTTP response, replacing any previous value.
    pub fn insert_response_header(&self, name: HeaderName, value: HeaderValue) {
        self.inner.response_headers.lock().insert(name, value);
    }

    /// Add a header to the HTTP response, keeping previous values.
    pub fn append_response_header(&self, name: HeaderName, value: HeaderValue) {
        self.inner.response_headers.lock().append(name, value);
    }

    /// Headers added so far for the HTTP response.
    pub fn response_headers(&self) -> HeaderMap {
        self.inner.response_headers.lock().clone()
    }

    pub(crate) fn take_response_headers(&self) -> HeaderMap {
        std::mem::take(&mut *self.inner.response_headers.lock())
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("method", &self.inner.method)
            .field("uri", &self.inner.uri)
            .finish()
    }
}

/// An ordered list of context providers.
#[derive(Clone, Default)]
pub struct ContextProviders {
    providers: Vec<ContextProviderFn>,
}

impl ContextProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider, to run after the ones already registered.
    pub fn provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&RequestHandle, Context) -> Context + Send + Sync + 'static,
    {
        self.providers.push(Arc::new(provider));
        self
    }

    /// The providers of `self` followed by the ones of `other`.
    pub fn chain(&self, other: &ContextProviders) -> ContextProviders {
        ContextProviders {
            providers: self
                .providers
                .iter()
                .chain(other.providers.iter())
                .cloned()
                .collect(),
        }
    }

    /// Build the context of a request.
    ///
    /// The request handle is injected first, then every provider gets the
    /// output of the previous one.
    pub fn run(&self, request: &RequestHandle, initial: Context) -> Context {
        let context = inject_request_handle(request, initial);
        self.providers
            .iter()
            .fold(context, |context, provider| provider(request, context))
    }
}

impl fmt::Debug for ContextProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextProviders")
            .field("len", &self.providers.len())
            .finish()
    }
}

fn inject_request_handle(request: &RequestHandle, mut context: Context) -> Context {
    context.request = Some(request.clone());
    context
}

#[cfg(test)]
mod tests {
    use http::header::CACHE_CONTROL;
    use serde::Deserialize;

    use super::*;

    fn request_handle() -> RequestHandle {
        let (parts, _) = http::Request::builder()
            .method(Method::POST)
            .uri("/graphql?x=1")
            .header("x-user", "alice")
            .body(())
            .unwrap()
            .into_parts();
        RequestHandle::new(&parts)
    }

    #[test]
    fn test_context_insert() {
        let mut c = Context::new();
        assert!(c.insert("key1", 1).is_ok());
        assert_eq!(c.get("key1").unwrap(), Some(1));
        assert_eq!(c.insert("key1", 2).unwrap(), Some(Value::from(1)));
        assert_eq!(c.get("key1").unwrap(), Some(2));
    }

    #[test]
    fn test_context_get_wrong_type() {
        let c = Context::new().with("key1", "not a number");
        assert!(c.get::<_, i64>("key1").is_err());
        assert_eq!(c.get::<_, i64>("missing").unwrap(), None);
    }

    #[test]
    fn test_context_structured_values() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct User {
            id: u32,
            name: String,
        }

        let mut c = Context::new();
        c.insert(
            "users",
            vec![
                User {
                    id: 1,
                    name: "a".to_string(),
                },
                User {
                    id: 2,
                    name: "b".to_string(),
                },
            ],
        )
        .unwrap();
        let users: Vec<User> = c.get("users").unwrap().unwrap();
        assert_eq!(users[1].name, "b");
    }

    #[test]
    fn request_handle_is_injected_first() {
        let handle = request_handle();
        let providers = ContextProviders::new().provider(|request: &RequestHandle, context: Context| {
            let seen = context.request_handle().is_some();
            context
                .with("saw_handle", seen)
                .with("method", request.method().as_str())
        });

        let context = providers.run(&handle, Context::new());
        assert_eq!(context.get::<_, bool>("saw_handle").unwrap(), Some(true));
        assert_eq!(
            context.get::<_, String>("method").unwrap().as_deref(),
            Some("POST")
        );
        let injected = context.request_handle().unwrap();
        assert_eq!(injected.uri(), "/graphql?x=1");
        assert_eq!(injected.headers()["x-user"], "alice");
    }

    #[test]
    fn providers_fold_in_registration_order() {
        let handle = request_handle();
        let first = ContextProviders::new()
            .provider(|_: &RequestHandle, context: Context| context.with("value", 1))
            .provider(|_: &RequestHandle, context: Context| context.with("value", 2));
        let context = first.run(&handle, Context::new());
        assert_eq!(context.get::<_, i64>("value").unwrap(), Some(2));

        let reversed = ContextProviders::new()
            .provider(|_: &RequestHandle, context: Context| context.with("value", 2))
            .provider(|_: &RequestHandle, context: Context| context.with("value", 1));
        let context = reversed.run(&handle, Context::new());
        assert_eq!(context.get::<_, i64>("value").unwrap(), Some(1));
    }

    #[test]
    fn chained_providers_keep_application_ones_first() {
        let handle = request_handle();
        let application = ContextProviders::new()
            .provider(|_: &RequestHandle, context: Context| context.with("order", "app"));
        let route = ContextProviders::new().provider(|_: &RequestHandle, context: Context| {
            let previous: String = context.get("order").unwrap().unwrap_or_default();
            context.with("order", format!("{previous},route"))
        });

        let chained = application.chain(&route);
        let context = application.run(&handle, Context::new());
        assert_eq!(
            context.get::<_, String>("order").unwrap().as_deref(),
            Some("app")
        );

        let context = chained.run(&handle, Context::new());
        assert_eq!(
            context.get::<_, String>("order").unwrap().as_deref(),
            Some("app,route")
        );
    }

    #[test]
    fn initial_context_is_kept() {
        let handle = request_handle();
        let context = ContextProviders::new().run(&handle, Context::new().with("base", true));
        assert_eq!(context.get::<_, bool>("base").unwrap(), Some(true));
        assert_eq!(context.iter().count(), 1);
    }

    #[test]
    fn response_headers_are_collected() {
        let handle = request_handle();
        let clone = handle.clone();
        clone.insert_response_header(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        handle.append_response_header(
            HeaderName::from_static("x-custom"),
            HeaderValue::from_static("a"),
        );
        handle.append_response_header(
            HeaderName::from_static("x-custom"),
            HeaderValue::from_static("b"),
        );

        assert_eq!(handle.response_headers()[CACHE_CONTROL], "no-store");
        let taken = handle.take_response_headers();
        assert_eq!(taken.get_all("x-custom").iter().count(), 2);
        assert!(handle.response_headers().is_empty());
    }
}
