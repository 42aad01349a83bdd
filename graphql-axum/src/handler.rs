use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::MethodRouter;
use axum::routing::get;
use http::HeaderMap;
use http::Method;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use http::request::Parts;
use http_body_util::BodyExt;
use mediatype::MediaType;
use mediatype::ReadParams;
use mediatype::names::APPLICATION;
use mediatype::names::BOUNDARY;
use mediatype::names::FORM_DATA;
use mediatype::names::JSON;
use mediatype::names::MULTIPART;
use tracing::Instrument;

use crate::configuration::Configuration;
use crate::context::Context;
use crate::context::ContextProviders;
use crate::context::RequestHandle;
use crate::execution;
use crate::execution::Executor;
use crate::file_uploads;
use crate::file_uploads::FileUploadsConfig;
use crate::file_uploads::FormAccessor;
use crate::file_uploads::FormData;
use crate::graphql;
use crate::upload::SpoolError;
use crate::variables::Variable;
use crate::variables::Variables;

const URLENCODED: &str = "x-www-form-urlencoded";

/// A GraphQL executor, the context providers shared by all its routes, and
/// the file upload settings.
///
/// ```ignore
/// let app = GraphQLApp::new(executor)
///     .context_provider(|request, context| context.with("user", user_of(request)));
/// let router = Router::new().route("/graphql", app.handler(ContextProviders::new()));
/// ```
#[derive(Clone)]
pub struct GraphQLApp {
    executor: Arc<dyn Executor>,
    context_providers: ContextProviders,
    file_uploads: FileUploadsConfig,
}

impl GraphQLApp {
    pub fn new(executor: impl Executor) -> Self {
        Self {
            executor: Arc::new(executor),
            context_providers: ContextProviders::new(),
            file_uploads: FileUploadsConfig::default(),
        }
    }

    /// Register a context provider for every route of this application.
    ///
    /// Application providers run before the providers of the route.
    pub fn context_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&RequestHandle, Context) -> Context + Send + Sync + 'static,
    {
        self.context_providers = self.context_providers.provider(provider);
        self
    }

    pub fn file_uploads(mut self, config: FileUploadsConfig) -> Self {
        self.file_uploads = config;
        self
    }

    /// Build the GET and POST handler of a GraphQL endpoint.
    ///
    /// `route` providers run after the application ones. The application is
    /// left untouched, so building several handlers never duplicates
    /// providers.
    pub fn handler(&self, route: ContextProviders) -> MethodRouter {
        let state = Arc::new(HandlerState {
            executor: self.executor.clone(),
            context_providers: self.context_providers.chain(&route),
            file_uploads: self.file_uploads.clone(),
        });
        get(handle_graphql).post(handle_graphql).with_state(state)
    }

    /// A router serving this application on the configured path.
    ///
    /// The configured file upload settings take precedence over the ones of
    /// the application.
    pub fn router(&self, configuration: &Configuration) -> Router {
        let app = self.clone().file_uploads(configuration.file_uploads.clone());
        Router::new().route(
            &configuration.server.path,
            app.handler(ContextProviders::new()),
        )
    }
}

impl std::fmt::Debug for GraphQLApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLApp")
            .field("context_providers", &self.context_providers)
            .field("file_uploads", &self.file_uploads)
            .finish()
    }
}

struct HandlerState {
    executor: Arc<dyn Executor>,
    context_providers: ContextProviders,
    file_uploads: FileUploadsConfig,
}

#[derive(Debug, thiserror::Error)]
enum BindError {
    #[error("failed to read the request body: {0}")]
    Body(#[from] axum::Error),

    #[error("invalid multipart request: {0}")]
    Multipart(#[from] SpoolError),

    #[error("invalid multipart request: missing boundary")]
    MissingBoundary,

    #[error("failed to decode the form: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("failed to deserialize the request into a GraphQL request: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),
}

/// What the request carried, before any interpretation.
enum Payload {
    /// Basic parameters from a query string or a JSON body.
    Request(graphql::Request),
    Form(FormData),
}

async fn handle_graphql(State(state): State<Arc<HandlerState>>, request: Request) -> Response {
    let span = tracing::debug_span!(
        "graphql_request",
        method = %request.method(),
        uri = %request.uri()
    );
    serve(state, request).instrument(span).await
}

async fn serve(state: Arc<HandlerState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let handle = RequestHandle::new(&parts);

    let payload = match bind(&parts, body, &state.file_uploads).await {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "could not bind the GraphQL request");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                graphql::Error::builder()
                    .message(err.to_string())
                    .extension_code("INVALID_GRAPHQL_REQUEST")
                    .build(),
            );
        }
    };

    // keeps the spooled files alive until the executor is done
    let (request, _form) = match into_execution_parts(payload, &state.file_uploads) {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    let context = state.context_providers.run(&handle, Context::new());
    let request = execution::Request::builder()
        .and_query(request.query)
        .and_operation_name(request.operation_name)
        .variables(request.variables)
        .context(context)
        .build();

    let response = match state.executor.execute(request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "GraphQL execution failed");
            return error_response(
                StatusCode::OK,
                graphql::Error::builder()
                    .message(err.to_string())
                    .extension_code("INTERNAL_SERVER_ERROR")
                    .build(),
            );
        }
    };

    let mut http_response = Json(response).into_response();
    extend_headers(http_response.headers_mut(), handle.take_response_headers());
    http_response
}

async fn bind(
    parts: &Parts,
    body: Body,
    config: &FileUploadsConfig,
) -> Result<Payload, BindError> {
    if parts.method == Method::GET || parts.method == Method::HEAD {
        let query = parts.uri.query().unwrap_or_default();
        return Ok(Payload::Request(graphql::Request::from_urlencoded_query(
            query.to_string(),
        )?));
    }

    let Some(mime) = content_type(parts) else {
        let bytes = body.collect().await?.to_bytes();
        return Ok(Payload::Request(graphql::Request::deserialize_from_bytes(
            &bytes,
        )?));
    };

    if mime.ty == MULTIPART && mime.subty == FORM_DATA {
        let boundary = mime
            .get_param(BOUNDARY)
            .ok_or(BindError::MissingBoundary)?
            .to_string();
        let form = FormData::from_multipart(
            body.into_data_stream(),
            boundary,
            config.spool_directory.as_deref(),
        )
        .await?;
        Ok(Payload::Form(form))
    } else if mime.ty == APPLICATION && mime.subty.as_str() == URLENCODED {
        let bytes = body.collect().await?.to_bytes();
        Ok(Payload::Form(FormData::from_urlencoded(&bytes)?))
    } else if mime.ty == APPLICATION && (mime.subty == JSON || mime.suffix == Some(JSON)) {
        let bytes = body.collect().await?.to_bytes();
        Ok(Payload::Request(graphql::Request::deserialize_from_bytes(
            &bytes,
        )?))
    } else {
        Err(BindError::UnsupportedContentType(mime.to_string()))
    }
}

fn content_type(parts: &Parts) -> Option<MediaType<'_>> {
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|header| header.to_str().ok())
        .and_then(|str| MediaType::parse(str).ok())
}

struct BoundRequest {
    query: Option<String>,
    operation_name: Option<String>,
    variables: Variables,
}

/// Turn the bound payload into the request to execute, running the upload
/// assembler when the form carries both `operations` and `map`.
///
/// The form is handed back so its files outlive the execution.
#[allow(clippy::result_large_err)]
fn into_execution_parts(
    payload: Payload,
    config: &FileUploadsConfig,
) -> Result<(BoundRequest, Option<FormData>), Response> {
    let form = match payload {
        Payload::Request(request) => {
            return Ok((
                BoundRequest {
                    query: request.query,
                    operation_name: request.operation_name,
                    variables: Variable::from_object(request.variables),
                },
                None,
            ));
        }
        Payload::Form(form) => form,
    };

    let operations = form
        .value(file_uploads::OPERATIONS_FIELD)
        .filter(|value| !value.is_empty());
    let map = form
        .value(file_uploads::MAP_FIELD)
        .filter(|value| !value.is_empty());
    if let (true, Some(operations), Some(map)) = (config.enabled, operations, map) {
        return match file_uploads::assemble(operations, map, &form) {
            Ok(assembled) => Ok((
                BoundRequest {
                    query: assembled.query,
                    operation_name: assembled.operation_name,
                    variables: assembled.variables,
                },
                Some(form),
            )),
            Err(err) => {
                tracing::debug!(error = %err, "could not assemble the multipart request");
                Err(error_response(StatusCode::OK, err.into()))
            }
        };
    }

    match graphql::Request::from_form(&form) {
        Ok(request) => Ok((
            BoundRequest {
                query: request.query,
                operation_name: request.operation_name,
                variables: Variable::from_object(request.variables),
            },
            Some(form),
        )),
        Err(err) => {
            let err = BindError::from(err);
            tracing::warn!(error = %err, "could not bind the GraphQL request");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                graphql::Error::builder()
                    .message(err.to_string())
                    .extension_code("INVALID_GRAPHQL_REQUEST")
                    .build(),
            ))
        }
    }
}

fn error_response(status: StatusCode, error: graphql::Error) -> Response {
    (status, Json(graphql::Response::builder().error(error).build())).into_response()
}

fn extend_headers(target: &mut HeaderMap, source: HeaderMap) {
    let mut current = None;
    for (name, value) in source {
        if let Some(name) = name {
            target.remove(&name);
            current = Some(name);
        }
        if let Some(name) = &current {
            target.append(name.clone(), value);
        }
    }
}
