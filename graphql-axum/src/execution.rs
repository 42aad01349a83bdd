//! The seam between the HTTP adapter and the GraphQL engine.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tower::BoxError;

use crate::context::Context;
use crate::graphql;
use crate::variables::Variables;

/// A GraphQL request, ready to be executed.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct Request {
    pub query: Option<String>,
    pub operation_name: Option<String>,
    /// Variables, with uploaded files in place.
    pub variables: Variables,
    pub context: Context,
}

#[buildstructor::buildstructor]
impl Request {
    #[builder(visibility = "pub")]
    fn new(
        query: Option<String>,
        operation_name: Option<String>,
        variables: Option<Variables>,
        context: Option<Context>,
    ) -> Request {
        Request {
            query,
            operation_name,
            variables: variables.unwrap_or_default(),
            context: context.unwrap_or_default(),
        }
    }
}

/// Executes GraphQL requests.
///
/// The schema, validation and resolvers live behind this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    async fn execute(&self, request: Request) -> Result<graphql::Response, BoxError>;
}

#[async_trait]
impl<T> Executor for Arc<T>
where
    T: Executor + ?Sized,
{
    async fn execute(&self, request: Request) -> Result<graphql::Response, BoxError> {
        (**self).execute(request).await
    }
}

/// An [`Executor`] backed by an async function.
pub struct ExecutorFn<F>(F);

/// Build an [`Executor`] from an async function.
pub fn executor_fn<F, Fut>(f: F) -> ExecutorFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<graphql::Response, BoxError>> + Send + 'static,
{
    ExecutorFn(f)
}

#[async_trait]
impl<F, Fut> Executor for ExecutorFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<graphql::Response, BoxError>> + Send + 'static,
{
    async fn execute(&self, request: Request) -> Result<graphql::Response, BoxError> {
        (self.0)(request).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json as bjson;

    use super::*;
    use crate::variables::Variable;

    #[tokio::test]
    async fn executor_fn_runs_the_closure() {
        let executor = executor_fn(|request: Request| async move {
            Ok(graphql::Response::builder()
                .data(bjson!({ "query": request.query.unwrap_or_default() }))
                .build())
        });

        let response = executor
            .execute(Request::builder().query("{ hello }").build())
            .await
            .unwrap();
        assert_eq!(response.data, Some(bjson!({ "query": "{ hello }" })));
    }

    #[tokio::test]
    async fn mock_executor_sees_variables() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .withf(|request| request.variables.get("id") == Some(&Variable::from("1")))
            .times(1)
            .returning(|_| Ok(graphql::Response::default()));

        let mut variables = Variables::new();
        variables.insert("id".to_string(), Variable::from("1"));
        let response = Arc::new(executor)
            .execute(Request::builder().variables(variables).build())
            .await
            .unwrap();
        assert!(response.errors.is_empty());
    }
}
