//! Serves a GraphQL executor over axum.
//!
//! On top of plain query execution this adds the
//! [GraphQL multipart request](https://github.com/jaydenseric/graphql-multipart-request-spec)
//! convention for file uploads, and a chain of context providers that build
//! the per-request [`Context`] handed to the executor.

#![warn(unreachable_pub)]

pub mod json_ext;

mod configuration;
mod context;
mod executable;
pub mod execution;
pub mod file_uploads;
pub mod graphql;
mod handler;
mod upload;
mod variables;

pub use configuration::Configuration;
pub use configuration::ConfigurationError;
pub use configuration::Server;
pub use configuration::generate_config_schema;
pub use context::Context;
pub use context::ContextProviderFn;
pub use context::ContextProviders;
pub use context::RequestHandle;
pub use executable::Executable;
pub use execution::Executor;
pub use execution::executor_fn;
pub use handler::GraphQLApp;
pub use upload::Upload;
pub use variables::Variable;
pub use variables::Variables;
