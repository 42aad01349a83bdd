//! Support for the [GraphQL multipart request](https://github.com/jaydenseric/graphql-multipart-request-spec)
//! convention.
//!
//! A client sends an `operations` field holding the usual JSON request, with
//! `null` placeholders in its variables, a `map` field telling which form
//! field goes at which variable path, and the files themselves. [`assemble`]
//! puts the pieces back together.

mod config;
mod error;
mod form;
mod map_field;
mod path;

pub use self::config::FileUploadsConfig;
pub use self::error::AssemblyError;
pub use self::error::FormatError;
pub use self::error::NavigationError;
pub use self::error::UploadError;
pub use self::form::FormAccessor;
pub use self::form::FormData;
pub use self::map_field::Assignment;
pub use self::map_field::Assignments;
pub use self::map_field::MapField;
pub use self::path::PathSegment;
pub use self::path::VariablePath;
pub use self::path::place;
use crate::graphql;
use crate::variables::Variable;
use crate::variables::Variables;

type Result<T> = std::result::Result<T, AssemblyError>;

/// The name of the multipart field holding the JSON encoded request.
pub const OPERATIONS_FIELD: &str = "operations";
/// The name of the multipart field holding the upload map.
pub const MAP_FIELD: &str = "map";

/// A request rebuilt from a multipart submission, ready for execution.
#[derive(Debug, Default, PartialEq)]
pub struct AssembledRequest {
    pub query: Option<String>,
    pub operation_name: Option<String>,
    pub variables: Variables,
}

/// Rebuild the request from the `operations` and `map` fields, injecting the
/// referenced form values and files into the variables.
///
/// Nothing is returned on failure, so a partially patched variables object is
/// never observable.
pub fn assemble(
    operations: &str,
    map: &str,
    form: &impl FormAccessor,
) -> Result<AssembledRequest> {
    let operations: graphql::Request =
        serde_json::from_str(operations).map_err(FormatError::InvalidOperations)?;
    let assignments = MapField::parse(map)?.resolve(form)?;

    let mut variables = Variable::from_object(operations.variables);

    for assignment in assignments.plain {
        for path in &assignment.paths {
            place(
                Variable::from(assignment.value.as_str()),
                &mut variables,
                path,
            )?;
        }
    }

    for assignment in assignments.files {
        tracing::debug!(
            field = %assignment.field,
            paths = assignment.paths.len(),
            "injecting uploaded file into variables"
        );
        for path in &assignment.paths {
            place(
                Variable::Upload(assignment.value.clone()),
                &mut variables,
                path,
            )?;
        }
    }

    Ok(AssembledRequest {
        query: operations.query,
        operation_name: operations.operation_name,
        variables,
    })
}
