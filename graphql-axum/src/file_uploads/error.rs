use thiserror::Error;

use crate::graphql;

/// The `operations` or `map` field, or a path inside `map`, is malformed.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid operations string ({0})")]
    InvalidOperations(#[source] serde_json::Error),

    #[error("invalid map string ({0})")]
    InvalidMap(#[source] serde_json::Error),

    #[error("Empty path found inside 'map' field.")]
    EmptyPath,

    #[error("Invalid path '{0}' found inside 'map' field, it should start with 'variables.'.")]
    InvalidPathRoot(String),

    #[error("Invalid path '{0}' found inside 'map' field, missing name of variable.")]
    MissingVariableName(String),

    #[error("Invalid path '{0}' found inside 'map' field, index is out of range.")]
    InvalidIndex(String),

    #[error("Batched requests are not supported for file uploads.")]
    BatchRequestsNotSupported,
}

/// The `map` field references a form field that was not submitted.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Missing field '{0}' in the request, it is referenced inside 'map' field.")]
    MissingField(String),
}

/// A path inside `map` does not fit the shape of the submitted variables.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("Invalid path '{path}' found inside 'map' field, no value at '{segment}'.")]
    ValueNotFound { path: String, segment: String },

    #[error("Invalid path '{path}' found inside 'map' field, expected {expected} at '{segment}' but found {found}.")]
    ShapeMismatch {
        path: String,
        segment: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid path '{path}' found inside 'map' field, index {index} is out of bounds for a list of length {len}.")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}

/// Errors that may occur while assembling a multipart request
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

impl AssemblyError {
    fn summary(&self) -> Option<&'static str> {
        match self {
            // these already name the field they come from
            AssemblyError::Format(
                FormatError::InvalidOperations(_) | FormatError::InvalidMap(_),
            ) => None,
            AssemblyError::Format(_) | AssemblyError::Navigation(_) => {
                Some("could not set variable")
            }
            AssemblyError::Upload(_) => Some("invalid file upload"),
        }
    }
}

impl From<AssemblyError> for graphql::Error {
    fn from(value: AssemblyError) -> Self {
        let message = match value.summary() {
            Some(summary) => format!("{summary} ({value})"),
            None => value.to_string(),
        };
        Self::builder()
            .message(message)
            .extension_code(match &value {
                AssemblyError::Format(_) => "FILE_UPLOADS_INVALID_FORMAT",
                AssemblyError::Upload(_) => "FILE_UPLOADS_MISSING_FIELD",
                AssemblyError::Navigation(_) => "FILE_UPLOADS_INVALID_PATH",
            })
            .build()
    }
}
