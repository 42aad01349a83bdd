use std::path::PathBuf;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Configuration for File Uploads
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct FileUploadsConfig {
    /// Whether multipart requests carrying `operations` and `map` get their
    /// files injected into the variables.
    pub enabled: bool,

    /// Directory where uploaded files are spooled while the request runs.
    /// Defaults to the system temporary directory.
    pub spool_directory: Option<PathBuf>,
}

impl Default for FileUploadsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spool_directory: None,
        }
    }
}
