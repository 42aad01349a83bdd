use std::collections::HashMap;
use std::path::Path;

use futures::Stream;

use crate::upload::SpoolError;
use crate::upload::Upload;

/// Read access to the fields of a submitted form.
pub trait FormAccessor {
    /// The text value of a field, if it was sent as a plain value.
    fn value(&self, name: &str) -> Option<&str>;

    /// The file sent under `name`, if any.
    fn file(&self, name: &str) -> Option<Upload>;
}

/// Fields of a urlencoded or multipart form.
///
/// When a name is repeated, the first occurrence wins.
#[derive(Clone, Debug, Default)]
pub struct FormData {
    values: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl FormData {
    pub fn insert_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_insert_with(|| value.into());
    }

    pub fn insert_file(&mut self, name: impl Into<String>, upload: Upload) {
        self.files.entry(name.into()).or_insert(upload);
    }

    pub(crate) fn from_urlencoded(input: &[u8]) -> Result<Self, serde_urlencoded::de::Error> {
        let mut form = Self::default();
        for (name, value) in serde_urlencoded::from_bytes::<Vec<(String, String)>>(input)? {
            form.insert_value(name, value);
        }
        Ok(form)
    }

    /// Read a `multipart/form-data` body.
    ///
    /// Parts with a file name are spooled to temporary files in `spool_directory`
    /// (the system temporary directory when `None`); other parts are read as text.
    pub(crate) async fn from_multipart<S, O, E>(
        stream: S,
        boundary: String,
        spool_directory: Option<&Path>,
    ) -> Result<Self, SpoolError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<bytes::Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let mut multipart = multer::Multipart::new(stream, boundary);
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                tracing::debug!("skipping multipart field without a name");
                continue;
            };
            if field.file_name().is_some() {
                let upload = Upload::spool(name.clone(), field, spool_directory).await?;
                form.insert_file(name, upload);
            } else {
                let text = field.text().await?;
                form.insert_value(name, text);
            }
        }
        Ok(form)
    }
}

impl FormAccessor for FormData {
    fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn file(&self, name: &str) -> Option<Upload> {
        self.files.get(name).cloned()
    }
}
