use std::fmt;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::ser::SerializeStruct;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

/// A file submitted as part of a multipart request.
///
/// The content is spooled to a temporary file while the request body is read,
/// so it is never held in memory as a whole. Clones share the same file: an
/// upload mapped to several variables shows up as the same handle at every
/// position. The file is removed when the last clone is dropped, which
/// happens once the request has been executed.
#[derive(Clone)]
pub struct Upload {
    inner: Arc<UploadInner>,
}

struct UploadInner {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    size: u64,
    file: NamedTempFile,
}

impl Upload {
    /// Spool a multipart field into a temporary file.
    pub(crate) async fn spool(
        name: String,
        mut field: multer::Field<'static>,
        directory: Option<&Path>,
    ) -> Result<Self, SpoolError> {
        let filename = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(|mime| mime.to_string());

        let file = new_temp_file(directory)?;
        let mut writer = tokio::fs::File::from_std(file.as_file().try_clone()?);
        let mut size = 0;
        while let Some(chunk) = field.chunk().await? {
            size += chunk.len() as u64;
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;

        tracing::trace!(%name, ?filename, size, "spooled uploaded file");

        Ok(Self {
            inner: Arc::new(UploadInner {
                name,
                filename,
                content_type,
                size,
                file,
            }),
        })
    }

    /// Create an upload from bytes already in memory.
    pub fn from_bytes(
        name: impl Into<String>,
        filename: Option<&str>,
        content_type: Option<&str>,
        content: &[u8],
    ) -> io::Result<Self> {
        let mut file = new_temp_file(None)?;
        file.write_all(content)?;
        file.flush()?;
        Ok(Self {
            inner: Arc::new(UploadInner {
                name: name.into(),
                filename: filename.map(str::to_owned),
                content_type: content_type.map(str::to_owned),
                size: content.len() as u64,
                file,
            }),
        })
    }

    /// Name of the multipart form field the file was sent in.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// File name as sent by the client, if any.
    pub fn filename(&self) -> Option<&str> {
        self.inner.filename.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.inner.content_type.as_deref()
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.inner.size
    }

    /// Location of the spooled content. Only valid while a handle is alive.
    pub fn path(&self) -> &Path {
        self.inner.file.path()
    }

    /// Open the content for reading, from the start.
    pub fn open(&self) -> io::Result<std::fs::File> {
        self.inner.file.reopen()
    }

    /// Read the whole content.
    pub async fn bytes(&self) -> io::Result<Bytes> {
        tokio::fs::read(self.path()).await.map(Bytes::from)
    }

    /// Whether both handles refer to the same uploaded file.
    pub fn ptr_eq(&self, other: &Upload) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn new_temp_file(directory: Option<&Path>) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("graphql-upload-");
    match directory {
        Some(directory) => builder.tempfile_in(directory),
        None => builder.tempfile(),
    }
}

impl PartialEq for Upload {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.inner.name)
            .field("filename", &self.inner.filename)
            .field("content_type", &self.inner.content_type)
            .field("size", &self.inner.size)
            .finish()
    }
}

impl Serialize for Upload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut upload = serializer.serialize_struct("Upload", 4)?;
        upload.serialize_field("name", &self.inner.name)?;
        upload.serialize_field("filename", &self.inner.filename)?;
        upload.serialize_field("contentType", &self.inner.content_type)?;
        upload.serialize_field("size", &self.inner.size)?;
        upload.end()
    }
}

/// Errors while spooling a file part to disk.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SpoolError {
    #[error("could not read file part: {0}")]
    Multipart(#[from] multer::Error),

    #[error("could not store file part: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[tokio::test]
    async fn from_bytes_exposes_metadata_and_content() {
        let upload =
            Upload::from_bytes("0", Some("a.txt"), Some("text/plain"), b"hello world").unwrap();
        assert_eq!(upload.name(), "0");
        assert_eq!(upload.filename(), Some("a.txt"));
        assert_eq!(upload.content_type(), Some("text/plain"));
        assert_eq!(upload.size(), 11);
        assert_eq!(upload.bytes().await.unwrap(), Bytes::from_static(b"hello world"));

        let mut content = String::new();
        upload.open().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello world");
    }

    #[test]
    fn clones_share_identity() {
        let upload = Upload::from_bytes("file", None, None, b"x").unwrap();
        let other = Upload::from_bytes("file", None, None, b"x").unwrap();
        assert!(upload.ptr_eq(&upload.clone()));
        assert_eq!(upload, upload.clone());
        assert_ne!(upload, other);
    }

    #[test]
    fn file_is_removed_with_last_handle() {
        let upload = Upload::from_bytes("file", None, None, b"x").unwrap();
        let clone = upload.clone();
        let path = upload.path().to_path_buf();
        drop(upload);
        assert!(path.exists());
        drop(clone);
        assert!(!path.exists());
    }
}
