use indexmap::IndexMap;

use super::FormAccessor;
use super::error::FormatError;
use super::error::UploadError;
use super::path::VariablePath;
use crate::upload::Upload;

/// The `map` field as sent by the client: form field name to variable paths.
pub(crate) type MapFieldRaw = IndexMap<String, Vec<String>>;

/// The parsed `map` field.
///
/// Keeps the order of the client's JSON so errors are reported for the first
/// offending entry.
#[derive(Debug, Default)]
pub struct MapField {
    per_field: IndexMap<String, Vec<VariablePath>>,
}

/// A form field scheduled for placement at one or more variable paths.
#[derive(Debug)]
pub struct Assignment<T> {
    pub field: String,
    pub value: T,
    pub paths: Vec<VariablePath>,
}

/// The map entries, split by what the referenced form field turned out to be.
#[derive(Debug, Default)]
pub struct Assignments {
    pub plain: Vec<Assignment<String>>,
    pub files: Vec<Assignment<Upload>>,
}

impl MapField {
    /// Parse the client's `map` field. A JSON `null` maps nothing.
    pub fn parse(map: &str) -> Result<Self, FormatError> {
        let raw = serde_json::from_str::<Option<MapFieldRaw>>(map)
            .map_err(FormatError::InvalidMap)?
            .unwrap_or_default();
        Self::new(raw)
    }

    pub(crate) fn new(map_field: MapFieldRaw) -> Result<Self, FormatError> {
        let per_field = map_field
            .into_iter()
            .map(|(field, paths)| {
                let paths = paths
                    .iter()
                    .map(|path| VariablePath::parse(path))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((field, paths))
            })
            .collect::<Result<_, FormatError>>()?;
        Ok(Self { per_field })
    }

    /// Look every referenced field up in the submitted form.
    ///
    /// A text value wins over a file part of the same name.
    pub fn resolve(self, form: &impl FormAccessor) -> Result<Assignments, UploadError> {
        let mut assignments = Assignments::default();
        for (field, paths) in self.per_field {
            if let Some(value) = form.value(&field) {
                assignments.plain.push(Assignment {
                    value: value.to_owned(),
                    field,
                    paths,
                });
            } else if let Some(upload) = form.file(&field) {
                assignments.files.push(Assignment {
                    value: upload,
                    field,
                    paths,
                });
            } else {
                return Err(UploadError::MissingField(field));
            }
        }
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_uploads::FormData;

    #[test]
    fn keeps_map_order_and_paths() {
        let mut form = FormData::default();
        form.insert_file("0", Upload::from_bytes("0", Some("a.txt"), None, b"a").unwrap());
        form.insert_file("1", Upload::from_bytes("1", Some("b.txt"), None, b"b").unwrap());

        let assignments = MapField::parse(
            r#"{"1": ["variables.files.1"], "0": ["variables.files.0", "variables.file"]}"#,
        )
        .unwrap()
        .resolve(&form)
        .unwrap();
        let fields: Vec<_> = assignments
            .files
            .iter()
            .map(|assignment| assignment.field.as_str())
            .collect();
        assert_eq!(fields, vec!["1", "0"]);
        assert_eq!(assignments.files[0].paths.len(), 1);
        assert_eq!(assignments.files[1].paths.len(), 2);
    }

    #[test]
    fn null_map_assigns_nothing() {
        let mut form = FormData::default();
        form.insert_file("0", Upload::from_bytes("0", None, None, b"a").unwrap());

        let assignments = MapField::parse("null").unwrap().resolve(&form).unwrap();
        assert!(assignments.plain.is_empty());
        assert!(assignments.files.is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            MapField::parse(r#"{"0": ["variables.file"]"#),
            Err(FormatError::InvalidMap(_))
        ));
        assert!(matches!(
            MapField::parse(r#"{"0": "variables.file"}"#),
            Err(FormatError::InvalidMap(_))
        ));
        assert!(matches!(
            MapField::parse(r#"["variables.file"]"#),
            Err(FormatError::InvalidMap(_))
        ));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(matches!(
            MapField::parse(r#"{"0": ["variables.file", "file"]}"#),
            Err(FormatError::InvalidPathRoot(path)) if path == "file"
        ));
        assert!(matches!(
            MapField::parse(r#"{"0": ["0.variables.file"]}"#),
            Err(FormatError::BatchRequestsNotSupported)
        ));
    }

    #[test]
    fn classifies_plain_values_and_files() {
        let mut form = FormData::default();
        form.insert_value("value", "42");
        form.insert_file("file", Upload::from_bytes("file", Some("a.txt"), None, b"a").unwrap());

        let map = MapField::parse(
            r#"{"file": ["variables.file", "variables.copy"], "value": ["variables.value"]}"#,
        )
        .unwrap();
        let assignments = map.resolve(&form).unwrap();

        assert_eq!(assignments.plain.len(), 1);
        assert_eq!(assignments.plain[0].field, "value");
        assert_eq!(assignments.plain[0].value, "42");
        assert_eq!(assignments.files.len(), 1);
        assert_eq!(assignments.files[0].field, "file");
        assert_eq!(assignments.files[0].value.filename(), Some("a.txt"));
        assert_eq!(assignments.files[0].paths.len(), 2);
    }

    #[test]
    fn text_value_wins_over_file() {
        let mut form = FormData::default();
        form.insert_value("0", "text");
        form.insert_file("0", Upload::from_bytes("0", None, None, b"a").unwrap());

        let assignments = MapField::parse(r#"{"0": ["variables.file"]}"#)
            .unwrap()
            .resolve(&form)
            .unwrap();
        assert_eq!(assignments.plain.len(), 1);
        assert!(assignments.files.is_empty());
    }

    #[test]
    fn missing_field_is_an_upload_error() {
        let form = FormData::default();
        let error = MapField::parse(r#"{"0": ["variables.file"]}"#)
            .unwrap()
            .resolve(&form)
            .unwrap_err();
        assert!(matches!(error, UploadError::MissingField(field) if field == "0"));
    }
}
