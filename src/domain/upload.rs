//! Detection of the layer creation method from the fields of a submission.
//!
//! Multipart submissions are classified purely by the *set* of field names they carry:
//! after removing the optional fields, what is left must be exactly one of the
//! required field sets. JSON submissions are always view definitions.

use std::collections::BTreeSet;

pub const LAYER_NAME: &str = "layer-name";
pub const LAYER_DESCRIPTION: &str = "layer-description";
pub const LAYER_ATTRIBUTION: &str = "layer-attribution";
pub const LAYER_ATTRIBUTION_URL: &str = "layer-attribution-url";
pub const LAYER_PRIVATE: &str = "layer-private";
pub const ADDITIONAL_PROPERTY: &str = "additional-property";
pub const RECORD_NAME_FIELD: &str = "record-name-field";
pub const RECORD_KEY_FIELD: &str = "record-key-field";

pub const ARCHIVE: &str = "archive";
pub const GEOMETRY_FILE: &str = "shp";
pub const ATTRIBUTE_FILE: &str = "dbf";
pub const INDEX_FILE: &str = "shx";
pub const PROJECTION_FILE: &str = "prj";
pub const CODE_PAGE_FILE: &str = "cpg";

const ALWAYS_OPTIONAL: &[&str] = &[
    LAYER_DESCRIPTION,
    LAYER_ATTRIBUTION,
    LAYER_ATTRIBUTION_URL,
    LAYER_PRIVATE,
    ADDITIONAL_PROPERTY,
];

const ARCHIVE_REQUIRED: &[&str] = &[LAYER_NAME, ARCHIVE, RECORD_NAME_FIELD, RECORD_KEY_FIELD];

const DIRECT_REQUIRED: &[&str] = &[
    LAYER_NAME,
    GEOMETRY_FILE,
    ATTRIBUTE_FILE,
    INDEX_FILE,
    RECORD_NAME_FIELD,
    RECORD_KEY_FIELD,
    PROJECTION_FILE,
];

const DIRECT_OPTIONAL: &[&str] = &[CODE_PAGE_FILE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMethod {
    ViewDefinition,
    DirectUpload,
    ArchiveUpload,
}

fn field_set(fields: &[&str]) -> BTreeSet<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

/// Classifies a multipart submission by its field names.
pub fn classify<I, S>(submitted: I) -> crate::Result<UploadMethod>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let optional = field_set(ALWAYS_OPTIONAL)
        .union(&field_set(DIRECT_OPTIONAL))
        .cloned()
        .collect::<BTreeSet<_>>();

    let remainder: BTreeSet<String> = submitted
        .into_iter()
        .map(|f| f.as_ref().to_string())
        .filter(|f| !optional.contains(f))
        .collect();

    let candidates = [
        (UploadMethod::ArchiveUpload, field_set(ARCHIVE_REQUIRED)),
        (UploadMethod::DirectUpload, field_set(DIRECT_REQUIRED)),
    ];
    let mut matching = candidates
        .into_iter()
        .filter(|(_, required)| *required == remainder)
        .map(|(method, _)| method);

    match (matching.next(), matching.next()) {
        (Some(method), None) => Ok(method),
        _ => Err(crate::Error::NoUploadMethodDetected),
    }
}

/// Classifies a request by its content type, consulting the field names for multipart
/// submissions.
pub fn classify_content_type(content_type: &str) -> crate::Result<Option<UploadMethod>> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "application/json" => Ok(Some(UploadMethod::ViewDefinition)),
        "multipart/form-data" => Ok(None),
        _ => Err(crate::Error::UnsupportedContentType(content_type.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_fields() -> Vec<&'static str> {
        vec![LAYER_NAME, ARCHIVE, RECORD_NAME_FIELD, RECORD_KEY_FIELD]
    }

    fn direct_fields() -> Vec<&'static str> {
        vec![
            LAYER_NAME,
            GEOMETRY_FILE,
            ATTRIBUTE_FILE,
            INDEX_FILE,
            PROJECTION_FILE,
            RECORD_NAME_FIELD,
            RECORD_KEY_FIELD,
        ]
    }

    #[test]
    fn exact_required_sets_are_detected() {
        assert_eq!(classify(archive_fields()).unwrap(), UploadMethod::ArchiveUpload);
        assert_eq!(classify(direct_fields()).unwrap(), UploadMethod::DirectUpload);
    }

    #[test]
    fn optional_fields_do_not_change_the_outcome() {
        let mut fields = archive_fields();
        fields.extend([LAYER_DESCRIPTION, ADDITIONAL_PROPERTY, ADDITIONAL_PROPERTY]);
        assert_eq!(classify(fields).unwrap(), UploadMethod::ArchiveUpload);

        let mut fields = direct_fields();
        fields.extend([CODE_PAGE_FILE, LAYER_ATTRIBUTION, LAYER_PRIVATE]);
        assert_eq!(classify(fields).unwrap(), UploadMethod::DirectUpload);
    }

    #[test]
    fn field_order_is_irrelevant() {
        let mut fields = direct_fields();
        fields.reverse();
        assert_eq!(classify(fields).unwrap(), UploadMethod::DirectUpload);
    }

    #[test]
    fn mixed_or_incomplete_submissions_are_rejected() {
        let mut mixed = archive_fields();
        mixed.push(GEOMETRY_FILE);
        assert!(matches!(classify(mixed), Err(crate::Error::NoUploadMethodDetected)));

        let mut both = direct_fields();
        both.push(ARCHIVE);
        assert!(matches!(classify(both), Err(crate::Error::NoUploadMethodDetected)));

        let missing_projection: Vec<_> = direct_fields()
            .into_iter()
            .filter(|f| *f != PROJECTION_FILE)
            .collect();
        assert!(matches!(
            classify(missing_projection),
            Err(crate::Error::NoUploadMethodDetected)
        ));

        let unknown = vec![LAYER_NAME, "view-configuration"];
        assert!(matches!(classify(unknown), Err(crate::Error::NoUploadMethodDetected)));

        assert!(matches!(
            classify(Vec::<String>::new()),
            Err(crate::Error::NoUploadMethodDetected)
        ));
    }

    #[test]
    fn content_types_select_the_parsing_path() {
        assert_eq!(
            classify_content_type("application/json; charset=utf-8").unwrap(),
            Some(UploadMethod::ViewDefinition)
        );
        assert_eq!(
            classify_content_type("multipart/form-data; boundary=xyz").unwrap(),
            None
        );
        assert!(matches!(
            classify_content_type("text/plain"),
            Err(crate::Error::UnsupportedContentType(_))
        ));
    }
}
