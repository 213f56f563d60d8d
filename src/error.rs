//! Crate-wide error type.
//!
//! Every fallible operation in the ingestion pipeline and the query composers returns
//! [`Error`]. The HTTP layer maps each variant onto a problem response in
//! `transport::http::problem`.

/// Postgres SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";
/// Postgres SQLSTATE for `duplicate_table` (also raised for existing views).
const DUPLICATE_TABLE: &str = "42P07";
/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --- input validation ---
    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),
    #[error("the request did not match exactly one layer creation method")]
    NoUploadMethodDetected,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),
    #[error("invalid multipart form: {0}")]
    InvalidForm(String),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("unsupported spatial relation '{0}'")]
    UnsupportedSpatialRelation(String),

    // --- shapefile decoding ---
    #[error("the archive does not contain a '.{0}' file")]
    ArchiveMissingComponent(&'static str),
    #[error("unable to read archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("unable to decode shapefile: {0}")]
    Shapefile(#[from] shapefile::Error),
    #[error("unable to decode shapefile: {0}")]
    Decode(String),
    #[error("record {record} has no attribute '{attribute}'")]
    MissingRecordAttribute { record: usize, attribute: String },

    // --- resolution ---
    #[error("the upload did not contain a projection file")]
    NoProjectionProvided,
    #[error("no EPSG code could be derived from the projection: {0}")]
    NoEpsgCodeFound(String),
    #[error("unknown layer")]
    UnknownLayer,
    #[error("unknown layer '{0}' referenced as filter layer")]
    UnknownOtherLayer(String),
    #[error("none of the keys resolve into objects")]
    UnknownObject,

    // --- storage ---
    #[error("the referenced relation does not exist")]
    UnknownRelation,
    #[error("the relation for this layer already exists")]
    RelationExists,
    #[error("a layer with this name already exists")]
    LayerExists,
    #[error("unknown named query '{0}'")]
    UnknownQuery(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());
        match code.as_deref() {
            Some(UNDEFINED_TABLE) => Error::UnknownRelation,
            Some(DUPLICATE_TABLE) => Error::RelationExists,
            Some(UNIQUE_VIOLATION) => Error::LayerExists,
            _ => Error::Database(err),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(anyhow::anyhow!("background task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_sqlx_errors_stay_opaque() {
        let err = Error::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn messages_name_the_offending_field() {
        assert_eq!(
            Error::MissingField("geometry").to_string(),
            "missing required field: geometry"
        );
        assert_eq!(
            Error::ArchiveMissingComponent("dbf").to_string(),
            "the archive does not contain a '.dbf' file"
        );
    }
}
