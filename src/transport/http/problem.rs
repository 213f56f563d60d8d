//! Problem details (RFC 9457) for every error leaving the HTTP layer.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::Error;

#[derive(Serialize, Debug, ToSchema)]
pub struct Problem {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub status: u16,
    pub title: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Problem {
    pub fn new(status: StatusCode, title: &str, detail: impl Into<String>) -> Self {
        Self {
            problem_type: type_uri(status).to_string(),
            status: status.as_u16(),
            title: title.to_string(),
            detail: detail.into(),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(self),
        )
            .into_response()
    }
}

fn type_uri(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "https://www.rfc-editor.org/rfc/rfc9110#section-15.5.1",
        StatusCode::NOT_FOUND => "https://www.rfc-editor.org/rfc/rfc9110#section-15.5.5",
        StatusCode::CONFLICT => "https://www.rfc-editor.org/rfc/rfc9110#section-15.5.10",
        StatusCode::PAYLOAD_TOO_LARGE => "https://www.rfc-editor.org/rfc/rfc9110#section-15.5.14",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "https://www.rfc-editor.org/rfc/rfc9110#section-15.5.16",
        _ => "https://www.rfc-editor.org/rfc/rfc9110#section-15.6.1",
    }
}

/// Status code and title for an error.
pub fn classify(err: &Error) -> (StatusCode, &'static str) {
    match err {
        Error::UnsupportedContentType(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Content Type"),
        Error::NoUploadMethodDetected => (StatusCode::BAD_REQUEST, "No Upload Method Detected"),
        Error::MissingField(_) => (StatusCode::BAD_REQUEST, "Missing Field"),
        Error::MissingParameter(_) => (StatusCode::BAD_REQUEST, "Missing Parameter"),
        Error::InvalidIdentifier(_) => (StatusCode::BAD_REQUEST, "Invalid Identifier"),
        Error::InvalidForm(_) => (StatusCode::BAD_REQUEST, "Invalid Form"),
        Error::InvalidBody(_) => (StatusCode::BAD_REQUEST, "Invalid Request Body"),
        Error::UnsupportedSpatialRelation(_) => (StatusCode::BAD_REQUEST, "Unsupported Spatial Relation"),
        Error::ArchiveMissingComponent(_) => (StatusCode::BAD_REQUEST, "Incomplete Archive"),
        Error::Archive(_) => (StatusCode::BAD_REQUEST, "Invalid Archive"),
        Error::Shapefile(_) | Error::Decode(_) => (StatusCode::BAD_REQUEST, "Invalid Shapefile"),
        Error::MissingRecordAttribute { .. } => (StatusCode::BAD_REQUEST, "Missing Record Attribute"),
        Error::NoProjectionProvided => (StatusCode::BAD_REQUEST, "No Projection Provided"),
        Error::NoEpsgCodeFound(_) => (StatusCode::BAD_REQUEST, "No EPSG Code Found"),
        Error::UnknownLayer => (StatusCode::NOT_FOUND, "Unknown Layer"),
        Error::UnknownOtherLayer(_) => (StatusCode::NOT_FOUND, "Unknown Filter Layer"),
        Error::UnknownObject => (StatusCode::NOT_FOUND, "Unknown Object"),
        Error::UnknownRelation => (StatusCode::NOT_FOUND, "Unknown Relation"),
        Error::RelationExists => (StatusCode::CONFLICT, "Relation Exists"),
        Error::LayerExists => (StatusCode::CONFLICT, "Layer Exists"),
        Error::UnknownQuery(_) | Error::Database(_) | Error::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

impl From<&Error> for Problem {
    fn from(err: &Error) -> Self {
        let (status, title) = classify(err);
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
            return Problem::new(status, title, "the request could not be completed");
        }
        let problem = Problem::new(status, title, err.to_string());
        match err {
            Error::MissingRecordAttribute { attribute, .. } => {
                problem.with_errors(vec![format!("attribute '{}' is required", attribute)])
            }
            _ => problem,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        Problem::from(&self).into_response()
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidBody(rejection.body_text())
    }
}

impl From<MultipartError> for Error {
    fn from(err: MultipartError) -> Self {
        Error::InvalidForm(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_family() {
        assert_eq!(classify(&Error::NoUploadMethodDetected).0, StatusCode::BAD_REQUEST);
        assert_eq!(classify(&Error::UnknownRelation).0, StatusCode::NOT_FOUND);
        assert_eq!(classify(&Error::UnknownOtherLayer("x".into())).0, StatusCode::NOT_FOUND);
        assert_eq!(classify(&Error::RelationExists).0, StatusCode::CONFLICT);
        assert_eq!(classify(&Error::LayerExists).0, StatusCode::CONFLICT);
        assert_eq!(
            classify(&Error::UnsupportedContentType("text/plain".into())).0,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            classify(&Error::Database(sqlx::Error::PoolTimedOut)).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_errors_hide_their_cause() {
        let problem = Problem::from(&Error::Internal(anyhow::anyhow!("password=hunter2")));
        assert_eq!(problem.status, 500);
        assert!(!problem.detail.contains("hunter2"));
    }

    #[test]
    fn client_errors_explain_themselves() {
        let problem = Problem::from(&Error::MissingField("geometry"));
        let json = serde_json::to_value(&problem).unwrap();
        assert_eq!(json["status"], 400);
        assert_eq!(json["detail"], "missing required field: geometry");
        assert!(json["type"].as_str().unwrap().ends_with("15.5.1"));
        assert!(json.get("errors").is_none());
    }
}
