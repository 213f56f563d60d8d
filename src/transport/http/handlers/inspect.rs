use crate::domain::shapefile::ShapefileInformation;
use crate::domain::upload;
use crate::transport::http::handlers::common::SubmittedForm;
use crate::transport::http::problem::Problem;
use crate::transport::http::types::AppState;
use axum::extract::{Multipart, State};
use axum::Json;

/// Decodes an uploaded archive and reports what an upload of it would contain.
#[utoipa::path(
    post,
    path = "/inspect",
    request_body(content_type = "multipart/form-data", description = "Zip archive in the `archive` field"),
    responses(
        (status = 200, description = "Feature count, attribute coverage and projection", body = ShapefileInformation),
        (status = 400, description = "Missing or unreadable archive", body = Problem)
    )
)]
pub async fn inspect_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> crate::Result<Json<ShapefileInformation>> {
    let mut form = SubmittedForm::collect(multipart).await?;
    let archive = form.require_file(upload::ARCHIVE)?;
    Ok(Json(state.layers.inspect(archive).await?))
}
