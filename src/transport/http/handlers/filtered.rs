//! Layer contents filtered by spatial relations to objects of other layers.
//!
//! Both handlers answer `204 No Content` when nothing matches.

use crate::domain::filter::SpatialFilter;
use crate::domain::model::Object;
use crate::transport::http::handlers::common::{repeated_param, single_param};
use crate::transport::http::problem::Problem;
use crate::transport::http::types::{AppState, FilterGroups, FilterQuery, FilterRequest, PrivateLayerAccess};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

async fn respond(
    state: &AppState,
    layer: &str,
    groups: &[SpatialFilter],
    private: bool,
) -> crate::Result<Response> {
    let objects = state.layers.filtered_contents(layer, groups, private).await?;
    if objects.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(objects).into_response())
}

#[utoipa::path(
    get,
    path = "/content/{layer}/filtered",
    params(
        ("layer" = String, Path, description = "Layer id (UUID) or URL key"),
        ("relation" = String, Query, description = "within, overlaps or contains"),
        ("other_layer" = String, Query, description = "Id or URL key of the reference layer"),
        ("key" = Vec<String>, Query, description = "Keys of reference objects (repeatable)")
    ),
    responses(
        (status = 200, description = "Matching objects", body = Vec<Object>),
        (status = 204, description = "No object matches the filter"),
        (status = 400, description = "Missing or unsupported filter parameters", body = Problem),
        (status = 404, description = "Unknown layer or reference layer", body = Problem)
    )
)]
pub async fn filtered_contents_query_handler(
    State(state): State<AppState>,
    PrivateLayerAccess(private): PrivateLayerAccess,
    Path(layer): Path<String>,
    RawQuery(raw): RawQuery,
) -> crate::Result<Response> {
    let query = FilterQuery {
        relation: single_param(raw.as_deref(), "relation"),
        other_layer: single_param(raw.as_deref(), "other_layer"),
        keys: repeated_param(raw.as_deref(), "key"),
    };
    let group = query.into_group()?;
    respond(&state, &layer, &[group], private).await
}

#[utoipa::path(
    post,
    path = "/content/{layer}/filtered",
    params(("layer" = String, Path, description = "Layer id (UUID) or URL key")),
    request_body = FilterGroups,
    responses(
        (status = 200, description = "Objects matching every filter group", body = Vec<Object>),
        (status = 204, description = "No object matches the filter"),
        (status = 400, description = "Malformed filter body", body = Problem),
        (status = 404, description = "Unknown layer or reference layer", body = Problem)
    )
)]
pub async fn filtered_contents_body_handler(
    State(state): State<AppState>,
    PrivateLayerAccess(private): PrivateLayerAccess,
    Path(layer): Path<String>,
    body: Result<Json<FilterRequest>, JsonRejection>,
) -> crate::Result<Response> {
    let Json(request) = body?;
    respond(&state, &layer, &request.into_groups(), private).await
}
