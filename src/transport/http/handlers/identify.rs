use crate::domain::identify::IdentifiedObjects;
use crate::transport::http::handlers::common::repeated_param;
use crate::transport::http::problem::Problem;
use crate::transport::http::types::{AppState, PrivateLayerAccess};
use axum::extract::{RawQuery, State};
use axum::Json;

/// Finds the objects carrying the given keys in any visible layer.
///
/// The response maps layer ids to the objects found in that layer, keyed by object key.
#[utoipa::path(
    get,
    path = "/identify",
    params(("key" = Vec<String>, Query, description = "Object keys (repeatable)")),
    responses(
        (status = 200, description = "layer id -> key -> object", body = Object),
        (status = 400, description = "No key given", body = Problem),
        (status = 404, description = "None of the keys resolve into objects", body = Problem)
    )
)]
pub async fn identify_handler(
    State(state): State<AppState>,
    PrivateLayerAccess(private): PrivateLayerAccess,
    RawQuery(raw): RawQuery,
) -> crate::Result<Json<IdentifiedObjects>> {
    let keys = repeated_param(raw.as_deref(), "key");
    if keys.is_empty() {
        return Err(crate::Error::MissingParameter("key"));
    }
    Ok(Json(state.layers.identify(keys, private).await?))
}
