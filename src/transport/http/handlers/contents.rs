use crate::domain::model::{AttributedContents, Object};
use crate::transport::http::problem::Problem;
use crate::transport::http::types::{AppState, PrivateLayerAccess};
use axum::extract::{Path, State};
use axum::Json;

#[utoipa::path(
    get,
    path = "/content/{layer}",
    params(("layer" = String, Path, description = "Layer id (UUID) or URL key")),
    responses(
        (status = 200, description = "Every object of the layer", body = Vec<Object>),
        (status = 404, description = "Unknown layer", body = Problem)
    )
)]
pub async fn layer_contents_handler(
    State(state): State<AppState>,
    PrivateLayerAccess(private): PrivateLayerAccess,
    Path(layer): Path<String>,
) -> crate::Result<Json<Vec<Object>>> {
    Ok(Json(state.layers.contents(&layer, private).await?))
}

#[utoipa::path(
    get,
    path = "/v2/content/{layer}",
    params(("layer" = String, Path, description = "Layer id (UUID) or URL key")),
    responses(
        (status = 200, description = "Layer objects with attribution", body = AttributedContents),
        (status = 404, description = "Unknown layer", body = Problem)
    )
)]
pub async fn attributed_contents_handler(
    State(state): State<AppState>,
    PrivateLayerAccess(private): PrivateLayerAccess,
    Path(layer): Path<String>,
) -> crate::Result<Json<AttributedContents>> {
    Ok(Json(state.layers.attributed_contents(&layer, private).await?))
}
