use crate::domain::model::Layer;
use crate::transport::http::problem::Problem;
use crate::transport::http::types::{AppState, PrivateLayerAccess};
use axum::extract::{Path, State};
use axum::Json;

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "All layers visible to the caller", body = Vec<Layer>),
        (status = 500, description = "Storage failure", body = Problem)
    )
)]
pub async fn list_layers_handler(
    State(state): State<AppState>,
    PrivateLayerAccess(private): PrivateLayerAccess,
) -> crate::Result<Json<Vec<Layer>>> {
    Ok(Json(state.layers.list_layers(private).await?))
}

#[utoipa::path(
    get,
    path = "/{layer}",
    params(("layer" = String, Path, description = "Layer id (UUID) or URL key")),
    responses(
        (status = 200, description = "Layer metadata", body = Layer),
        (status = 404, description = "Unknown layer", body = Problem)
    )
)]
pub async fn get_layer_handler(
    State(state): State<AppState>,
    PrivateLayerAccess(private): PrivateLayerAccess,
    Path(layer): Path<String>,
) -> crate::Result<Json<Layer>> {
    Ok(Json(state.layers.layer(&layer, private).await?))
}
