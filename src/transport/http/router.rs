use std::time::Duration;

use crate::domain::filter::{SpatialFilter, SpatialRelation};
use crate::domain::model::{AttributedContents, Layer, NewLayer};
use crate::domain::shapefile::ShapefileInformation;
use crate::domain::view::{LayerConfiguration, ViewConfiguration};
use crate::transport::http::handlers::{contents, filtered, health, identify, ingest, inspect, layers};
use crate::transport::http::problem::Problem;
use crate::transport::http::types::{AppState, FilterGroups, HealthResponse};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        layers::list_layers_handler,
        layers::get_layer_handler,
        contents::layer_contents_handler,
        contents::attributed_contents_handler,
        filtered::filtered_contents_query_handler,
        filtered::filtered_contents_body_handler,
        identify::identify_handler,
        ingest::create_layer_handler,
        inspect::inspect_handler
    ),
    components(schemas(
        HealthResponse,
        Problem,
        Layer,
        NewLayer,
        AttributedContents,
        LayerConfiguration,
        ViewConfiguration,
        FilterGroups,
        SpatialFilter,
        SpatialRelation,
        ShapefileInformation
    ))
)]
pub struct ApiDoc;

/// Request limits applied to every route.
#[derive(Debug, Clone, Copy)]
pub struct RouterLimits {
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl Default for RouterLimits {
    fn default() -> Self {
        Self {
            max_body_bytes: 128 * 1024 * 1024,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl RouterLimits {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            max_body_bytes: crate::infra::config::max_upload_bytes()?,
            request_timeout: crate::infra::config::request_timeout()?,
        })
    }
}

pub fn create_router(app_state: AppState, limits: RouterLimits) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route(
            "/",
            get(layers::list_layers_handler).post(ingest::create_layer_handler),
        )
        .route("/inspect", post(inspect::inspect_handler))
        .route("/identify", get(identify::identify_handler))
        .route("/:layer", get(layers::get_layer_handler))
        .route("/content/:layer", get(contents::layer_contents_handler))
        .route(
            "/content/:layer/filtered",
            get(filtered::filtered_contents_query_handler)
                .post(filtered::filtered_contents_body_handler),
        )
        .route("/v2/content/:layer", get(contents::attributed_contents_handler))
        .layer(DefaultBodyLimit::max(limits.max_body_bytes))
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
