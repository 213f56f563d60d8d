// src/bin/api_server.rs

use std::sync::Arc;

use geodata_catalog::infra::config;
use geodata_catalog::transport;
use geodata_catalog::{GdalSrsInfo, LayerService, Storage};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "unable to listen for the shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    // --- Storage Initialization ---
    tracing::info!("connecting to the database");
    let storage = Storage::connect(&config::database_url()?, config::database_max_connections()?).await?;
    storage.bootstrap().await?;

    // --- Service Initialization ---
    let gdal = GdalSrsInfo::from_env();
    match gdal.version().await {
        Ok(version) => tracing::info!(%version, "gdalsrsinfo available"),
        Err(e) => tracing::warn!(error = %e, "gdalsrsinfo unavailable; shapefile uploads will fail"),
    }
    let app_state = transport::http::AppState {
        layers: LayerService::new(storage, Arc::new(gdal))
            .with_max_extracted_bytes(config::max_extracted_bytes()?),
    };

    // --- API Server Initialization ---
    let limits = transport::http::RouterLimits::from_env()?;
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = transport::http::create_router(app_state, limits)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(cors);

    let addr = config::listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    tracing::info!("Swagger UI available at /swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("graceful shutdown complete");
    Ok(())
}
