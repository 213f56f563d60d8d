//! Shared harness: an in-process API server against `DATABASE_URL`, plus upload forms.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
pub use geodata_catalog::domain::shapefile::fixtures::{points, zipped, PointFeature};
use geodata_catalog::domain::shapefile::ShapefileComponents;
use geodata_catalog::domain::srs::{SpatialReferenceResolver, SrsFormat};
use geodata_catalog::transport;
use geodata_catalog::{LayerService, Storage};

/// Answers every projection with a fixed EPSG code, so tests do not need GDAL.
pub struct FixedEpsg(pub i32);

#[async_trait]
impl SpatialReferenceResolver for FixedEpsg {
    async fn resolve(&self, _descriptor: &str, format: SrsFormat) -> geodata_catalog::Result<String> {
        Ok(match format {
            SrsFormat::Epsg => format!("EPSG:{}\n", self.0),
            SrsFormat::Proj4 => "+proj=longlat +datum=WGS84 +no_defs\n".to_string(),
        })
    }
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub storage: Storage,
    server: tokio::task::JoinHandle<()>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Starts the router on an ephemeral port. Returns `None` (test skipped) without a database.
pub async fn spawn_app() -> Option<TestApp> {
    dotenv::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping");
        return None;
    };

    let storage = Storage::connect(&database_url, 4).await.expect("connect to database");
    storage.bootstrap().await.expect("bootstrap schema");

    let state = transport::http::AppState {
        layers: LayerService::new(storage.clone(), Arc::new(FixedEpsg(4326))),
    };
    let router = transport::http::create_router(state, transport::http::RouterLimits::default());

    // Bind to an ephemeral port to avoid conflicts if an API server is already running.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Some(TestApp {
        base_url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        storage,
        server,
    })
}

/// A layer name that will not collide with other test runs.
pub fn unique_name(prefix: &str) -> String {
    format!("{} {}", prefix, uuid::Uuid::new_v4().simple())
}

/// Multipart archive upload with the standard record mapping.
pub fn archive_form(layer_name: &str, shapefile: &ShapefileComponents) -> reqwest::multipart::Form {
    let archive = zipped(shapefile, "upload").unwrap();
    mapped_form(layer_name).part(
        "archive",
        reqwest::multipart::Part::bytes(archive).file_name("upload.zip"),
    )
}

/// Multipart upload of the separate component files. `.prj` and `.cpg` are sent when present.
pub fn direct_form(layer_name: &str, shapefile: &ShapefileComponents) -> reqwest::multipart::Form {
    let mut form = mapped_form(layer_name)
        .part("shp", file_part(&shapefile.shp, "upload.shp"))
        .part("shx", file_part(&shapefile.shx, "upload.shx"))
        .part("dbf", file_part(&shapefile.dbf, "upload.dbf"));
    if let Some(prj) = &shapefile.prj {
        form = form.part("prj", file_part(prj, "upload.prj"));
    }
    if let Some(cpg) = &shapefile.cpg {
        form = form.part("cpg", file_part(cpg, "upload.cpg"));
    }
    form
}

fn mapped_form(layer_name: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("layer-name", layer_name.to_string())
        .text("record-name-field", "NAME")
        .text("record-key-field", "KEY")
}

fn file_part(data: &[u8], file_name: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(data.to_vec()).file_name(file_name.to_string())
}
