pub mod app;
pub mod domain;
pub mod error;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::layer_service::{LayerService, ShapefileUpload};
pub use domain::model::{Layer, LayerRef, NewLayer, Object};
pub use error::{Error, Result};
pub use infra::gdal::GdalSrsInfo;
pub use storage::Storage;
