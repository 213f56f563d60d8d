pub mod config;
pub mod gdal;
