pub mod filter;
pub mod identify;
pub mod model;
pub mod shapefile;
pub mod srs;
pub mod upload;
pub mod view;
