//! Catalog and content types shared by the ingestion and query paths.

pub mod layer;
pub mod object;

pub use layer::{Layer, LayerRef, NewLayer};
pub use object::{AttributedContents, Object};
