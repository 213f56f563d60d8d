pub mod problem;
pub mod router;
pub mod types;
pub mod handlers {
    pub mod common;
    pub mod contents;
    pub mod filtered;
    pub mod health;
    pub mod identify;
    pub mod ingest;
    pub mod inspect;
    pub mod layers;
}

pub use router::{create_router, ApiDoc, RouterLimits};
pub use types::{AppState, PrivateLayerAccess};
