//! Identification of objects by key across all visible layers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::domain::model::{Layer, Object};

/// layer id -> key -> object
pub type IdentifiedObjects = BTreeMap<String, BTreeMap<String, Object>>;

/// Point lookup of one object by key within one layer.
#[async_trait]
pub trait ObjectLookup: Send + Sync + 'static {
    async fn find_object(&self, layer: &Layer, key: &str) -> crate::Result<Option<Object>>;
}

/// Looks up every key in every layer, one task per key.
///
/// All tasks are joined before returning; the first lookup failure is reported after the
/// join. An empty result is [`crate::Error::UnknownObject`].
pub async fn resolve_keys(
    lookup: Arc<dyn ObjectLookup>,
    layers: Vec<Layer>,
    keys: impl IntoIterator<Item = String>,
) -> crate::Result<IdentifiedObjects> {
    let keys: BTreeSet<String> = keys
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if keys.is_empty() {
        return Err(crate::Error::MissingParameter("key"));
    }

    let layers = Arc::new(layers);
    let results: Arc<Mutex<IdentifiedObjects>> = Arc::new(Mutex::new(BTreeMap::new()));
    let mut tasks = JoinSet::new();

    for key in keys {
        let lookup = Arc::clone(&lookup);
        let layers = Arc::clone(&layers);
        let results = Arc::clone(&results);
        tasks.spawn(async move {
            for layer in layers.iter() {
                if let Some(object) = lookup.find_object(layer, &key).await? {
                    results
                        .lock()
                        .await
                        .entry(layer.id.to_string())
                        .or_default()
                        .insert(key.clone(), object);
                }
            }
            Ok::<_, crate::Error>(())
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(crate::Error::from).and_then(|r| r);
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "object lookup failed");
            first_error.get_or_insert(e);
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    let identified = std::mem::take(&mut *results.lock().await);
    if identified.is_empty() {
        return Err(crate::Error::UnknownObject);
    }
    Ok(identified)
}
