//! Transactional creation of layers.
//!
//! Both creation paths write the backing relation and the catalog entry in one
//! transaction, so a catalog entry never points at a missing or partial table.

use heck::ToLowerCamelCase;
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::{Storage, TransactionGuard};
use crate::domain::model::{Layer, NewLayer};
use crate::domain::shapefile::ShapeRecord;
use crate::domain::view::ViewDefinition;

/// Catalog values of a layer about to be written.
#[derive(Debug, Clone)]
pub struct LayerDraft {
    pub metadata: NewLayer,
    pub table: String,
    pub url_key: String,
    pub crs: Option<i32>,
}

impl LayerDraft {
    /// Derives table name and URL key from the layer name.
    pub fn for_table(metadata: NewLayer, crs: Option<i32>) -> crate::Result<Self> {
        let table = metadata.table_name()?;
        let url_key = metadata.url_key();
        Ok(Self {
            metadata,
            table,
            url_key,
            crs,
        })
    }

    /// A draft backed by the given view; the URL key still follows the layer name.
    pub fn for_view(metadata: NewLayer, view: &ViewDefinition) -> Self {
        let url_key = metadata.url_key();
        Self {
            metadata,
            table: view.view_name(),
            url_key,
            crs: None,
        }
    }
}

/// One row of a layer table, ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRow {
    pub geometry: Option<JsonValue>,
    pub name: Option<String>,
    pub key: Option<String>,
    pub additional_properties: JsonValue,
}

impl ObjectRow {
    /// Maps a decoded record onto the layer columns.
    ///
    /// Only the declared additional keys are kept, renamed to lowerCamelCase. Declared keys
    /// the record does not carry are skipped.
    pub fn from_record(
        index: usize,
        record: &ShapeRecord,
        name_field: &str,
        key_field: &str,
        additional_keys: &[String],
    ) -> crate::Result<Self> {
        let name = record.text_attribute(index, name_field)?;
        let key = record.text_attribute(index, key_field)?;

        let mut properties = JsonMap::new();
        for attribute in additional_keys {
            if let Some(value) = record.attributes.get(attribute) {
                properties.insert(attribute.to_lower_camel_case(), value.clone());
            }
        }

        Ok(Self {
            geometry: record.geometry.clone(),
            name,
            key,
            additional_properties: JsonValue::Object(properties),
        })
    }
}

impl Storage {
    /// Creates a table-backed layer from a stream of rows.
    ///
    /// The table, its rows, the SRID update and the catalog entry are committed together.
    /// A failing row aborts the whole layer.
    pub async fn create_table_layer<I>(&self, draft: &LayerDraft, srid: i32, rows: I) -> crate::Result<Layer>
    where
        I: IntoIterator<Item = crate::Result<ObjectRow>>,
    {
        let mut guard = TransactionGuard::begin(self.pool(), "create-table-layer").await?;
        let outcome = self.write_table_layer(&mut guard, draft, srid, rows).await;
        guard.release().await;

        match &outcome {
            Ok(layer) => tracing::info!(layer = %layer.key, table = %draft.table, srid, "layer created"),
            Err(e) => tracing::warn!(table = %draft.table, error = %e, "layer creation aborted"),
        }
        outcome
    }

    async fn write_table_layer<I>(
        &self,
        guard: &mut TransactionGuard,
        draft: &LayerDraft,
        srid: i32,
        rows: I,
    ) -> crate::Result<Layer>
    where
        I: IntoIterator<Item = crate::Result<ObjectRow>>,
    {
        let queries = self.queries();

        let create = queries.render("create-layer-table", &draft.table)?;
        sqlx::query(&create).execute(guard.conn()?).await?;

        let insert = queries.render("insert-layer-object", &draft.table)?;
        let mut inserted = 0usize;
        for row in rows {
            let row = row?;
            let geometry = row.geometry.as_ref().map(JsonValue::to_string);
            sqlx::query(&insert)
                .bind(geometry)
                .bind(&row.name)
                .bind(&row.key)
                .bind(&row.additional_properties)
                .execute(guard.conn()?)
                .await?;
            inserted += 1;
        }
        tracing::debug!(table = %draft.table, inserted, "layer rows inserted");

        sqlx::query(queries.raw("update-layer-srid")?)
            .bind(&draft.table)
            .bind(srid)
            .execute(guard.conn()?)
            .await?;

        let layer = insert_catalog_entry(self, guard, draft).await?;
        guard.commit().await?;
        Ok(layer)
    }

    /// Creates a view-backed layer. The view and its catalog entry commit together.
    pub async fn create_view_layer(
        &self,
        draft: &LayerDraft,
        view: &ViewDefinition,
    ) -> crate::Result<Layer> {
        let mut guard = TransactionGuard::begin(self.pool(), "create-view-layer").await?;
        let outcome = async {
            let statement = view.build_create_statement();
            tracing::debug!(sql = %statement, "creating layer view");
            sqlx::query(&statement).execute(guard.conn()?).await?;
            let layer = insert_catalog_entry(self, &mut guard, draft).await?;
            guard.commit().await?;
            Ok::<_, crate::Error>(layer)
        }
        .await;
        guard.release().await;

        if let Ok(layer) = &outcome {
            tracing::info!(layer = %layer.key, view = %draft.table, "view layer created");
        }
        outcome
    }
}

async fn insert_catalog_entry(
    storage: &Storage,
    guard: &mut TransactionGuard,
    draft: &LayerDraft,
) -> crate::Result<Layer> {
    let metadata = &draft.metadata;
    let row = sqlx::query(storage.queries().raw("create-layer")?)
        .bind(metadata.name.trim())
        .bind(&metadata.description)
        .bind(&draft.table)
        .bind(&draft.url_key)
        .bind(&metadata.attribution)
        .bind(&metadata.attribution_url)
        .bind(draft.crs)
        .bind(metadata.private)
        .fetch_one(guard.conn()?)
        .await?;
    Ok(Layer::from_row(&row)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> ShapeRecord {
        let mut attributes = JsonMap::new();
        attributes.insert("GEN".into(), json!("Oldenburg"));
        attributes.insert("AGS".into(), json!("03403"));
        attributes.insert("EWZ_TOTAL".into(), json!(170389.0));
        attributes.insert("BEZ".into(), json!("Kreisfreie Stadt"));
        ShapeRecord {
            attributes,
            geometry: Some(json!({"type": "Point", "coordinates": [8.21, 53.14]})),
        }
    }

    #[test]
    fn rows_keep_only_declared_properties() {
        let row = ObjectRow::from_record(0, &record(), "GEN", "AGS", &["EWZ_TOTAL".to_string(), "MISSING".to_string()])
            .unwrap();
        assert_eq!(row.name.as_deref(), Some("Oldenburg"));
        assert_eq!(row.key.as_deref(), Some("03403"));
        assert_eq!(row.additional_properties, json!({"ewzTotal": 170389.0}));
        assert_eq!(row.geometry.unwrap()["type"], "Point");
    }

    #[test]
    fn rows_without_key_attribute_fail() {
        assert!(matches!(
            ObjectRow::from_record(4, &record(), "GEN", "RS", &[]),
            Err(crate::Error::MissingRecordAttribute { record: 4, .. })
        ));
    }

    #[test]
    fn drafts_derive_their_names() {
        let metadata = NewLayer {
            name: "Lower Saxony Districts".into(),
            ..Default::default()
        };
        let draft = LayerDraft::for_table(metadata, Some(25832)).unwrap();
        assert_eq!(draft.table, "lower_saxony_districts");
        assert_eq!(draft.url_key, "lower-saxony-districts");
        assert_eq!(draft.crs, Some(25832));
    }
}
