//! The layer service.
//!
//! This module sits between the HTTP handlers and the database. It is responsible for:
//! 1.  Running the ingestion pipeline (decode, resolve the projection, write transactionally).
//! 2.  Creating view-backed layers.
//! 3.  Answering catalog, content, filter and identification requests with private-layer
//!     visibility applied.

use std::sync::Arc;

use crate::domain::filter::{SpatialFilter, Predicate};
use crate::domain::identify::{resolve_keys, IdentifiedObjects, ObjectLookup};
use crate::domain::model::{AttributedContents, Layer, LayerRef, NewLayer, Object};
use crate::domain::shapefile::{DecodedShapefile, ShapefileComponents, ShapefileInformation};
use crate::domain::srs::{self, SpatialReferenceResolver};
use crate::domain::view::LayerConfiguration;
use crate::infra::config;
use crate::storage::{LayerDraft, ObjectRow, Storage};

/// A shapefile upload with its catalog metadata and record mapping.
#[derive(Debug, Clone)]
pub struct ShapefileUpload {
    pub layer: NewLayer,
    /// dBase attribute holding the object name.
    pub record_name_field: String,
    /// dBase attribute holding the object key.
    pub record_key_field: String,
    /// dBase attributes copied into `additionalProperties`.
    pub additional_properties: Vec<String>,
    pub components: ShapefileComponents,
}

#[derive(Clone)]
pub struct LayerService {
    storage: Storage,
    srs: Arc<dyn SpatialReferenceResolver>,
    max_extracted_bytes: u64,
}

impl LayerService {
    pub fn new(storage: Storage, srs: Arc<dyn SpatialReferenceResolver>) -> Self {
        Self {
            storage,
            srs,
            max_extracted_bytes: config::DEFAULT_MAX_EXTRACTED_BYTES,
        }
    }

    pub fn with_max_extracted_bytes(mut self, limit: u64) -> Self {
        self.max_extracted_bytes = limit;
        self
    }

    /// Cap for a single file extracted from an uploaded archive.
    pub fn max_extracted_bytes(&self) -> u64 {
        self.max_extracted_bytes
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Ingests a shapefile as a new table-backed layer.
    pub async fn ingest_shapefile(&self, upload: ShapefileUpload) -> crate::Result<Layer> {
        let ShapefileUpload {
            layer,
            record_name_field,
            record_key_field,
            additional_properties,
            components,
        } = upload;

        if layer.name.trim().is_empty() {
            return Err(crate::Error::MissingField("layer-name"));
        }
        let record_name_field = required_text(record_name_field, "record-name-field")?;
        let record_key_field = required_text(record_key_field, "record-key-field")?;
        let additional_properties: Vec<String> = additional_properties
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let mut draft = LayerDraft::for_table(layer, None)?;
        let projection = components.projection();
        let srid = srs::resolve_epsg(self.srs.as_ref(), projection.as_deref()).await?;
        draft.crs = Some(srid);

        let decoded = DecodedShapefile::decode(components).await?;
        tracing::info!(
            table = %draft.table,
            features = decoded.records.len(),
            srid,
            code_page = decoded.code_page.as_deref().unwrap_or("unspecified"),
            "shapefile decoded"
        );

        let rows = decoded.records.iter().enumerate().map(|(index, record)| {
            ObjectRow::from_record(
                index,
                record,
                &record_name_field,
                &record_key_field,
                &additional_properties,
            )
        });
        self.storage.create_table_layer(&draft, srid, rows).await
    }

    /// Creates a layer backed by a view over an existing relation.
    pub async fn create_view_layer(&self, configuration: LayerConfiguration) -> crate::Result<Layer> {
        if configuration.layer.name.trim().is_empty() {
            return Err(crate::Error::MissingField("name"));
        }
        let view = configuration.view_configuration.validate()?;
        let draft = LayerDraft::for_view(configuration.layer, &view);
        self.storage.create_view_layer(&draft, &view).await
    }

    /// Reports feature count, attribute coverage and projection of an archive without
    /// writing anything.
    pub async fn inspect(&self, archive: Vec<u8>) -> crate::Result<ShapefileInformation> {
        let components = ShapefileComponents::from_archive(&archive, self.max_extracted_bytes)?;
        let projection = components.projection();
        let decoded = DecodedShapefile::decode(components).await?;

        let mut information = ShapefileInformation::from_records(&decoded.records);
        let (epsg, proj4) = srs::describe(self.srs.as_ref(), projection.as_deref()).await;
        information.epsg_code = epsg;
        information.proj4_string = proj4;
        Ok(information)
    }

    pub async fn list_layers(&self, private: bool) -> crate::Result<Vec<Layer>> {
        self.storage.list_layers(private).await
    }

    pub async fn layer(&self, raw: &str, private: bool) -> crate::Result<Layer> {
        self.storage.get_layer(&LayerRef::parse(raw)?, private).await
    }

    pub async fn contents(&self, raw: &str, private: bool) -> crate::Result<Vec<Object>> {
        let layer = self.layer(raw, private).await?;
        self.storage.layer_contents(&layer).await
    }

    pub async fn attributed_contents(&self, raw: &str, private: bool) -> crate::Result<AttributedContents> {
        let layer = self.layer(raw, private).await?;
        let data = self.storage.layer_contents(&layer).await?;
        Ok(AttributedContents {
            attribution: layer.attribution,
            attribution_url: layer.attribution_url,
            data,
        })
    }

    /// Layer contents filtered by spatial relations to objects of other layers.
    ///
    /// Groups are AND-ed, the keys of one group OR-ed.
    pub async fn filtered_contents(
        &self,
        raw: &str,
        groups: &[SpatialFilter],
        private: bool,
    ) -> crate::Result<Vec<Object>> {
        if groups.is_empty() {
            return Err(crate::Error::MissingParameter("relation"));
        }
        let layer = self.layer(raw, private).await?;

        let mut parts = Vec::with_capacity(groups.len());
        for group in groups {
            let relation = group.relation()?;
            let keys = group.keys()?;
            let other_ref = LayerRef::parse(&group.other_layer)
                .map_err(|_| crate::Error::MissingParameter("other_layer"))?;
            let other = self
                .storage
                .find_layer(&other_ref, private)
                .await?
                .ok_or_else(|| crate::Error::UnknownOtherLayer(group.other_layer.trim().to_string()))?;
            parts.push(Predicate::any_key(relation, &other.table_name, keys)?);
        }

        self.storage
            .filtered_contents(&layer, &Predicate::All(parts))
            .await
    }

    /// Finds the objects carrying any of the keys, across all visible layers.
    pub async fn identify(&self, keys: Vec<String>, private: bool) -> crate::Result<IdentifiedObjects> {
        let layers = self.storage.list_layers(private).await?;
        let lookup: Arc<dyn ObjectLookup> = Arc::new(self.storage.clone());
        resolve_keys(lookup, layers, keys).await
    }
}

fn required_text(value: String, field: &'static str) -> crate::Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(crate::Error::MissingField(field));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::srs::fake::FixedResolver;
    use crate::domain::view::ViewConfiguration;
    use crate::storage::QueryRepository;

    fn service() -> LayerService {
        // Never connects: every case below fails before touching the database.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let storage = Storage::new(pool, QueryRepository::bundled().unwrap());
        LayerService::new(storage, Arc::new(FixedResolver(4326)))
    }

    #[tokio::test]
    async fn view_layers_require_a_name() {
        let configuration: LayerConfiguration = serde_json::from_value(serde_json::json!({
            "viewConfiguration": {
                "schema": "public", "table": "districts", "id": "gid",
                "key": "ags", "geometry": "geom", "name": "gen"
            }
        }))
        .unwrap();
        assert!(matches!(
            service().create_view_layer(configuration).await,
            Err(crate::Error::MissingField("name"))
        ));
    }

    #[tokio::test]
    async fn long_view_names_are_rejected_before_writing() {
        let configuration = LayerConfiguration {
            layer: NewLayer {
                name: "Long Source".into(),
                ..Default::default()
            },
            view_configuration: ViewConfiguration {
                schema: "public".into(),
                table: "t".repeat(60),
                id: "gid".into(),
                key: "ags".into(),
                geometry: "geom".into(),
                name: "gen".into(),
                ..Default::default()
            },
        };
        assert!(matches!(
            service().create_view_layer(configuration).await,
            Err(crate::Error::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn extraction_cap_is_configurable() {
        let service = service().with_max_extracted_bytes(16);
        assert_eq!(service.max_extracted_bytes(), 16);
    }
}
