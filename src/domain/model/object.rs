use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::Row;
use utoipa::ToSchema;

/// One row of a layer table (or layer view).
///
/// `geometry` already holds the GeoJSON rendering produced by the content query
/// (`ST_AsGeoJSON(geometry, 15, 1)`), including its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    #[schema(value_type = Object)]
    pub geometry: Option<JsonValue>,
    pub name: Option<String>,
    pub key: Option<String>,
    #[schema(value_type = Object)]
    pub additional_properties: JsonValue,
}

impl Object {
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let additional_properties: Option<JsonValue> = row.try_get("additional_properties")?;
        Ok(Self {
            geometry: row.try_get("geometry")?,
            name: row.try_get("name")?,
            key: row.try_get("key")?,
            additional_properties: additional_properties
                .unwrap_or_else(|| JsonValue::Object(Default::default())),
        })
    }
}

/// Layer contents bundled with the layer's attribution.
#[derive(Debug, Serialize, ToSchema)]
pub struct AttributedContents {
    pub attribution: Option<String>,
    #[serde(rename = "attributionURL")]
    pub attribution_url: Option<String>,
    pub data: Vec<Object>,
}
