use heck::{ToKebabCase, ToSnakeCase};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::validate_ident;

/// A catalog entry from `geodata.layers`.
///
/// The physical table name is deliberately not serialized; clients address a layer by
/// its id or its URL key.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// URL-safe key usable instead of the id.
    pub key: String,
    #[serde(skip)]
    pub table_name: String,
    pub attribution: Option<String>,
    #[serde(rename = "attributionURL")]
    pub attribution_url: Option<String>,
    /// EPSG code of the layer geometries, if known.
    pub crs: Option<i32>,
    pub private: bool,
}

impl Layer {
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            key: row.try_get("url_key")?,
            table_name: row.try_get("table")?,
            attribution: row.try_get("attribution")?,
            attribution_url: row.try_get("attribution_url")?,
            crs: row.try_get("crs")?,
            private: row.try_get("private")?,
        })
    }
}

/// Catalog metadata supplied by the client when creating a layer.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewLayer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default, rename = "attributionURL")]
    pub attribution_url: Option<String>,
    #[serde(default)]
    pub private: bool,
}

impl NewLayer {
    /// Physical table name: the snake-cased layer name.
    pub fn table_name(&self) -> crate::Result<String> {
        let table = self.name.trim().to_snake_case();
        if !validate_ident(&table) {
            return Err(crate::Error::InvalidIdentifier(self.name.clone()));
        }
        Ok(table)
    }

    /// URL key: the kebab-cased layer name.
    pub fn url_key(&self) -> String {
        self.name.trim().to_kebab_case()
    }
}

/// Reference to a layer as it appears in a URL or filter: either its UUID or its URL key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerRef {
    Id(Uuid),
    Key(String),
}

impl LayerRef {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(crate::Error::MissingParameter("layer"));
        }
        Ok(match Uuid::parse_str(raw) {
            Ok(id) => LayerRef::Id(id),
            Err(_) => LayerRef::Key(raw.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> NewLayer {
        NewLayer {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn table_and_key_are_derived_from_the_name() {
        let layer = named("Federal States");
        assert_eq!(layer.table_name().unwrap(), "federal_states");
        assert_eq!(layer.url_key(), "federal-states");

        let layer = named("  DistrictBorders2024 ");
        assert_eq!(layer.table_name().unwrap(), "district_borders2024");
    }

    #[test]
    fn names_without_identifier_characters_are_rejected() {
        assert!(matches!(
            named("!!!").table_name(),
            Err(crate::Error::InvalidIdentifier(_))
        ));
        assert!(matches!(
            named("2024 districts").table_name(),
            Err(crate::Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn layer_refs_distinguish_uuids_from_keys() {
        let id = Uuid::new_v4();
        assert_eq!(LayerRef::parse(&id.to_string()).unwrap(), LayerRef::Id(id));
        assert_eq!(
            LayerRef::parse("federal-states").unwrap(),
            LayerRef::Key("federal-states".to_string())
        );
        assert!(LayerRef::parse("  ").is_err());
    }

    #[test]
    fn table_name_is_never_serialized() {
        let layer = Layer {
            id: Uuid::nil(),
            name: "Federal States".into(),
            description: None,
            key: "federal-states".into(),
            table_name: "federal_states".into(),
            attribution: Some("BKG".into()),
            attribution_url: None,
            crs: Some(25832),
            private: false,
        };
        let json = serde_json::to_value(&layer).unwrap();
        assert!(json.get("tableName").is_none());
        assert_eq!(json["attributionURL"], serde_json::Value::Null);
        assert_eq!(json["crs"], 25832);
        assert_eq!(json["key"], "federal-states");
    }
}
