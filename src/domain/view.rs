//! Layers backed by a view over an existing relation.

use heck::ToLowerCamelCase;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::model::NewLayer;
use crate::storage::validate_ident;

/// Column mapping from an existing relation onto the layer object shape.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfiguration {
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub geometry: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub additional_property_keys: Vec<String>,
    /// Plain SQL condition restricting the rows of the view.
    #[serde(default)]
    pub where_condition: Option<String>,
}

/// JSON body of a view-backed layer creation.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfiguration {
    #[serde(flatten)]
    pub layer: NewLayer,
    pub view_configuration: ViewConfiguration,
}

/// A validated view configuration. Every identifier has passed `validate_ident`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    schema: String,
    table: String,
    id: String,
    key: String,
    geometry: String,
    name: String,
    additional_property_keys: Vec<String>,
    where_condition: Option<String>,
}

fn required(value: &str, field: &'static str) -> crate::Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(crate::Error::MissingField(field));
    }
    Ok(value.to_string())
}

fn identifier(value: String) -> crate::Result<String> {
    if validate_ident(&value) {
        Ok(value)
    } else {
        Err(crate::Error::InvalidIdentifier(value))
    }
}

impl ViewConfiguration {
    /// Trims and checks the mapping. Blank fields are reported in the order
    /// schema, table, id, name, key, geometry.
    pub fn validate(&self) -> crate::Result<ViewDefinition> {
        let schema = required(&self.schema, "schema")?;
        let table = required(&self.table, "table")?;
        let id = required(&self.id, "id")?;
        let name = required(&self.name, "name")?;
        let key = required(&self.key, "key")?;
        let geometry = required(&self.geometry, "geometry")?;

        let additional_property_keys = self
            .additional_property_keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(identifier)
            .collect::<crate::Result<Vec<_>>>()?;

        let table = identifier(table)?;
        // The view is named after the source table and must stay a valid identifier too.
        let view_name = format!("view_{}", table);
        if !validate_ident(&view_name) {
            return Err(crate::Error::InvalidIdentifier(view_name));
        }

        Ok(ViewDefinition {
            schema: identifier(schema)?,
            table,
            id: identifier(id)?,
            key: identifier(key)?,
            geometry: identifier(geometry)?,
            name: identifier(name)?,
            additional_property_keys,
            where_condition: self
                .where_condition
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(|c| c.trim_end_matches(';').to_string()),
        })
    }
}

impl ViewDefinition {
    /// Name of the view inside the `geodata` schema.
    pub fn view_name(&self) -> String {
        format!("view_{}", self.table)
    }

    pub fn build_create_statement(&self) -> String {
        let properties = self
            .additional_property_keys
            .iter()
            .map(|k| format!("'{}', {}", k.to_lower_camel_case(), k))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "CREATE VIEW geodata.{view} AS SELECT {id} AS id, {key} AS key, {geometry} AS geometry, \
             {name} AS name, json_build_object({properties}) AS additional_properties \
             FROM {schema}.{table}",
            view = self.view_name(),
            id = self.id,
            key = self.key,
            geometry = self.geometry,
            name = self.name,
            properties = properties,
            schema = self.schema,
            table = self.table,
        );
        if let Some(condition) = &self.where_condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }
        sql
    }
}
