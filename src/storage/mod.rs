//! PostgreSQL/PostGIS access.
//!
//! [`Storage`] bundles the connection pool with the named-query repository and is
//! handed to every component that talks to the database.

pub mod queries;
pub mod transaction;
pub mod writer;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::domain::filter::{compose, Predicate};
use crate::domain::identify::ObjectLookup;
use crate::domain::model::{Layer, LayerRef, Object};

pub use queries::QueryRepository;
pub use transaction::TransactionGuard;
pub use writer::{LayerDraft, ObjectRow};

/// Checks that `ident` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn validate_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    ident.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
    queries: Arc<QueryRepository>,
}

impl Storage {
    pub fn new(pool: PgPool, queries: QueryRepository) -> Self {
        Self {
            pool,
            queries: Arc::new(queries),
        }
    }

    /// Connects a pool and loads the bundled queries.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, QueryRepository::bundled()?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn queries(&self) -> &QueryRepository {
        &self.queries
    }

    /// Creates the PostGIS extension, the `geodata` schema and the layer catalog.
    pub async fn bootstrap(&self) -> crate::Result<()> {
        for name in [
            "create-postgis-extension",
            "create-geodata-schema",
            "create-layers-table",
        ] {
            sqlx::query(self.queries.raw(name)?)
                .execute(&self.pool)
                .await?;
        }
        tracing::info!("database schema is ready");
        Ok(())
    }

    pub async fn ping(&self) -> crate::Result<()> {
        sqlx::query(self.queries.raw("ping")?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn postgis_version(&self) -> crate::Result<String> {
        let row = sqlx::query(self.queries.raw("postgis-version")?)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("version")?)
    }

    pub async fn list_layers(&self, private: bool) -> crate::Result<Vec<Layer>> {
        let rows = sqlx::query(self.queries.raw("get-layers")?)
            .bind(private)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Layer::from_row(row).map_err(crate::Error::from))
            .collect()
    }

    pub async fn find_layer(&self, layer: &LayerRef, private: bool) -> crate::Result<Option<Layer>> {
        let row = match layer {
            LayerRef::Id(id) => {
                sqlx::query(self.queries.raw("get-layer")?)
                    .bind(id)
                    .bind(private)
                    .fetch_optional(&self.pool)
                    .await?
            }
            LayerRef::Key(key) => {
                sqlx::query(self.queries.raw("get-layer-by-url-key")?)
                    .bind(key)
                    .bind(private)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        Ok(row.as_ref().map(Layer::from_row).transpose()?)
    }

    /// Like [`find_layer`](Self::find_layer), but a missing layer is [`crate::Error::UnknownLayer`].
    pub async fn get_layer(&self, layer: &LayerRef, private: bool) -> crate::Result<Layer> {
        self.find_layer(layer, private)
            .await?
            .ok_or(crate::Error::UnknownLayer)
    }

    pub async fn layer_contents(&self, layer: &Layer) -> crate::Result<Vec<Object>> {
        let sql = self.queries.render("get-layer-contents", &layer.table_name)?;
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        objects(&rows)
    }

    /// Layer contents restricted by a spatial predicate over other layers.
    pub async fn filtered_contents(
        &self,
        layer: &Layer,
        predicate: &Predicate,
    ) -> crate::Result<Vec<Object>> {
        let base = self.queries.render("get-layer-contents", &layer.table_name)?;
        let composed = compose(&base, predicate);
        tracing::debug!(layer = %layer.key, sql = %composed.sql, "running filtered content query");

        let mut query = sqlx::query(&composed.sql);
        for value in &composed.binds {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        objects(&rows)
    }

    pub async fn find_object_by_key(&self, layer: &Layer, key: &str) -> crate::Result<Option<Object>> {
        let sql = self
            .queries
            .render("get-layer-object-by-key", &layer.table_name)?;
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Object::from_row).transpose()?)
    }

    pub async fn count_objects(&self, layer: &Layer) -> crate::Result<i64> {
        let sql = self.queries.render("count-layer-objects", &layer.table_name)?;
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        Ok(row.try_get("total")?)
    }
}

fn objects(rows: &[PgRow]) -> crate::Result<Vec<Object>> {
    rows.iter()
        .map(|row| Object::from_row(row).map_err(crate::Error::from))
        .collect()
}

#[async_trait]
impl ObjectLookup for Storage {
    async fn find_object(&self, layer: &Layer, key: &str) -> crate::Result<Option<Object>> {
        self.find_object_by_key(layer, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::validate_ident;

    #[test]
    fn identifiers() {
        assert!(validate_ident("districts"));
        assert!(validate_ident("_tmp2"));
        assert!(validate_ident("view_federal_states"));
        assert!(!validate_ident(""));
        assert!(!validate_ident("2districts"));
        assert!(!validate_ident("districts;"));
        assert!(!validate_ident("geodata.layers"));
        assert!(!validate_ident("bezirke_ä"));
        assert!(!validate_ident(&"x".repeat(64)));
    }
}
