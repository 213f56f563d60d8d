//! Spatial filters over layer contents.
//!
//! A filter request is a list of groups. Each group names a spatial relation, another
//! layer and a set of object keys in that layer. The keys of one group are OR-ed, the
//! groups themselves are AND-ed. The resulting predicate is rendered with positional
//! placeholders; only validated table names are ever interpolated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::validate_ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpatialRelation {
    Within,
    Overlaps,
    Contains,
}

impl SpatialRelation {
    /// The PostGIS function testing this relation.
    pub fn st_function(self) -> &'static str {
        match self {
            SpatialRelation::Within => "ST_Within",
            SpatialRelation::Overlaps => "ST_Overlaps",
            SpatialRelation::Contains => "ST_Contains",
        }
    }
}

impl FromStr for SpatialRelation {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "within" => Ok(SpatialRelation::Within),
            "overlaps" => Ok(SpatialRelation::Overlaps),
            "contains" => Ok(SpatialRelation::Contains),
            _ => Err(crate::Error::UnsupportedSpatialRelation(s.to_string())),
        }
    }
}

impl fmt::Display for SpatialRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpatialRelation::Within => "within",
            SpatialRelation::Overlaps => "overlaps",
            SpatialRelation::Contains => "contains",
        })
    }
}

/// One filter group as submitted by a client.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpatialFilter {
    /// `within`, `overlaps` or `contains`.
    pub relation: String,
    /// Id or URL key of the layer holding the reference geometries.
    pub other_layer: String,
    /// Keys of the reference objects; any of them may match.
    pub keys: Vec<String>,
}

impl SpatialFilter {
    pub fn relation(&self) -> crate::Result<SpatialRelation> {
        self.relation.parse()
    }

    /// Trimmed, non-empty keys in request order.
    pub fn keys(&self) -> crate::Result<Vec<String>> {
        let keys: Vec<String> = self
            .keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Err(crate::Error::MissingParameter("key"));
        }
        Ok(keys)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Relation {
        relation: SpatialRelation,
        other_table: String,
        key_param: String,
    },
    Any(Vec<Predicate>),
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn relation(
        relation: SpatialRelation,
        other_table: &str,
        key: impl Into<String>,
    ) -> crate::Result<Self> {
        if !validate_ident(other_table) {
            return Err(crate::Error::InvalidIdentifier(other_table.to_string()));
        }
        Ok(Predicate::Relation {
            relation,
            other_table: other_table.to_string(),
            key_param: key.into(),
        })
    }

    /// One OR-group: the base geometry relates to any of the keyed objects.
    pub fn any_key<I, K>(relation: SpatialRelation, other_table: &str, keys: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        keys.into_iter()
            .map(|k| Predicate::relation(relation, other_table, k))
            .collect::<crate::Result<Vec<_>>>()
            .map(Predicate::Any)
    }

    /// Renders the predicate, pushing bind values in placeholder order.
    pub fn render(&self, binds: &mut Vec<String>) -> String {
        match self {
            Predicate::Relation {
                relation,
                other_table,
                key_param,
            } => {
                binds.push(key_param.clone());
                format!(
                    "{}(ST_Transform(base.geometry, 4326), (SELECT ST_Transform(other.geometry, 4326) \
                     FROM geodata.{} AS other WHERE other.key = ${}))",
                    relation.st_function(),
                    other_table,
                    binds.len()
                )
            }
            Predicate::Any(parts) => join(parts, " OR ", "FALSE", binds),
            Predicate::All(parts) => join(parts, " AND ", "TRUE", binds),
        }
    }
}

fn join(parts: &[Predicate], separator: &str, empty: &str, binds: &mut Vec<String>) -> String {
    match parts {
        [] => empty.to_string(),
        [single] => single.render(binds),
        _ => {
            let rendered: Vec<String> = parts
                .iter()
                .map(|p| format!("({})", p.render(binds)))
                .collect();
            rendered.join(separator)
        }
    }
}

/// A parameterized query with its bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub sql: String,
    pub binds: Vec<String>,
}

/// Appends the predicate as `WHERE` clause to a base content query.
///
/// The base query must select from the layer aliased as `base` and take no parameters.
pub fn compose(base_query: &str, predicate: &Predicate) -> ComposedQuery {
    let base = base_query.trim_end().trim_end_matches(';').trim_end();
    let mut binds = Vec::new();
    let condition = predicate.render(&mut binds);
    ComposedQuery {
        sql: format!("{} WHERE {}", base, condition),
        binds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "SELECT base.key FROM geodata.municipalities AS base;\n";

    #[test]
    fn relations_parse_case_insensitively() {
        assert_eq!("Within".parse::<SpatialRelation>().unwrap(), SpatialRelation::Within);
        assert_eq!(" overlaps ".parse::<SpatialRelation>().unwrap(), SpatialRelation::Overlaps);
        assert_eq!(SpatialRelation::Contains.st_function(), "ST_Contains");
        assert!(matches!(
            "touches".parse::<SpatialRelation>(),
            Err(crate::Error::UnsupportedSpatialRelation(r)) if r == "touches"
        ));
    }

    #[test]
    fn single_key_renders_one_placeholder() {
        let predicate = Predicate::any_key(SpatialRelation::Within, "districts", ["03403"]).unwrap();
        let query = compose(BASE, &predicate);
        assert_eq!(
            query.sql,
            "SELECT base.key FROM geodata.municipalities AS base WHERE \
             ST_Within(ST_Transform(base.geometry, 4326), (SELECT ST_Transform(other.geometry, 4326) \
             FROM geodata.districts AS other WHERE other.key = $1))"
        );
        assert_eq!(query.binds, vec!["03403"]);
    }

    #[test]
    fn keys_are_or_ed_and_groups_and_ed() {
        let predicate = Predicate::All(vec![
            Predicate::any_key(SpatialRelation::Within, "districts", ["a", "b"]).unwrap(),
            Predicate::any_key(SpatialRelation::Overlaps, "rivers", ["c"]).unwrap(),
        ]);
        let query = compose(BASE, &predicate);
        let condition = query.sql.split(" WHERE ").skip(1).collect::<Vec<_>>().join(" WHERE ");
        assert!(condition.starts_with("((ST_Within("));
        assert!(condition.contains(") OR (ST_Within("));
        assert!(condition.contains(")) AND (ST_Overlaps("));
        assert!(query.sql.contains("other.key = $1"));
        assert!(query.sql.contains("other.key = $2"));
        assert!(query.sql.contains("FROM geodata.rivers AS other WHERE other.key = $3"));
        assert_eq!(query.binds, vec!["a", "b", "c"]);
        assert!(!query.sql.contains(';'));
    }

    #[test]
    fn keys_are_never_interpolated() {
        let predicate =
            Predicate::any_key(SpatialRelation::Contains, "districts", ["x' OR '1'='1"]).unwrap();
        let query = compose(BASE, &predicate);
        assert!(!query.sql.contains("'1'='1"));
        assert_eq!(query.binds, vec!["x' OR '1'='1"]);
    }

    #[test]
    fn table_names_are_validated() {
        assert!(matches!(
            Predicate::relation(SpatialRelation::Within, "districts; --", "a"),
            Err(crate::Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn empty_groups_render_neutral_elements() {
        let mut binds = Vec::new();
        assert_eq!(Predicate::All(vec![]).render(&mut binds), "TRUE");
        assert_eq!(Predicate::Any(vec![]).render(&mut binds), "FALSE");
        assert!(binds.is_empty());
    }

    #[test]
    fn blank_keys_are_dropped() {
        let filter = SpatialFilter {
            relation: "within".into(),
            other_layer: "districts".into(),
            keys: vec![" 03403 ".into(), "".into()],
        };
        assert_eq!(filter.keys().unwrap(), vec!["03403"]);

        let filter = SpatialFilter { keys: vec!["  ".into()], ..filter };
        assert!(matches!(filter.keys(), Err(crate::Error::MissingParameter("key"))));
    }
}
