use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app::layer_service::LayerService;
use crate::domain::filter::SpatialFilter;

#[derive(Clone)]
pub struct AppState {
    pub layers: LayerService,
}

/// Whether the caller may see private layers.
///
/// Inserted as a request extension by the authentication layer in front of this service;
/// requests without it only see public layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrivateLayerAccess(pub bool);

#[async_trait]
impl<S> FromRequestParts<S> for PrivateLayerAccess
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<PrivateLayerAccess>()
            .copied()
            .unwrap_or_default())
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /content/{layer}/filtered`.
///
/// Either a list of filter groups, or the relation-keyed form
/// `{"within": {"<layer>": ["<key>", ...]}}` where every (relation, layer) pair is a group.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum FilterRequest {
    Groups {
        groups: Vec<SpatialFilter>,
    },
    ByRelation(BTreeMap<String, BTreeMap<String, Vec<String>>>),
}

impl FilterRequest {
    pub fn into_groups(self) -> Vec<SpatialFilter> {
        match self {
            FilterRequest::Groups { groups } => groups,
            FilterRequest::ByRelation(relations) => relations
                .into_iter()
                .flat_map(|(relation, layers)| {
                    layers.into_iter().map(move |(other_layer, keys)| SpatialFilter {
                        relation: relation.clone(),
                        other_layer,
                        keys,
                    })
                })
                .collect(),
        }
    }
}

/// Query string of `GET /content/{layer}/filtered`: a single filter group.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FilterQuery {
    pub relation: Option<String>,
    pub other_layer: Option<String>,
    pub keys: Vec<String>,
}

impl FilterQuery {
    pub fn into_group(self) -> crate::Result<SpatialFilter> {
        Ok(SpatialFilter {
            relation: self
                .relation
                .ok_or(crate::Error::MissingParameter("relation"))?,
            other_layer: self
                .other_layer
                .ok_or(crate::Error::MissingParameter("other_layer"))?,
            keys: self.keys,
        })
    }
}

/// Documented shape of the filter body; [`FilterRequest`] also accepts the relation-keyed form.
#[derive(Deserialize, Debug, ToSchema)]
pub struct FilterGroups {
    pub groups: Vec<SpatialFilter>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn both_filter_body_forms_produce_groups() {
        let grouped: FilterRequest = serde_json::from_value(json!({
            "groups": [
                {"relation": "within", "otherLayer": "districts", "keys": ["03403"]},
                {"relation": "overlaps", "otherLayer": "rivers", "keys": ["weser", "hunte"]}
            ]
        }))
        .unwrap();
        let groups = grouped.into_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].keys, vec!["weser", "hunte"]);

        let by_relation: FilterRequest = serde_json::from_value(json!({
            "within": {"districts": ["03403", "03241"]},
            "contains": {"wells": ["w1"]}
        }))
        .unwrap();
        let groups = by_relation.into_groups();
        assert_eq!(groups.len(), 2);
        assert!(groups
            .iter()
            .any(|g| g.relation == "within" && g.other_layer == "districts" && g.keys.len() == 2));
    }

    #[test]
    fn filter_query_requires_relation_and_layer() {
        let query = FilterQuery {
            relation: Some("within".into()),
            other_layer: None,
            keys: vec!["a".into()],
        };
        assert!(matches!(
            query.into_group(),
            Err(crate::Error::MissingParameter("other_layer"))
        ));
    }
}
