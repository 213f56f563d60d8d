//! Request parsing shared by the handlers.

use axum::extract::Multipart;

use crate::domain::upload;

/// All parts of a multipart submission, in submission order.
#[derive(Debug, Default)]
pub struct SubmittedForm {
    parts: Vec<(String, Vec<u8>)>,
}

impl SubmittedForm {
    pub async fn collect(mut multipart: Multipart) -> crate::Result<Self> {
        let mut parts = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            parts.push((name, data.to_vec()));
        }
        Ok(Self { parts })
    }

    #[cfg(test)]
    pub fn from_parts(parts: &[(&str, &[u8])]) -> Self {
        Self {
            parts: parts
                .iter()
                .map(|(name, data)| (name.to_string(), data.to_vec()))
                .collect(),
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(name, _)| name.as_str())
    }

    /// Removes and returns the first part with this name.
    pub fn take_file(&mut self, name: &str) -> Option<Vec<u8>> {
        let idx = self.parts.iter().position(|(n, _)| n == name)?;
        Some(self.parts.remove(idx).1)
    }

    pub fn require_file(&mut self, name: &'static str) -> crate::Result<Vec<u8>> {
        self.take_file(name).ok_or(crate::Error::MissingField(name))
    }

    /// The first value with this name as trimmed text; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.texts(name).into_iter().next()
    }

    pub fn require_text(&self, name: &'static str) -> crate::Result<String> {
        self.text(name).ok_or(crate::Error::MissingField(name))
    }

    /// Every non-blank value with this name.
    pub fn texts(&self, name: &str) -> Vec<String> {
        self.parts
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, data)| String::from_utf8_lossy(data).trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.text(name)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"))
            .unwrap_or(false)
    }

    pub fn layer_metadata(&self) -> crate::Result<crate::domain::model::NewLayer> {
        Ok(crate::domain::model::NewLayer {
            name: self.require_text(upload::LAYER_NAME)?,
            description: self.text(upload::LAYER_DESCRIPTION),
            attribution: self.text(upload::LAYER_ATTRIBUTION),
            attribution_url: self.text(upload::LAYER_ATTRIBUTION_URL),
            private: self.flag(upload::LAYER_PRIVATE),
        })
    }
}

/// Values of a query parameter that may repeat (`?key=a&key=b`). Comma-separated values
/// are split as well.
pub fn repeated_param(raw_query: Option<&str>, name: &str) -> Vec<String> {
    let Some(raw) = raw_query else {
        return Vec::new();
    };
    url::form_urlencoded::parse(raw.as_bytes())
        .filter(|(k, _)| k == name)
        .flat_map(|(_, v)| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// The first value of a query parameter.
pub fn single_param(raw_query: Option<&str>, name: &str) -> Option<String> {
    repeated_param(raw_query, name).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_are_collected_in_order() {
        let query = Some("key=03403&key=03241,09162&other=x&key=");
        assert_eq!(
            repeated_param(query, "key"),
            vec!["03403", "03241", "09162"]
        );
        assert!(repeated_param(None, "key").is_empty());
        assert_eq!(single_param(Some("relation=within"), "relation").as_deref(), Some("within"));
    }

    #[test]
    fn percent_encoding_is_decoded() {
        assert_eq!(
            repeated_param(Some("other_layer=federal%20states"), "other_layer"),
            vec!["federal states"]
        );
    }

    #[test]
    fn form_values_are_trimmed_and_taken() {
        let mut form = SubmittedForm::from_parts(&[
            ("layer-name", &b" Districts "[..]),
            ("layer-private", &b"TRUE"[..]),
            ("additional-property", &b"EWZ"[..]),
            ("additional-property", &b" "[..]),
            ("additional-property", &b"KFL"[..]),
            ("archive", &b"PK.."[..]),
        ]);
        let layer = form.layer_metadata().unwrap();
        assert_eq!(layer.name, "Districts");
        assert!(layer.private);
        assert_eq!(form.texts("additional-property"), vec!["EWZ", "KFL"]);
        assert_eq!(form.take_file("archive").unwrap(), b"PK..");
        assert!(form.take_file("archive").is_none());
        assert!(matches!(form.require_file("shp"), Err(crate::Error::MissingField("shp"))));
    }
}
