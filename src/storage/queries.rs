//! Named SQL queries loaded from `resources/queries.sql`.
//!
//! The file holds `-- name: <key>` blocks. Templates may contain a `{table}`
//! placeholder, which is only ever replaced by an identifier that passed
//! [`validate_ident`](super::validate_ident).

use std::collections::HashMap;

const BUNDLED: &str = include_str!("../../resources/queries.sql");
const NAME_MARKER: &str = "-- name:";
const TABLE_PLACEHOLDER: &str = "{table}";

#[derive(Debug, Clone, Default)]
pub struct QueryRepository {
    queries: HashMap<String, String>,
}

impl QueryRepository {
    /// The queries compiled into the binary.
    pub fn bundled() -> crate::Result<Self> {
        Self::parse(BUNDLED)
    }

    pub fn parse(source: &str) -> crate::Result<Self> {
        let mut queries = HashMap::new();
        let mut current: Option<(String, Vec<&str>)> = None;

        for line in source.lines() {
            if let Some(name) = line.trim().strip_prefix(NAME_MARKER) {
                if let Some((name, body)) = current.take() {
                    insert(&mut queries, name, &body)?;
                }
                current = Some((name.trim().to_string(), Vec::new()));
            } else if let Some((_, body)) = current.as_mut() {
                body.push(line);
            }
        }
        if let Some((name, body)) = current.take() {
            insert(&mut queries, name, &body)?;
        }
        Ok(Self { queries })
    }

    pub fn raw(&self, name: &str) -> crate::Result<&str> {
        self.queries
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| crate::Error::UnknownQuery(name.to_string()))
    }

    /// The query with `{table}` replaced by `table`.
    pub fn render(&self, name: &str, table: &str) -> crate::Result<String> {
        if !super::validate_ident(table) {
            return Err(crate::Error::InvalidIdentifier(table.to_string()));
        }
        Ok(self.raw(name)?.replace(TABLE_PLACEHOLDER, table))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.queries.len()
    }
}

fn insert(queries: &mut HashMap<String, String>, name: String, body: &[&str]) -> crate::Result<()> {
    let text = body.join("\n").trim().to_string();
    if name.is_empty() || text.is_empty() {
        return Err(crate::Error::Internal(anyhow::anyhow!(
            "malformed query block '{}'",
            name
        )));
    }
    if queries.insert(name.clone(), text).is_some() {
        return Err(crate::Error::Internal(anyhow::anyhow!(
            "query '{}' is defined twice",
            name
        )));
    }
    Ok(())
}
