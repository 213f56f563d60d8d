//! Resolution of projection descriptors (`.prj` contents) into EPSG codes.

use async_trait::async_trait;

/// Output formats understood by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrsFormat {
    Epsg,
    Proj4,
}

impl SrsFormat {
    pub fn as_arg(self) -> &'static str {
        match self {
            SrsFormat::Epsg => "epsg",
            SrsFormat::Proj4 => "proj4",
        }
    }
}

/// Translates a projection descriptor into another representation.
///
/// Implementations fail closed: anything that is not a clean answer is
/// [`crate::Error::NoEpsgCodeFound`].
#[async_trait]
pub trait SpatialReferenceResolver: Send + Sync {
    async fn resolve(&self, descriptor: &str, format: SrsFormat) -> crate::Result<String>;
}

/// Parses resolver output such as `EPSG:4326\n` into `4326`.
pub fn parse_epsg_code(output: &str) -> crate::Result<i32> {
    let normalized = output.trim().to_lowercase();
    let code = normalized.strip_prefix("epsg:").unwrap_or(&normalized);
    code.trim()
        .parse::<i32>()
        .map_err(|_| crate::Error::NoEpsgCodeFound(output.trim().to_string()))
}

/// Resolves the EPSG code of a projection, failing with `NoProjectionProvided` when
/// there is nothing to resolve.
pub async fn resolve_epsg(
    resolver: &dyn SpatialReferenceResolver,
    projection: Option<&str>,
) -> crate::Result<i32> {
    let descriptor = projection
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or(crate::Error::NoProjectionProvided)?;
    let output = resolver.resolve(descriptor, SrsFormat::Epsg).await?;
    parse_epsg_code(&output)
}

/// Best-effort resolution used for reporting only; failures are logged and dropped.
pub async fn describe(
    resolver: &dyn SpatialReferenceResolver,
    projection: Option<&str>,
) -> (Option<i32>, Option<String>) {
    let Some(descriptor) = projection else {
        return (None, None);
    };
    let epsg = match resolve_epsg(resolver, Some(descriptor)).await {
        Ok(code) => Some(code),
        Err(e) => {
            tracing::debug!(error = %e, "projection has no EPSG code");
            None
        }
    };
    let proj4 = match resolver.resolve(descriptor, SrsFormat::Proj4).await {
        Ok(out) => Some(out.trim().to_string()).filter(|s| !s.is_empty()),
        Err(e) => {
            tracing::debug!(error = %e, "projection has no proj4 rendering");
            None
        }
    };
    (epsg, proj4)
}
