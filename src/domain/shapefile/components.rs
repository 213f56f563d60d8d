//! Locating the shapefile components, either from separate uploads or inside a zip archive.

use std::io::{Cursor, Read};

/// The raw files that make up one shapefile.
#[derive(Debug, Clone, Default)]
pub struct ShapefileComponents {
    pub shp: Vec<u8>,
    pub shx: Vec<u8>,
    pub dbf: Vec<u8>,
    pub prj: Option<Vec<u8>>,
    pub cpg: Option<Vec<u8>>,
}

impl ShapefileComponents {
    /// Unpacks a zip archive, taking the first entry for each known extension.
    ///
    /// Every extracted entry is capped at `max_entry_bytes`; the sizes declared inside the
    /// archive are never trusted.
    pub fn from_archive(archive: &[u8], max_entry_bytes: u64) -> crate::Result<Self> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;

        let mut shp = None;
        let mut shx = None;
        let mut dbf = None;
        let mut prj = None;
        let mut cpg = None;

        for idx in 0..zip.len() {
            let mut entry = zip.by_index(idx)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            // Finder leaves resource forks with the same extensions next to the real files.
            if name.starts_with("__MACOSX/") || name.rsplit('/').next().is_some_and(|n| n.starts_with("._")) {
                continue;
            }
            let slot = match extension(&name).as_deref() {
                Some("shp") => &mut shp,
                Some("shx") => &mut shx,
                Some("dbf") => &mut dbf,
                Some("prj") => &mut prj,
                Some("cpg") => &mut cpg,
                _ => continue,
            };
            if slot.is_some() {
                tracing::debug!(entry = %name, "ignoring duplicate shapefile component");
                continue;
            }
            *slot = Some(extract(&mut entry, &name, max_entry_bytes)?);
        }

        Ok(Self {
            shp: shp.ok_or(crate::Error::ArchiveMissingComponent("shp"))?,
            shx: shx.ok_or(crate::Error::ArchiveMissingComponent("shx"))?,
            dbf: dbf.ok_or(crate::Error::ArchiveMissingComponent("dbf"))?,
            prj,
            cpg,
        })
    }

    /// The projection descriptor as text, if a non-empty `.prj` was supplied.
    pub fn projection(&self) -> Option<String> {
        self.prj
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// The code page label from the `.cpg` file (e.g. `UTF-8`, `1252`).
    pub fn code_page(&self) -> Option<String> {
        self.cpg
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

fn extract(entry: &mut impl Read, name: &str, max_entry_bytes: u64) -> crate::Result<Vec<u8>> {
    let mut buf = Vec::new();
    entry
        .take(max_entry_bytes.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| crate::Error::Decode(format!("unable to extract '{}': {}", name, e)))?;
    if buf.len() as u64 > max_entry_bytes {
        return Err(crate::Error::Decode(format!(
            "'{}' extracts to more than {} bytes",
            name, max_entry_bytes
        )));
    }
    Ok(buf)
}

fn extension(name: &str) -> Option<String> {
    let file = name.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}
