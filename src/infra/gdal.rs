//! `gdalsrsinfo` process adapter.

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::srs::{SpatialReferenceResolver, SrsFormat};

#[derive(Debug, Clone)]
pub struct GdalSrsInfo {
    program: String,
}

impl GdalSrsInfo {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(crate::infra::config::gdalsrsinfo_path())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs `gdalsrsinfo --version`; used by preflight.
    pub async fn version(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("unable to run {}: {}", self.program, e))?;
        if !output.status.success() {
            anyhow::bail!("{} --version exited with {}", self.program, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// The descriptor is passed positionally, so it must not look like an option.
fn descriptor_argument(descriptor: &str) -> crate::Result<&str> {
    let descriptor = descriptor.trim();
    if descriptor.is_empty() || descriptor.starts_with('-') {
        return Err(crate::Error::NoEpsgCodeFound(format!(
            "'{}' is not a projection descriptor",
            descriptor
        )));
    }
    Ok(descriptor)
}

#[async_trait]
impl SpatialReferenceResolver for GdalSrsInfo {
    async fn resolve(&self, descriptor: &str, format: SrsFormat) -> crate::Result<String> {
        let descriptor = descriptor_argument(descriptor)?;
        let output = Command::new(&self.program)
            .arg(descriptor)
            .arg("-o")
            .arg(format.as_arg())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                tracing::warn!(program = %self.program, error = %e, "unable to start gdalsrsinfo");
                crate::Error::NoEpsgCodeFound(format!("unable to run {}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(status = %output.status, stderr = %stderr.trim(), "gdalsrsinfo failed");
            return Err(crate::Error::NoEpsgCodeFound(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
