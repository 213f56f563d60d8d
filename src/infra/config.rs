//! Centralized configuration (environment variables + defaults).
//!
//! Call [`load_dotenv`] once at startup; the accessors read the process environment.

use std::time::Duration;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_GDALSRSINFO: &str = "gdalsrsinfo";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 128 * 1024 * 1024;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_EXTRACTED_BYTES: u64 = 512 * 1024 * 1024;

/// Loads a `.env` file from the working directory if present.
pub fn load_dotenv() {
    dotenv::dotenv().ok();
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e)),
        _ => Ok(default),
    }
}

/// Database URL must be provided (no default).
pub fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))
}

pub fn listen_addr() -> String {
    std::env::var("LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
}

pub fn database_max_connections() -> anyhow::Result<u32> {
    Ok(parsed("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?.max(1))
}

/// Path or name of the `gdalsrsinfo` executable.
pub fn gdalsrsinfo_path() -> String {
    std::env::var("GDALSRSINFO_PATH").unwrap_or_else(|_| DEFAULT_GDALSRSINFO.to_string())
}

/// Upper bound for request bodies (shapefile uploads).
pub fn max_upload_bytes() -> anyhow::Result<usize> {
    parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)
}

/// Upper bound for one file extracted from an uploaded archive.
pub fn max_extracted_bytes() -> anyhow::Result<u64> {
    parsed("MAX_EXTRACTED_BYTES", DEFAULT_MAX_EXTRACTED_BYTES)
}

pub fn request_timeout() -> anyhow::Result<Duration> {
    parsed("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(parsed("GEODATA_TEST_UNSET_VARIABLE", 7u32).unwrap(), 7);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        std::env::set_var("GEODATA_TEST_BAD_NUMBER", "many");
        let err = parsed("GEODATA_TEST_BAD_NUMBER", 1u64).unwrap_err();
        assert!(err.to_string().contains("GEODATA_TEST_BAD_NUMBER"));
        std::env::remove_var("GEODATA_TEST_BAD_NUMBER");
    }
}
