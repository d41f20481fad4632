use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::warn;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STATIC_ROOT: &str = "static";
const DEFAULT_UPLOAD_ROOT: &str = "static/uploads";
const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ADMIN_PASSWORD: &str = "password123";

pub const SEED_ADMIN_USERNAME: &str = "admin";
pub const SEED_ADMIN_EMAIL: &str = "admin@example.com";

/// Runtime configuration, assembled once at startup and shared through `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub static_root: PathBuf,
    pub upload_root: PathBuf,
    pub allowed_extensions: Vec<String>,
    pub max_upload_bytes: usize,
    pub max_connections: u32,
    pub admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database_url = get("DATABASE_URL").context("DATABASE_URL env var is missing")?;

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got `{raw}`"))?,
            None => DEFAULT_PORT,
        };

        let static_root = get("STATIC_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_ROOT));

        let upload_root = get("UPLOAD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_ROOT));

        let allowed_extensions = match get("ALLOWED_EXTENSIONS") {
            Some(raw) => parse_extensions(&raw)?,
            None => DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("MAX_UPLOAD_BYTES must be a byte count, got `{raw}`"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().with_context(|| {
                format!("DATABASE_MAX_CONNECTIONS must be a positive integer, got `{raw}`")
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let admin_password = match get("ADMIN_PASSWORD") {
            Some(password) => password,
            None => {
                warn!("ADMIN_PASSWORD is not set; falling back to the built-in default");
                DEFAULT_ADMIN_PASSWORD.to_string()
            }
        };

        Ok(Self {
            database_url,
            port,
            static_root,
            upload_root,
            allowed_extensions,
            max_upload_bytes,
            max_connections,
            admin_password,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse_extensions(raw: &str) -> Result<Vec<String>> {
    let extensions: Vec<String> = raw
        .split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();

    if extensions.is_empty() {
        return Err(anyhow!("ALLOWED_EXTENSIONS must list at least one extension"));
    }

    Ok(extensions)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/museum")]))
            .expect("config");

        assert_eq!(config.database_url, "postgres://db/museum");
        assert_eq!(config.port, 8080);
        assert_eq!(config.static_root, PathBuf::from("static"));
        assert_eq!(config.upload_root, PathBuf::from("static/uploads"));
        assert_eq!(config.allowed_extensions, vec!["jpg", "jpeg", "png", "gif"]);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.admin_password, "password123");
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "9000")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn blank_database_url_counts_as_missing() {
        assert!(AppConfig::from_lookup(lookup(&[("DATABASE_URL", "   ")])).is_err());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/museum"),
            ("PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn extensions_are_normalized() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/museum"),
            ("ALLOWED_EXTENSIONS", " .PNG, webp ,,"),
        ]))
        .expect("config");

        assert_eq!(config.allowed_extensions, vec!["png", "webp"]);
    }

    #[test]
    fn overrides_are_honoured() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/museum"),
            ("PORT", "3000"),
            ("UPLOAD_ROOT", "/srv/uploads"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("ADMIN_PASSWORD", "s3cret"),
        ]))
        .expect("config");

        assert_eq!(config.bind_addr().port(), 3000);
        assert_eq!(config.upload_root, PathBuf::from("/srv/uploads"));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.admin_password, "s3cret");
    }
}
