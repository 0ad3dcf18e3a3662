//! Gateway configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TIDECART_ORIGIN_URL` - Base URL of the origin application server
//!
//! ## Optional
//! - `TIDECART_HOST` - Bind address (default: 127.0.0.1)
//! - `TIDECART_PORT` - Listen port (default: 8080)
//! - `TIDECART_API_PREFIX` - Path prefix the gateway never caches
//!   (default: /api/)
//! - `TIDECART_CACHE_DIR` - Directory holding the cache buckets
//!   (default: ./cache)
//! - `TIDECART_CACHE_VERSION` - Version tag suffixed onto bucket names
//!   (default: v1)
//! - `TIDECART_SHELL_MANIFEST` - Comma-separated shell resource paths to
//!   precache at install
//! - `TIDECART_OFFLINE_DOCUMENT` - Placeholder document path; must be listed
//!   in the shell manifest (default: /offline.html)
//! - `TIDECART_ORIGIN_KEY` - Shared secret forwarded to the origin as a
//!   trust header
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Shell resources precached when no manifest is configured.
const DEFAULT_SHELL_MANIFEST: &str = "/,/offline.html,/manifest.webmanifest,\
/static/css/site.css,/static/js/storefront.js,/static/images/logo.svg";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Gateway application configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// IP address to bind the gateway to.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Base URL of the origin application server.
    pub origin_url: Url,
    /// Path prefix that is proxied straight through, never cached here.
    pub api_prefix: String,
    /// Directory holding the versioned cache buckets.
    pub cache_dir: PathBuf,
    /// Version tag suffixed onto bucket names; bump to retire old buckets.
    pub cache_version: String,
    /// Shell resource paths fetched into the app-shell bucket at install.
    pub shell_manifest: Vec<String>,
    /// Placeholder document served for failed navigations.
    pub offline_document: String,
    /// Shared secret forwarded to the origin (`secrecy` keeps it out of
    /// Debug output).
    pub origin_key: Option<SecretString>,
    /// Sentry DSN for error tracking.
    pub sentry_dsn: Option<String>,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or any
    /// variable fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("TIDECART_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("TIDECART_HOST".to_owned(), e.to_string()))?;
        let port = get_env_or_default("TIDECART_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("TIDECART_PORT".to_owned(), e.to_string()))?;

        let origin_url = get_required_env("TIDECART_ORIGIN_URL")?;
        let origin_url = parse_origin_url(&origin_url)
            .map_err(|e| ConfigError::InvalidEnvVar("TIDECART_ORIGIN_URL".to_owned(), e))?;

        let api_prefix = get_env_or_default("TIDECART_API_PREFIX", "/api/");
        validate_api_prefix(&api_prefix)
            .map_err(|e| ConfigError::InvalidEnvVar("TIDECART_API_PREFIX".to_owned(), e))?;

        let cache_dir = PathBuf::from(get_env_or_default("TIDECART_CACHE_DIR", "./cache"));
        let cache_version = get_env_or_default("TIDECART_CACHE_VERSION", "v1");
        validate_version_tag(&cache_version)
            .map_err(|e| ConfigError::InvalidEnvVar("TIDECART_CACHE_VERSION".to_owned(), e))?;

        let shell_manifest =
            parse_manifest(&get_env_or_default("TIDECART_SHELL_MANIFEST", DEFAULT_SHELL_MANIFEST))
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("TIDECART_SHELL_MANIFEST".to_owned(), e)
                })?;

        let offline_document = get_env_or_default("TIDECART_OFFLINE_DOCUMENT", "/offline.html");
        if !shell_manifest.contains(&offline_document) {
            return Err(ConfigError::InvalidEnvVar(
                "TIDECART_OFFLINE_DOCUMENT".to_owned(),
                format!("{offline_document} must be listed in the shell manifest"),
            ));
        }

        let origin_key = get_optional_env("TIDECART_ORIGIN_KEY").map(SecretString::from);
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            host,
            port,
            origin_url,
            api_prefix,
            cache_dir,
            cache_version,
            shell_manifest,
            offline_document,
            origin_key,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the gateway.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse and validate the origin base URL.
fn parse_origin_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !url.has_host() {
        return Err("origin URL must have a host".to_owned());
    }
    Ok(url)
}

/// The gateway's pass-through prefix must be a rooted directory-style path.
fn validate_api_prefix(prefix: &str) -> Result<(), String> {
    if !prefix.starts_with('/') {
        return Err("must start with '/'".to_owned());
    }
    if !prefix.ends_with('/') {
        return Err("must end with '/' so it matches whole path segments".to_owned());
    }
    Ok(())
}

/// Version tags become directory name suffixes, so keep them simple.
fn validate_version_tag(tag: &str) -> Result<(), String> {
    if tag.is_empty() {
        return Err("must not be empty".to_owned());
    }
    if !tag
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    {
        return Err("may only contain alphanumerics, '.' and '_'".to_owned());
    }
    Ok(())
}

/// Parse the comma-separated shell manifest into rooted paths.
///
/// Entries are trimmed, empties skipped, duplicates dropped while keeping
/// first-seen order.
fn parse_manifest(raw: &str) -> Result<Vec<String>, String> {
    let mut entries: Vec<String> = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if !entry.starts_with('/') {
            return Err(format!("manifest entry '{entry}' must start with '/'"));
        }
        if !entries.iter().any(|existing| existing == entry) {
            entries.push(entry.to_owned());
        }
    }
    if entries.is_empty() {
        return Err("manifest must list at least one shell resource".to_owned());
    }
    Ok(entries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn sample_config() -> GatewayConfig {
        GatewayConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 8080,
            origin_url: Url::parse("http://localhost:3000").unwrap(),
            api_prefix: "/api/".to_owned(),
            cache_dir: PathBuf::from("./cache"),
            cache_version: "v1".to_owned(),
            shell_manifest: vec!["/".to_owned(), "/offline.html".to_owned()],
            offline_document: "/offline.html".to_owned(),
            origin_key: Some(SecretString::from("super-secret-origin-key")),
            sentry_dsn: None,
        }
    }

    #[test]
    fn test_parse_manifest_trims_and_dedupes() {
        let manifest = parse_manifest("/, /offline.html ,/,/static/css/site.css").unwrap();
        assert_eq!(manifest, vec!["/", "/offline.html", "/static/css/site.css"]);
    }

    #[test]
    fn test_parse_manifest_rejects_relative_entries() {
        assert!(parse_manifest("/,offline.html").is_err());
    }

    #[test]
    fn test_parse_manifest_rejects_empty() {
        assert!(parse_manifest(" , ,").is_err());
    }

    #[test]
    fn test_validate_api_prefix() {
        assert!(validate_api_prefix("/api/").is_ok());
        assert!(validate_api_prefix("api/").is_err());
        assert!(validate_api_prefix("/api").is_err());
    }

    #[test]
    fn test_validate_version_tag() {
        assert!(validate_version_tag("v1").is_ok());
        assert!(validate_version_tag("2026.02").is_ok());
        assert!(validate_version_tag("").is_err());
        assert!(validate_version_tag("v1/../v2").is_err());
    }

    #[test]
    fn test_parse_origin_url_requires_host() {
        assert!(parse_origin_url("http://localhost:3000").is_ok());
        assert!(parse_origin_url("not a url").is_err());
        assert!(parse_origin_url("file:///tmp").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = sample_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_debug_redacts_origin_key() {
        let config = sample_config();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("super-secret-origin-key"));
        // The secret itself is still reachable for the proxy.
        assert_eq!(
            config.origin_key.unwrap().expose_secret(),
            "super-secret-origin-key"
        );
    }
}
