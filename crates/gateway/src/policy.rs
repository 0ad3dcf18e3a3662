//! Request classification: which cache policy governs a request.
//!
//! Classification runs on every intercepted request, so it stays string
//! cheap: prefix check, extension sniff, one Accept-header scan.

use crate::buckets::BucketPurpose;

/// Extensions that get an image placeholder instead of a plain
/// "unavailable" body when neither cache nor origin can serve them.
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico",
];

/// What the dispatch loop does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Under the API prefix: proxied through, never cached at this tier.
    Api,
    /// A top-level document load: network-first against the app-shell
    /// bucket.
    Navigation,
    /// Any other resource: cache-first against the runtime bucket.
    Resource,
}

impl RequestClass {
    /// The bucket a class is cached in, if it is cached at all.
    #[must_use]
    pub const fn bucket(self) -> Option<BucketPurpose> {
        match self {
            Self::Api => None,
            Self::Navigation => Some(BucketPurpose::AppShell),
            Self::Resource => Some(BucketPurpose::Runtime),
        }
    }
}

/// Classify a request from its path and Accept header.
///
/// A request is a navigation when it isn't asking for a file (no extension
/// on the last path segment) or when the client explicitly accepts HTML.
#[must_use]
pub fn classify(path: &str, accept: Option<&str>, api_prefix: &str) -> RequestClass {
    if path.starts_with(api_prefix) {
        return RequestClass::Api;
    }
    if accepts_html(accept) || !has_file_extension(path) {
        return RequestClass::Navigation;
    }
    RequestClass::Resource
}

/// Whether a failed resource should be substituted with an image
/// placeholder.
#[must_use]
pub fn is_image_path(path: &str) -> bool {
    file_extension(path)
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn accepts_html(accept: Option<&str>) -> bool {
    accept.is_some_and(|value| value.contains("text/html"))
}

fn file_extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

fn has_file_extension(path: &str) -> bool {
    file_extension(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const API_PREFIX: &str = "/api/";

    #[test]
    fn test_api_prefix_wins_over_everything() {
        assert_eq!(
            classify("/api/products", Some("text/html"), API_PREFIX),
            RequestClass::Api
        );
        assert_eq!(classify("/api/account", None, API_PREFIX), RequestClass::Api);
    }

    #[test]
    fn test_extensionless_paths_are_navigations() {
        assert_eq!(classify("/", None, API_PREFIX), RequestClass::Navigation);
        assert_eq!(
            classify("/products/driftwood-candle", None, API_PREFIX),
            RequestClass::Navigation
        );
    }

    #[test]
    fn test_html_accepting_requests_are_navigations() {
        assert_eq!(
            classify(
                "/download/catalog.pdf",
                Some("text/html,application/xhtml+xml"),
                API_PREFIX
            ),
            RequestClass::Navigation
        );
    }

    #[test]
    fn test_asset_paths_are_resources() {
        assert_eq!(
            classify("/static/css/site.css", Some("text/css,*/*;q=0.1"), API_PREFIX),
            RequestClass::Resource
        );
        assert_eq!(
            classify("/static/images/logo.svg", None, API_PREFIX),
            RequestClass::Resource
        );
    }

    #[test]
    fn test_bucket_mapping() {
        assert_eq!(RequestClass::Api.bucket(), None);
        assert_eq!(
            RequestClass::Navigation.bucket(),
            Some(crate::buckets::BucketPurpose::AppShell)
        );
        assert_eq!(
            RequestClass::Resource.bucket(),
            Some(crate::buckets::BucketPurpose::Runtime)
        );
    }

    #[test]
    fn test_image_extension_detection() {
        assert!(is_image_path("/static/images/hero.JPG"));
        assert!(is_image_path("/static/images/logo.svg"));
        assert!(!is_image_path("/static/css/site.css"));
        assert!(!is_image_path("/products/42"));
        assert!(!is_image_path("/.hidden"));
    }
}
