//! Rules specific to the public API host: CORS and API version checks.

use axum::http::header::{self, HeaderMap, HeaderValue};

const CORS_HEADERS: [(header::HeaderName, &str); 5] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "*"),
    (header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "Content-Type, Authorization, sentry-trace, User-Agent",
    ),
    (header::ACCESS_CONTROL_MAX_AGE, "86400"),
];

/// Add the CORS headers sent on every API response.
pub fn apply_cors(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

/// What the version check says about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    Ok,
    /// The path targets a retired API version.
    Deprecated,
    /// A v1-style path sent to the v2 API.
    InvalidPath,
}

/// Classify a request path on the API host.
pub fn check_version(path: &str) -> VersionCheck {
    if path.starts_with("/v1") {
        VersionCheck::Deprecated
    } else if is_v1_path_on_v2(path) {
        VersionCheck::InvalidPath
    } else {
        VersionCheck::Ok
    }
}

fn is_v1_path_on_v2(path: &str) -> bool {
    ["/v2/s/", "/v2/m/", "/v2/a/", "/v2/msg/"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
        || path == "/v2/s"
        || path == "/v2/m"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_check() {
        assert_eq!(check_version("/v1/s/abcde"), VersionCheck::Deprecated);
        assert_eq!(check_version("/v1"), VersionCheck::Deprecated);
        assert_eq!(check_version("/v2/s/abcde"), VersionCheck::InvalidPath);
        assert_eq!(check_version("/v2/msg/123"), VersionCheck::InvalidPath);
        assert_eq!(check_version("/v2/m"), VersionCheck::InvalidPath);
        assert_eq!(check_version("/v2/systems/abcde"), VersionCheck::Ok);
        assert_eq!(check_version("/v2/members"), VersionCheck::Ok);
        assert_eq!(check_version("/v2/switches"), VersionCheck::Ok);
        assert_eq!(check_version("/private/meta"), VersionCheck::Ok);
    }

    #[test]
    fn test_cors_headers() {
        let mut headers = HeaderMap::new();
        apply_cors(&mut headers);
        assert_eq!(headers.len(), 5);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }
}
