use http::Uri;
use http::header::{HOST, HeaderMap, HeaderName};
use serde::Serialize;

use crate::client_hints::ClientHints;
use crate::theme::Theme;

const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPrefs {
    pub theme: Option<Theme>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub hints: ClientHints,
    pub origin: String,
    pub path: String,
    pub user_prefs: UserPrefs,
}

/// Origin the client used to reach us, honouring the proxy's forwarding headers.
pub fn get_domain_url(headers: &HeaderMap, uri: &Uri) -> String {
    let header = |name: &HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            // a proxy chain appends, the first entry is the client-facing one
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let host = header(&X_FORWARDED_HOST)
        .or_else(|| header(&HOST))
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    let protocol = header(&X_FORWARDED_PROTO)
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");

    format!("{protocol}://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HeaderValue;

    #[test]
    fn test_domain_url() {
        let uri: Uri = "/users/kody".parse().unwrap();
        assert_eq!(get_domain_url(&HeaderMap::new(), &uri), "http://localhost");

        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("internal:3000"));
        assert_eq!(get_domain_url(&headers, &uri), "http://internal:3000");

        headers.insert(X_FORWARDED_HOST, HeaderValue::from_static("notes.example.com"));
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https, http"));
        assert_eq!(get_domain_url(&headers, &uri), "https://notes.example.com");
    }

    #[test]
    fn test_absolute_uri() {
        let uri: Uri = "https://notes.example.com/".parse().unwrap();
        assert_eq!(
            get_domain_url(&HeaderMap::new(), &uri),
            "https://notes.example.com"
        );
    }
}
