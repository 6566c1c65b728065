use http::header::{COOKIE, HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Attributes shared by every cookie this service sets.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CookieOptions {
    /// Adds the `Secure` attribute. Should be on everywhere but local development.
    #[serde(default)]
    pub secure: bool,
}

/// Raw `name=value` pairs of every `Cookie` header, in the order the client sent them.
pub fn raw_pairs(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
}

pub fn iter_cookies(headers: &HeaderMap) -> impl Iterator<Item = (&str, &str)> {
    raw_pairs(headers).filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some((name.trim(), value))
    })
}

/// Value of the first cookie called `name`.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    iter_cookies(headers).find_map(|(n, v)| (n == name).then_some(v))
}

/// The untouched `name=value` pair of the first cookie called `name`.
pub fn raw_cookie_pair<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    raw_pairs(headers).find(|pair| {
        pair.split_once('=')
            .is_some_and(|(n, _)| n.trim() == name)
    })
}

/// Builder for one `Set-Cookie` header value. Cookies are always `HttpOnly` and `SameSite=Lax`.
#[derive(Clone, Debug)]
pub struct SetCookie {
    name: String,
    value: String,
    path: String,
    max_age: Option<Duration>,
    expired: bool,
    secure: bool,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            max_age: None,
            expired: false,
            secure: false,
        }
    }

    /// A cookie that makes the client drop `name` immediately.
    pub fn expired(name: impl Into<String>) -> Self {
        let mut cookie = Self::new(name, "");
        cookie.expired = true;
        cookie
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_options(mut self, options: &CookieOptions) -> Self {
        self.secure = options.secure;
        self
    }

    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_string())
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if self.expired {
            f.write_str("; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT")?;
        } else if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age.as_secs())?;
        }
        f.write_str("; HttpOnly")?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        f.write_str("; SameSite=Lax")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_headers(cookies: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(COOKIE, HeaderValue::from_static(*cookie));
        }
        headers
    }

    #[test]
    fn test_parse_cookie_headers() {
        let headers = request_headers(&[
            "en_theme=dark; CH-time-zone=Europe%2FBerlin",
            "wagmi.store={\"state\":1}; quoted=\"abc\";;",
        ]);

        let pairs: Vec<_> = iter_cookies(&headers).collect();
        assert_eq!(
            pairs,
            vec![
                ("en_theme", "dark"),
                ("CH-time-zone", "Europe%2FBerlin"),
                ("wagmi.store", "{\"state\":1}"),
                ("quoted", "abc"),
            ]
        );

        assert_eq!(get_cookie(&headers, "en_theme"), Some("dark"));
        assert_eq!(get_cookie(&headers, "missing"), None);
        assert_eq!(
            raw_cookie_pair(&headers, "wagmi.store"),
            Some("wagmi.store={\"state\":1}")
        );
    }

    #[test]
    fn test_first_cookie_wins() {
        let headers = request_headers(&["a=1; a=2"]);
        assert_eq!(get_cookie(&headers, "a"), Some("1"));
    }

    #[test]
    fn test_set_cookie_format() {
        let cookie = SetCookie::new("en_session", "abc.def")
            .max_age(Duration::from_secs(3600))
            .with_options(&CookieOptions { secure: true });
        assert_eq!(
            cookie.to_string(),
            "en_session=abc.def; Path=/; Max-Age=3600; HttpOnly; Secure; SameSite=Lax"
        );

        let cleared = SetCookie::expired("en_toast").to_header_value().unwrap();
        assert_eq!(
            cleared,
            "en_toast=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        assert!(SetCookie::new("x", "line\nbreak").to_header_value().is_err());
    }
}
