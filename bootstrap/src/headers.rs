//! Merging response headers produced by independent collaborators.
//!
//! Every collaborator of the bootstrap (timings, toast channel, session store)
//! hands back its own `HeaderMap`. These are merged with [`combine_headers`],
//! which appends, so that repeatable headers such as `Set-Cookie` survive the
//! merge. Headers that must be unique are either passed once by the caller or
//! merged with [`combine_headers_override`].

use http::header::{CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue, VARY};

use crate::timing::SERVER_TIMING;

/// Concatenates every (name, value) pair of every source, in source order.
///
/// No deduplication is performed and no header name is treated specially.
/// `None` and empty sources are skipped.
pub fn combine_headers<'a, I>(sources: I) -> HeaderMap
where
    I: IntoIterator<Item = Option<&'a HeaderMap>>,
{
    let mut combined = HeaderMap::new();
    for source in sources.into_iter().flatten() {
        for (name, value) in source {
            combined.append(name, value.clone());
        }
    }
    combined
}

/// Merges sources where a later source replaces all values of a name defined earlier.
pub fn combine_headers_override<'a, I>(sources: I) -> HeaderMap
where
    I: IntoIterator<Item = Option<&'a HeaderMap>>,
{
    let mut combined = HeaderMap::new();
    for source in sources.into_iter().flatten() {
        for name in source.keys() {
            combined.remove(name);
            for value in source.get_all(name) {
                combined.append(name, value.clone());
            }
        }
    }
    combined
}

/// Headers a nested route sends after inheriting from its parent (the bootstrap).
///
/// `Vary` and `Server-Timing` from both are kept, child values first.
/// `Cache-Control` becomes the most conservative of the two.
pub fn pipe_headers(parent: &HeaderMap, child: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for name in [VARY, SERVER_TIMING] {
        append_all(&mut headers, child, &name);
        append_all(&mut headers, parent, &name);
    }

    if let Some(cache_control) =
        conservative_cache_control(parent.get(CACHE_CONTROL), child.get(CACHE_CONTROL))
    {
        headers.insert(CACHE_CONTROL, cache_control);
    }

    headers
}

fn append_all(target: &mut HeaderMap, source: &HeaderMap, name: &HeaderName) {
    for value in source.get_all(name) {
        target.append(name, value.clone());
    }
}

#[derive(Debug, Default, PartialEq)]
struct CacheControl {
    no_store: bool,
    no_cache: bool,
    private: bool,
    public: bool,
    max_age: Option<u64>,
}

impl CacheControl {
    fn parse(value: &HeaderValue) -> Self {
        let mut parsed = CacheControl::default();
        let Ok(value) = value.to_str() else {
            // unreadable directives are treated as the strictest policy
            parsed.no_store = true;
            return parsed;
        };

        for directive in value.split(',').map(|d| d.trim().to_ascii_lowercase()) {
            match directive.split_once('=') {
                Some(("max-age", secs)) => parsed.max_age = secs.trim().parse().ok(),
                _ => match directive.as_str() {
                    "no-store" => parsed.no_store = true,
                    "no-cache" => parsed.no_cache = true,
                    "private" => parsed.private = true,
                    "public" => parsed.public = true,
                    _ => {}
                },
            }
        }
        parsed
    }

    fn merge(self, other: Self) -> Self {
        let private = self.private || other.private;
        CacheControl {
            no_store: self.no_store || other.no_store,
            no_cache: self.no_cache || other.no_cache,
            private,
            public: !private && (self.public || other.public),
            max_age: match (self.max_age, other.max_age) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }

    fn render(&self) -> String {
        if self.no_store {
            return "no-store".to_string();
        }

        let mut directives = Vec::new();
        if self.no_cache {
            directives.push("no-cache".to_string());
        }
        if self.private {
            directives.push("private".to_string());
        } else if self.public {
            directives.push("public".to_string());
        }
        if let Some(max_age) = self.max_age {
            directives.push(format!("max-age={max_age}"));
        }
        directives.join(", ")
    }
}

fn conservative_cache_control(
    parent: Option<&HeaderValue>,
    child: Option<&HeaderValue>,
) -> Option<HeaderValue> {
    match (parent, child) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(parent), Some(child)) => {
            let merged = CacheControl::parse(parent).merge(CacheControl::parse(child));
            HeaderValue::from_str(&merged.render()).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONTENT_TYPE, SET_COOKIE};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    fn values<'a>(map: &'a HeaderMap, name: &str) -> Vec<&'a str> {
        map.get_all(name)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_combine_keeps_every_set_cookie() {
        let a = headers(&[("set-cookie", "a=1"), ("set-cookie", "b=2")]);
        let b = headers(&[("set-cookie", "c=3"), ("server-timing", "x;dur=1.0")]);

        let combined = combine_headers([Some(&a), Some(&b)]);

        assert_eq!(values(&combined, "set-cookie"), vec!["a=1", "b=2", "c=3"]);
        assert_eq!(combined.get_all(SET_COOKIE).iter().count(), 3);
        assert_eq!(values(&combined, "server-timing"), vec!["x;dur=1.0"]);
        assert_eq!(combined.len(), 4);
    }

    #[test]
    fn test_combine_does_not_deduplicate() {
        let a = headers(&[("content-type", "text/html")]);
        let combined = combine_headers([Some(&a), Some(&a)]);
        assert_eq!(
            values(&combined, "content-type"),
            vec!["text/html", "text/html"]
        );
    }

    #[test]
    fn test_combine_skips_absent_and_empty() {
        let empty = HeaderMap::new();
        let a = headers(&[("vary", "Cookie")]);

        let combined = combine_headers([None, Some(&empty), Some(&a), None]);
        assert_eq!(combined.len(), 1);

        assert!(combine_headers(Vec::<Option<&HeaderMap>>::new()).is_empty());
    }

    #[test]
    fn test_override_mode() {
        let a = headers(&[
            ("cache-control", "max-age=60"),
            ("set-cookie", "a=1"),
            ("set-cookie", "b=2"),
        ]);
        let b = headers(&[("cache-control", "no-store"), ("content-type", "text/plain")]);

        let combined = combine_headers_override([Some(&a), None, Some(&b)]);

        assert_eq!(values(&combined, "cache-control"), vec!["no-store"]);
        assert_eq!(values(&combined, "set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(combined.get(CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn test_pipe_headers() {
        let parent = headers(&[
            ("server-timing", "root_loader;dur=5.0"),
            ("cache-control", "public, max-age=300"),
            ("set-cookie", "en_toast=; Max-Age=0"),
        ]);
        let child = headers(&[
            ("server-timing", "notes;dur=2.0"),
            ("cache-control", "private, max-age=60"),
            ("vary", "Cookie"),
        ]);

        let piped = pipe_headers(&parent, &child);

        assert_eq!(
            values(&piped, "server-timing"),
            vec!["notes;dur=2.0", "root_loader;dur=5.0"]
        );
        assert_eq!(values(&piped, "vary"), vec!["Cookie"]);
        assert_eq!(values(&piped, "cache-control"), vec!["private, max-age=60"]);
        // cookies are the bootstrap's own business
        assert!(piped.get(SET_COOKIE).is_none());
    }

    #[test]
    fn test_conservative_cache_control() {
        let merge = |a: &'static str, b: &'static str| {
            conservative_cache_control(
                Some(&HeaderValue::from_static(a)),
                Some(&HeaderValue::from_static(b)),
            )
            .unwrap()
        };

        assert_eq!(merge("public, max-age=300", "no-store"), "no-store");
        assert_eq!(merge("public, max-age=300", "public, max-age=30"), "public, max-age=30");
        assert_eq!(merge("no-cache", "public"), "no-cache, public");
        assert_eq!(merge("max-age=10", "private"), "private, max-age=10");

        let only = HeaderValue::from_static("max-age=5");
        assert_eq!(conservative_cache_control(None, Some(&only)).unwrap(), "max-age=5");
        assert!(conservative_cache_control(None, None).is_none());
    }
}
