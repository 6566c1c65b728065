//! Client hints reported by the browser through `CH-*` cookies.
//!
//! A small inline script on the client keeps these cookies in sync with the
//! browser's media queries and time zone. Every hint has a fallback that is
//! used until the cookie has been set.

use http::header::HeaderMap;
use serde::Serialize;

use crate::cookies;

pub const COLOR_SCHEME_COOKIE: &str = "CH-prefers-color-scheme";
pub const TIME_ZONE_COOKIE: &str = "CH-time-zone";
pub const REDUCED_MOTION_COOKIE: &str = "CH-reduced-motion";

const DEFAULT_TIME_ZONE: &str = "UTC";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReducedMotion {
    Reduce,
    #[default]
    NoPreference,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientHints {
    pub theme: ColorScheme,
    pub time_zone: String,
    pub reduced_motion: ReducedMotion,
}

impl Default for ClientHints {
    fn default() -> Self {
        Self {
            theme: ColorScheme::default(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            reduced_motion: ReducedMotion::default(),
        }
    }
}

pub fn get_hints(headers: &HeaderMap) -> ClientHints {
    let theme = match cookies::get_cookie(headers, COLOR_SCHEME_COOKIE) {
        Some("dark") => ColorScheme::Dark,
        _ => ColorScheme::Light,
    };

    let reduced_motion = match cookies::get_cookie(headers, REDUCED_MOTION_COOKIE) {
        Some("reduce") => ReducedMotion::Reduce,
        _ => ReducedMotion::NoPreference,
    };

    let time_zone = cookies::get_cookie(headers, TIME_ZONE_COOKIE)
        .map(decode_component)
        .filter(|tz| !tz.is_empty())
        .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string());

    ClientHints {
        theme,
        time_zone,
        reduced_motion,
    }
}

/// Percent-decodes a cookie value written with `encodeURIComponent`.
fn decode_component(value: &str) -> String {
    // form decoding turns `+` into a space, which encodeURIComponent never produces
    let escaped = value.replace('+', "%2B");
    url::form_urlencoded::parse(format!("v={escaped}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}
