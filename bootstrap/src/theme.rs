use http::header::HeaderMap;
use serde::Serialize;

use crate::cookies;

pub const THEME_COOKIE: &str = "en_theme";

/// A theme the user picked explicitly. No cookie means "follow the system".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

pub fn get_theme(headers: &HeaderMap) -> Option<Theme> {
    match cookies::get_cookie(headers, THEME_COOKIE)? {
        "light" => Some(Theme::Light),
        "dark" => Some(Theme::Dark),
        _ => None,
    }
}
