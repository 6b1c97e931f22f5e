//! `Refresh` header handling.
//!
//! Servers that cannot (or will not) send a real redirect sometimes answer with
//! `Refresh: 0; url=/next`. The same `name=token` shape shows up in
//! `Content-Disposition: attachment; filename="x.pdf"`, so one parser serves both.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::error::FetchError;

/// `filename=` or `url=` followed by the rest of the header value.
#[allow(clippy::expect_used)]
static FILENAME_OR_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(filename|url)=(.*)").expect("filename/url regex is valid") // Static pattern, safe to panic
});

/// Returns the token following `filename=` or `url=` in a header value.
///
/// Everything after the `=` up to the end of the value is the token. One layer
/// of matching double quotes, then one layer of matching single quotes, is
/// stripped. Returns `None` when the pattern is absent or the token is empty.
///
/// ```
/// use urlfetch_core::fetch::parse_filename_or_url;
///
/// assert_eq!(parse_filename_or_url("0; url='/d'").as_deref(), Some("/d"));
/// assert_eq!(parse_filename_or_url("0;"), None);
/// ```
#[must_use]
pub fn parse_filename_or_url(value: &str) -> Option<String> {
    let captures = FILENAME_OR_URL.captures(value)?;
    let mut token = captures.get(2)?.as_str();
    for quote in ['"', '\''] {
        token = strip_quotes(token, quote);
    }
    (!token.is_empty()).then(|| token.to_string())
}

fn strip_quotes(token: &str, quote: char) -> &str {
    token
        .strip_prefix(quote)
        .and_then(|rest| rest.strip_suffix(quote))
        .unwrap_or(token)
}

/// Resolves a refresh target against the URL that returned it.
///
/// `http://`/`https://` targets are used as-is; anything else is appended
/// literally to the current origin (no `.`/`..` normalization beyond what URL
/// parsing itself does).
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] when the resulting string is not a URL.
pub fn resolve_refresh_target(current: &Url, location: &str) -> Result<Url, FetchError> {
    let target = if is_absolute_http(location) {
        location.to_string()
    } else {
        format!("{}{location}", current.origin().ascii_serialization())
    };
    Url::parse(&target).map_err(|_| FetchError::invalid_url(target))
}

fn is_absolute_http(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}
