//! Process-local cookie jar scoped by host and path prefix.
//!
//! The jar is deliberately simple: cookies are keyed by hostname, then by the
//! `path` attribute they were issued with, then by name. There is no expiry and
//! no eviction; the jar lives as long as the engine that owns it.
//!
//! # Concurrency
//!
//! Hosts live in a [`DashMap`], so every read or write for a host holds that
//! host's shard lock for its whole duration. Two chains completing against the
//! same host at the same time are serialized, never interleaved.

use std::fmt;

use dashmap::DashMap;
use tracing::{debug, instrument, warn};
use url::Url;

/// Cookie attributes that are never stored as cookies.
const RESERVED_ATTRIBUTES: &[&str] = &[
    "expires",
    "max-age",
    "secure",
    "httponly",
    "samesite",
    "priority",
    "partitioned",
];

/// Cookies for one `path` scope, in first-insertion order.
#[derive(Clone)]
struct PathCookies {
    path: String,
    entries: Vec<(String, String)>,
}

/// Inserts or overwrites `name`, keeping the position of the first insertion.
fn merge_entry(entries: &mut Vec<(String, String)>, name: &str, value: &str) {
    match entries.iter_mut().find(|(existing, _)| existing == name) {
        Some((_, existing)) => value.clone_into(existing),
        None => entries.push((name.to_string(), value.to_string())),
    }
}

/// Host → path → (name → value) cookie store shared by all calls on an engine.
///
/// Wrap in `Arc` to share one jar between several engines.
///
/// # Example
///
/// ```
/// use urlfetch_core::fetch::CookieJar;
/// use url::Url;
///
/// let jar = CookieJar::new();
/// let issued = Url::parse("https://example.com/p/x").unwrap();
/// jar.write_cookie(&issued, ["a=1; path=/p"]);
///
/// let inside = Url::parse("https://example.com/p/y").unwrap();
/// assert_eq!(jar.read_cookie(&inside).as_deref(), Some("a=1"));
///
/// let outside = Url::parse("https://example.com/q").unwrap();
/// assert_eq!(jar.read_cookie(&outside), None);
/// ```
#[derive(Default)]
pub struct CookieJar {
    hosts: DashMap<String, Vec<PathCookies>>,
}

// Values stay out of Debug output.
impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieJar")
            .field("hosts", &self.hosts.len())
            .finish()
    }
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the `cookie` header value for a request to `url`.
    ///
    /// Every stored path that is a prefix of the URL path contributes its
    /// cookies, in the order the paths were first stored. A name seen under
    /// several matching paths keeps its first position and the value from the
    /// last path. Returns `None` when nothing matches.
    #[must_use]
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub fn read_cookie(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        let scopes = self.hosts.get(host)?;

        let mut merged: Vec<(String, String)> = Vec::new();
        for scope in scopes.iter().filter(|scope| url.path().starts_with(&scope.path)) {
            for (name, value) in &scope.entries {
                merge_entry(&mut merged, name, value);
            }
        }
        drop(scopes);

        if merged.is_empty() {
            return None;
        }
        debug!(host, cookies = merged.len(), "attaching stored cookies");
        Some(
            merged
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Stores raw `Set-Cookie` values received from `url`.
    ///
    /// Each value is split on `;`. The `path` attribute selects the scope; a
    /// value without one, or with an empty one, is dropped entirely. `domain` and the standard
    /// attributes (`expires`, `max-age`, `secure`, ...) are ignored; every
    /// other `name=value` segment is stored under (host, path).
    #[instrument(level = "debug", skip(self, set_cookies), fields(url = %url))]
    pub fn write_cookie<'a, I>(&self, url: &Url, set_cookies: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(host) = url.host_str() else {
            warn!("URL has no host; ignoring Set-Cookie");
            return;
        };

        let mut items: Vec<PathCookies> = Vec::new();
        for raw in set_cookies {
            let Some(parsed) = parse_set_cookie(raw) else {
                warn!("Set-Cookie without path attribute dropped");
                continue;
            };
            match items.iter_mut().find(|scope| scope.path == parsed.path) {
                Some(scope) => {
                    for (name, value) in &parsed.entries {
                        merge_entry(&mut scope.entries, name, value);
                    }
                }
                None => items.push(parsed),
            }
        }
        if items.is_empty() {
            return;
        }

        let mut scopes = self.hosts.entry(host.to_string()).or_default();
        for item in items {
            debug!(host, path = %item.path, cookies = item.entries.len(), "storing cookies");
            match scopes.iter_mut().find(|scope| scope.path == item.path) {
                Some(scope) => {
                    for (name, value) in &item.entries {
                        merge_entry(&mut scope.entries, name, value);
                    }
                }
                None => scopes.push(item),
            }
        }
    }

    /// Returns true when no cookie has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Forgets every stored cookie.
    pub fn clear(&self) {
        self.hosts.clear();
    }
}

/// Splits one `Set-Cookie` value into its path scope and cookie pairs.
///
/// Returns `None` when there is no non-empty `path` attribute or no cookie pair.
fn parse_set_cookie(raw: &str) -> Option<PathCookies> {
    let mut path = None;
    let mut entries = Vec::new();

    for segment in raw.split(';').map(str::trim) {
        let Some((name, value)) = segment.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.eq_ignore_ascii_case("path") {
            path = Some(value.trim().to_string());
        } else if name.eq_ignore_ascii_case("domain")
            || name.is_empty()
            || RESERVED_ATTRIBUTES
                .iter()
                .any(|attr| name.eq_ignore_ascii_case(attr))
        {
            continue;
        } else {
            merge_entry(&mut entries, name, value.trim());
        }
    }

    let path = path.filter(|p| !p.is_empty())?;
    if entries.is_empty() {
        return None;
    }
    Some(PathCookies { path, entries })
}
