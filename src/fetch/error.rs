//! Error types for the fetch module.
//!
//! Every variant carries the URL (or path) it happened at, so a failure deep in
//! a redirect chain still tells the caller which hop broke.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that terminate a fetch or download operation.
///
/// A non-2xx terminal status is *not* represented here: it resolves normally
/// and callers inspect the status themselves.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A 301/302 response arrived without a `Location` header.
    #[error("no redirection to follow from {url}")]
    Redirect {
        /// The URL that answered with the bare redirect.
        url: String,
    },

    /// A `Refresh` header was present but carried no `url=`/`filename=` token.
    #[error("got refresh without URL from {url} (refresh: {header})")]
    Refresh {
        /// The URL whose response carried the header.
        url: String,
        /// The raw header value.
        header: String,
    },

    /// The redirect/refresh chain exceeded the configured hop cap.
    #[error("too many redirects ({max_hops}) while fetching {url}")]
    TooManyRedirects {
        /// The URL the chain would have followed next.
        url: String,
        /// The hop cap that was hit.
        max_hops: usize,
    },

    /// Connection, TLS or body-stream failure at any hop.
    #[error("transport error fetching {url}: {source}")]
    Transport {
        /// The URL of the hop that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The transport timed out, or the caller's deadline elapsed.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL being fetched when time ran out.
        url: String,
    },

    /// The caller's cancellation token fired.
    #[error("fetch of {url} was cancelled")]
    Cancelled {
        /// The URL being fetched when cancellation arrived.
        url: String,
    },

    /// The URL (or a redirect/refresh target) is malformed or not http(s).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL string.
        url: String,
    },

    /// A caller-supplied header name or value is not valid HTTP.
    #[error("invalid request header: {name}")]
    InvalidHeader {
        /// The header name (or raw `name: value` line) that was rejected.
        name: String,
    },

    /// Creating, writing or closing the output sink failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The sink path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The transport client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates a missing-`Location` redirect error.
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::Redirect { url: url.into() }
    }

    /// Creates a refresh-without-URL error.
    pub fn refresh(url: impl Into<String>, header: impl Into<String>) -> Self {
        Self::Refresh {
            url: url.into(),
            header: header.into(),
        }
    }

    /// Creates a hop-cap error.
    pub fn too_many_redirects(url: impl Into<String>, max_hops: usize) -> Self {
        Self::TooManyRedirects {
            url: url.into(),
            max_hops,
        }
    }

    /// Maps a reqwest error to `Timeout` or `Transport`.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Transport {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an invalid header error.
    pub fn invalid_header(name: impl Into<String>) -> Self {
        Self::InvalidHeader { name: name.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// URL or path, which the source errors don't carry.
