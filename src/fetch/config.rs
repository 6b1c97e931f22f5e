//! Engine-wide configuration.

use std::time::Duration;

use super::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_HOPS, READ_TIMEOUT_SECS};
use crate::user_agent;

/// Settings fixed when a [`FetchEngine`](super::FetchEngine) is built.
///
/// Per-call overrides (method, headers, deadline, hop cap) live in
/// [`FetchOptions`](super::FetchOptions) instead.
///
/// # Default Values
///
/// - `connect_timeout`: 30 seconds
/// - `read_timeout`: 5 minutes
/// - `max_hops`: 20
/// - `user_agent`: `urlfetch/<version>`
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Timeout for establishing each connection.
    pub connect_timeout: Duration,

    /// Timeout for a single hop, from request to the last body byte.
    pub read_timeout: Duration,

    /// Maximum redirect/refresh hops before giving up.
    pub max_hops: usize,

    /// Value of the `user-agent` base header.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            max_hops: DEFAULT_MAX_HOPS,
            user_agent: user_agent::default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Creates a config with explicit timeout values in seconds.
    #[must_use]
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        Self {
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            read_timeout: Duration::from_secs(read_timeout_secs),
            ..Self::default()
        }
    }

    /// Sets the hop cap. A cap of 0 allows only the initial request.
    #[must_use]
    pub fn max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Sets the `user-agent` base header.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
