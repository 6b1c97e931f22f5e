//! URL fetch core library
//!
//! Fetches HTTP(S) resources the way a browser session would: redirects and
//! `Refresh` headers are followed by hand, and cookies set along the way are
//! replayed on later requests to the same host and path.
//!
//! # Architecture
//!
//! - [`fetch`] - engine, cookie jar, body sinks and per-call options

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod fetch;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use fetch::{
    BodySink, CookieJar, DownloadedFile, FetchConfig, FetchEngine, FetchError, FetchOptions,
    TextSink,
};
