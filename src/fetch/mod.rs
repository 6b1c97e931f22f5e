//! HTTP(S) fetch engine with redirect, refresh and cookie replay.
//!
//! # Features
//!
//! - Follows 301/302 `Location` and `Refresh: ...; url=...` hops manually
//! - Host + path-prefix cookie jar shared across calls
//! - Text delivery ([`TextSink`]) or streaming to disk ([`FileSink`])
//! - Configurable timeouts (30s connect, 5min per hop by default)
//! - Cancellation and whole-operation deadlines
//!
//! # Example
//!
//! ```no_run
//! use urlfetch_core::fetch::{FetchEngine, FetchOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FetchEngine::new();
//! let body = engine.fetch("https://example.com/login", &FetchOptions::new()).await?;
//! println!("{}", body.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

mod config;
pub mod constants;
mod cookies;
mod download;
mod engine;
mod error;
mod options;
mod refresh;
mod sink;

pub use config::FetchConfig;
pub use constants::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_HOPS, READ_TIMEOUT_SECS};
pub use cookies::CookieJar;
pub use download::{Destination, DownloadProgress, DownloadedFile, FileSink, TempDestination};
pub use engine::{FetchEngine, HopDecision, decide_next_hop};
pub use error::FetchError;
pub use options::{
    FetchOptions, FinishCallback, ProgressCallback, StartCallback, parse_header_line,
};
pub use refresh::{parse_filename_or_url, resolve_refresh_target};
pub use sink::{BodySink, ResponseHead, TextSink};
