//! Body delivery strategies.
//!
//! The engine owns the redirect/refresh loop; a [`BodySink`] owns what happens
//! to the bytes. Every hop calls [`BodySink::on_hop_start`] once, then
//! [`BodySink::on_chunk`] per body chunk in arrival order. Only the terminal hop
//! is followed by [`BodySink::on_terminal`]; any failure is followed by
//! [`BodySink::on_abort`] instead.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use url::Url;

use super::error::FetchError;
use super::options::FetchOptions;

/// Status line and headers of one hop's response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// The URL this hop requested.
    pub url: Url,
    /// Response status code.
    pub status: StatusCode,
    /// Canonical reason phrase for `status` (e.g. `Found`), empty for
    /// unregistered codes. The server's own phrase is not exposed by the
    /// transport, so this is never the on-the-wire text.
    pub reason: &'static str,
    /// Response headers (case-insensitive, multi-valued).
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Returns the numeric status code.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.status.as_u16()
    }
}

/// Receives a fetch operation's bodies and produces its result.
///
/// Implementations are driven by [`FetchEngine::fetch_with`](super::FetchEngine::fetch_with)
/// and hold per-operation state, so each call gets its own sink.
#[async_trait]
pub trait BodySink: Send {
    /// Value the operation resolves with.
    type Output: Send;

    /// Called when a hop's response headers arrive, before any of its chunks.
    ///
    /// Resets whatever per-hop accumulation the sink keeps. It does not decide
    /// whether the hop is a redirect.
    async fn on_hop_start(
        &mut self,
        head: &ResponseHead,
        options: &FetchOptions,
    ) -> Result<(), FetchError>;

    /// Called once per body chunk, in network arrival order.
    async fn on_chunk(&mut self, chunk: &[u8]) -> Result<(), FetchError>;

    /// Called exactly once, after the terminal hop, to produce the result.
    async fn on_terminal(&mut self) -> Result<Self::Output, FetchError>;

    /// Called instead of [`on_terminal`](Self::on_terminal) when the operation fails.
    ///
    /// Must release any resource opened by `on_hop_start`.
    async fn on_abort(&mut self) {}
}

/// Default delivery: collect the terminal body in memory and decode it as text.
///
/// Resolves with `Some(text)` when the final status is in `200..400` and at
/// least one byte arrived, `None` otherwise. Invalid UTF-8 is replaced, not
/// rejected.
#[derive(Debug, Default)]
pub struct TextSink {
    buffer: Vec<u8>,
    status: Option<StatusCode>,
}

impl TextSink {
    /// Creates an empty text sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of the most recent hop, if any response arrived.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

#[async_trait]
impl BodySink for TextSink {
    type Output = Option<String>;

    async fn on_hop_start(
        &mut self,
        head: &ResponseHead,
        _options: &FetchOptions,
    ) -> Result<(), FetchError> {
        self.buffer.clear();
        self.status = Some(head.status);
        Ok(())
    }

    async fn on_chunk(&mut self, chunk: &[u8]) -> Result<(), FetchError> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn on_terminal(&mut self) -> Result<Self::Output, FetchError> {
        let delivered = self
            .status
            .is_some_and(|status| (200..400).contains(&status.as_u16()));
        if !delivered || self.buffer.is_empty() {
            return Ok(None);
        }
        let buffer = std::mem::take(&mut self.buffer);
        Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
    }

    async fn on_abort(&mut self) {
        self.buffer.clear();
    }
}
