//! Per-call fetch options.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

use super::download::{DownloadProgress, DownloadedFile};
use super::error::FetchError;

/// Invoked by the streaming sink when a hop's headers arrive.
pub type StartCallback = Arc<dyn Fn(u16, &HeaderMap) + Send + Sync>;

/// Invoked by the streaming sink each time it is ready for more data.
pub type ProgressCallback = Arc<dyn Fn(&DownloadProgress<'_>) + Send + Sync>;

/// Invoked by the streaming sink after the output has been closed.
pub type FinishCallback = Arc<dyn Fn(&DownloadedFile) + Send + Sync>;

/// Options for a single [`fetch`](super::FetchEngine::fetch) or
/// [`download`](super::FetchEngine::download) call.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use urlfetch_core::fetch::FetchOptions;
/// use reqwest::Method;
///
/// # fn example() -> Result<(), urlfetch_core::fetch::FetchError> {
/// let options = FetchOptions::new()
///     .method(Method::POST)
///     .header("x-token", "abc")?
///     .data(b"{}".to_vec(), Some("application/json"))
///     .timeout(Duration::from_secs(10));
/// # let _ = options;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Request method, GET unless set.
    pub method: Method,
    /// Caller headers, merged over the base `user-agent`/`accept` set.
    pub headers: HeaderMap,
    /// Request body, re-sent on every hop.
    pub data: Option<Vec<u8>>,
    /// Content type for `data`; `application/octet-stream` when unset.
    pub data_type: Option<String>,
    /// Download destination; a fresh temporary file when unset.
    pub outfile: Option<PathBuf>,
    /// See [`StartCallback`].
    pub on_start: Option<StartCallback>,
    /// See [`ProgressCallback`].
    pub on_progress: Option<ProgressCallback>,
    /// See [`FinishCallback`].
    pub on_finish: Option<FinishCallback>,
    /// Cancels the whole operation when fired.
    pub cancel: Option<CancellationToken>,
    /// Deadline for the whole operation, across all hops.
    pub timeout: Option<Duration>,
    /// Overrides the engine's hop cap for this call.
    pub max_hops: Option<usize>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("method", &self.method)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("data_len", &self.data.as_ref().map(Vec::len))
            .field("data_type", &self.data_type)
            .field("outfile", &self.outfile)
            .field("on_start", &self.on_start.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("cancellable", &self.cancel.is_some())
            .field("timeout", &self.timeout)
            .field("max_hops", &self.max_hops)
            .finish()
    }
}

impl FetchOptions {
    /// Creates GET options with no extra headers or body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a caller header, replacing any previous value for the same name.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidHeader`] when the name or value is not valid HTTP.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, FetchError> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| FetchError::invalid_header(name))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| FetchError::invalid_header(name))?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Replaces all caller headers.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the request body and its content type.
    #[must_use]
    pub fn data(mut self, data: Vec<u8>, data_type: Option<&str>) -> Self {
        self.data = Some(data);
        self.data_type = data_type.map(ToString::to_string);
        self
    }

    /// Sets the download destination.
    #[must_use]
    pub fn outfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.outfile = Some(path.into());
        self
    }

    /// Sets the per-hop start callback.
    #[must_use]
    pub fn on_start(mut self, callback: impl Fn(u16, &HeaderMap) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(callback));
        self
    }

    /// Sets the progress callback.
    #[must_use]
    pub fn on_progress(
        mut self,
        callback: impl Fn(&DownloadProgress<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Sets the finish callback.
    #[must_use]
    pub fn on_finish(mut self, callback: impl Fn(&DownloadedFile) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(callback));
        self
    }

    /// Makes the operation cancellable through `token`.
    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Bounds the whole operation, all hops included.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the engine's hop cap for this call.
    #[must_use]
    pub fn max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = Some(max_hops);
        self
    }
}

/// Parses a `Name: value` header line, as given on the command line.
///
/// # Errors
///
/// Returns [`FetchError::InvalidHeader`] when the line has no `:` or the name
/// or value is not valid HTTP.
pub fn parse_header_line(line: &str) -> Result<(HeaderName, HeaderValue), FetchError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| FetchError::invalid_header(line))?;
    let name = name.trim();
    let header_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| FetchError::invalid_header(name))?;
    let header_value =
        HeaderValue::from_str(value.trim()).map_err(|_| FetchError::invalid_header(name))?;
    Ok((header_name, header_value))
}
