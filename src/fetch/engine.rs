//! The redirect/refresh/cookie state machine.
//!
//! One call to [`FetchEngine::fetch_with`] runs a chain of hops. Each hop
//! rebuilds the request headers from the *current* URL (origin, referer and
//! cookies change as the chain moves), streams the response body into the
//! caller's [`BodySink`], and then decides:
//!
//! - 301/302 with `Location` → follow it, no terminal hook.
//! - `Refresh` with a `url=`/`filename=` token → follow it, no terminal hook.
//! - anything else → store `Set-Cookie`, call the terminal hook, stop.
//!
//! Transport failures end the whole operation; nothing is retried.

use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{
    ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, LOCATION, ORIGIN,
    REFERER, SET_COOKIE, USER_AGENT,
};
use tracing::{debug, info, instrument};
use url::Url;

use super::config::FetchConfig;
use super::constants::DEFAULT_DATA_TYPE;
use super::cookies::CookieJar;
use super::download::{Destination, DownloadedFile, FileSink, TempDestination};
use super::error::FetchError;
use super::options::FetchOptions;
use super::refresh::{parse_filename_or_url, resolve_refresh_target};
use super::sink::{BodySink, ResponseHead, TextSink};

/// Header carrying meta-refresh style redirection.
const REFRESH: &str = "refresh";

/// What to do after a hop's body has been fully delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HopDecision {
    /// 301/302: request this URL next.
    Redirect(Url),
    /// `Refresh` header: request this URL next.
    Refresh(Url),
    /// The operation ends with this hop.
    Terminal,
}

/// Decides whether a completed hop is a redirect, a refresh, or terminal.
///
/// `Location` is resolved against the hop URL, so absolute values replace it
/// and relative ones stay on the same origin.
///
/// # Errors
///
/// - [`FetchError::Redirect`] for 301/302 without `Location`
/// - [`FetchError::Refresh`] for a `Refresh` header without a URL token
/// - [`FetchError::InvalidUrl`] when the target cannot be parsed
pub fn decide_next_hop(head: &ResponseHead) -> Result<HopDecision, FetchError> {
    let current = &head.url;

    if matches!(head.code(), 301 | 302) {
        let location = head
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| FetchError::redirect(current.as_str()))?;
        let target = current
            .join(location)
            .map_err(|_| FetchError::invalid_url(location))?;
        return Ok(HopDecision::Redirect(target));
    }

    if let Some(refresh) = head.headers.get(REFRESH).filter(|v| !v.is_empty()) {
        let raw = String::from_utf8_lossy(refresh.as_bytes());
        let location = parse_filename_or_url(&raw)
            .ok_or_else(|| FetchError::refresh(current.as_str(), raw.as_ref()))?;
        return resolve_refresh_target(current, &location).map(HopDecision::Refresh);
    }

    Ok(HopDecision::Terminal)
}

/// Parses `url` and rejects anything that is not http(s).
fn parse_http_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
    ensure_http(&parsed)?;
    Ok(parsed)
}

fn ensure_http(url: &Url) -> Result<(), FetchError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(FetchError::invalid_url(url.as_str())),
    }
}

/// HTTP(S) fetch engine with redirect, refresh and cookie replay.
///
/// Create once and share: clones are cheap and share the transport and the
/// cookie jar. Concurrent calls are independent except for the jar.
///
/// # Example
///
/// ```no_run
/// use urlfetch_core::fetch::{FetchEngine, FetchOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = FetchEngine::new();
/// if let Some(text) = engine.fetch("https://example.com/", &FetchOptions::new()).await? {
///     println!("{text}");
/// }
/// let file = engine
///     .download("https://example.com/file.bin", &FetchOptions::new().outfile("file.bin"))
///     .await?;
/// println!("saved {} bytes to {}", file.bytes_written, file.path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FetchEngine {
    client: Client,
    jar: Arc<CookieJar>,
    destination: Arc<dyn Destination>,
    user_agent: HeaderValue,
    config: FetchConfig,
}

impl Default for FetchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchEngine {
    /// Creates an engine with the default [`FetchConfig`].
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static default
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_config(FetchConfig::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates an engine with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the transport cannot be built, or
    /// [`FetchError::InvalidHeader`] if the configured user agent is not a
    /// valid header value.
    pub fn with_config(config: FetchConfig) -> Result<Self, FetchError> {
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|_| FetchError::invalid_header(USER_AGENT.as_str()))?;
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .gzip(true)
            .build()
            .map_err(|source| FetchError::Client { source })?;
        debug!(?config, "fetch engine created");
        Ok(Self {
            client,
            jar: Arc::new(CookieJar::new()),
            destination: Arc::new(TempDestination::default()),
            user_agent,
            config,
        })
    }

    /// Uses `jar` instead of a private jar, e.g. to share cookies between engines.
    #[must_use]
    pub fn with_cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.jar = jar;
        self
    }

    /// Uses `destination` for downloads that name no output file.
    #[must_use]
    pub fn with_destination(mut self, destination: Arc<dyn Destination>) -> Self {
        self.destination = destination;
        self
    }

    /// The cookie jar replayed on every request.
    #[must_use]
    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }

    /// Fetches `url` and returns its body as text.
    ///
    /// Resolves with `None` when the terminal status is outside `200..400` or
    /// the body is empty; neither is an error.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for protocol, transport, cancellation and
    /// deadline failures at any hop.
    #[instrument(skip(self, options), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Option<String>, FetchError> {
        let mut sink = TextSink::new();
        self.fetch_with(url, options, &mut sink).await
    }

    /// Streams `url` to `options.outfile` (or a fresh temporary file).
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`fetch`](Self::fetch), plus
    /// [`FetchError::Io`] when the output cannot be written. The partial
    /// output is removed on every error path.
    #[instrument(skip(self, options), fields(url = %url))]
    pub async fn download(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<DownloadedFile, FetchError> {
        let mut sink = FileSink::new(Arc::clone(&self.destination), options);
        self.fetch_with(url, options, &mut sink).await
    }

    /// Runs the hop loop, delivering bodies to `sink`.
    ///
    /// On success the sink's terminal hook has run exactly once. On failure
    /// its abort hook has run instead.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the protocol, the transport, the
    /// caller's cancellation token or deadline, or the sink itself.
    pub async fn fetch_with<S: BodySink>(
        &self,
        url: &str,
        options: &FetchOptions,
        sink: &mut S,
    ) -> Result<S::Output, FetchError> {
        match self.run_guarded(url, options, sink).await {
            Ok(output) => Ok(output),
            Err(error) => {
                debug!(error = %error, "fetch failed; releasing sink");
                sink.on_abort().await;
                Err(error)
            }
        }
    }

    /// Applies the caller's deadline and cancellation token around the hop loop.
    async fn run_guarded<S: BodySink>(
        &self,
        url: &str,
        options: &FetchOptions,
        sink: &mut S,
    ) -> Result<S::Output, FetchError> {
        let chase = self.chase(url, options, sink);
        let bounded = async {
            match options.timeout {
                Some(limit) => match tokio::time::timeout(limit, chase).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::timeout(url)),
                },
                None => chase.await,
            }
        };
        match &options.cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(FetchError::cancelled(url)),
                result = bounded => result,
            },
            None => bounded.await,
        }
    }

    async fn chase<S: BodySink>(
        &self,
        url: &str,
        options: &FetchOptions,
        sink: &mut S,
    ) -> Result<S::Output, FetchError> {
        let mut current = parse_http_url(url)?;
        let max_hops = options.max_hops.unwrap_or(self.config.max_hops);
        let mut hops = 0usize;

        loop {
            let head = self.run_hop(&current, options, sink).await?;
            match decide_next_hop(&head)? {
                HopDecision::Terminal => {
                    self.store_cookies(&head);
                    info!(url = %head.url, status = head.code(), hops, "fetch complete");
                    return sink.on_terminal().await;
                }
                HopDecision::Redirect(next) | HopDecision::Refresh(next) => {
                    hops += 1;
                    if hops > max_hops {
                        return Err(FetchError::too_many_redirects(next.as_str(), max_hops));
                    }
                    ensure_http(&next)?;
                    debug!(from = %current, to = %next, status = head.code(), hop = hops, "following");
                    current = next;
                }
            }
        }
    }

    /// Issues one request and streams its body into `sink`.
    async fn run_hop<S: BodySink>(
        &self,
        url: &Url,
        options: &FetchOptions,
        sink: &mut S,
    ) -> Result<ResponseHead, FetchError> {
        let headers = self.request_headers(url, options)?;
        let mut request = self
            .client
            .request(options.method.clone(), url.clone())
            .headers(headers);
        if let Some(data) = &options.data {
            request = request.body(data.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::transport(url.as_str(), e))?;
        let status = response.status();
        let head = ResponseHead {
            url: url.clone(),
            status,
            reason: status.canonical_reason().unwrap_or_default(),
            headers: response.headers().clone(),
        };
        debug!(
            url = %url,
            status = head.code(),
            reason = head.reason,
            "response headers received"
        );
        sink.on_hop_start(&head, options).await?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::transport(url.as_str(), e))?;
            sink.on_chunk(&chunk).await?;
        }
        Ok(head)
    }

    /// Base headers, then caller headers, then per-hop origin/referer/cookie
    /// and body headers.
    fn request_headers(&self, url: &Url, options: &FetchOptions) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, self.user_agent.clone());
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.extend(options.headers.clone());

        let origin = HeaderValue::from_str(&url.origin().ascii_serialization())
            .map_err(|_| FetchError::invalid_header(ORIGIN.as_str()))?;
        headers.insert(ORIGIN, origin.clone());
        headers.insert(REFERER, origin);

        match self.jar.read_cookie(url) {
            Some(cookie) => {
                let value = HeaderValue::from_str(&cookie)
                    .map_err(|_| FetchError::invalid_header(COOKIE.as_str()))?;
                headers.insert(COOKIE, value);
            }
            None => {
                headers.remove(COOKIE);
            }
        }

        if let Some(data) = &options.data {
            let data_type = options.data_type.as_deref().unwrap_or(DEFAULT_DATA_TYPE);
            let content_type = HeaderValue::from_str(data_type)
                .map_err(|_| FetchError::invalid_header(CONTENT_TYPE.as_str()))?;
            headers.insert(CONTENT_TYPE, content_type);
            headers.insert(CONTENT_LENGTH, HeaderValue::from(data.len()));
        }
        Ok(headers)
    }

    fn store_cookies(&self, head: &ResponseHead) {
        let set_cookies: Vec<&str> = head
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if !set_cookies.is_empty() {
            self.jar.write_cookie(&head.url, set_cookies);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use reqwest::StatusCode;
    use reqwest::header::HeaderName;

    fn head_with(status: u16, url: &str, headers: &[(&str, &str)]) -> ResponseHead {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        ResponseHead {
            url: Url::parse(url).unwrap(),
            status: StatusCode::from_u16(status).unwrap(),
            reason: "",
            headers: map,
        }
    }

    #[test]
    fn test_decide_redirect_relative_location() {
        let head = head_with(301, "http://example.com/a", &[("Location", "/b")]);
        assert_eq!(
            decide_next_hop(&head).unwrap(),
            HopDecision::Redirect(Url::parse("http://example.com/b").unwrap())
        );
    }

    #[test]
    fn test_decide_redirect_absolute_location_replaces_url() {
        let head = head_with(302, "http://example.com/a", &[("location", "https://other.org/x?y=1")]);
        assert_eq!(
            decide_next_hop(&head).unwrap(),
            HopDecision::Redirect(Url::parse("https://other.org/x?y=1").unwrap())
        );
    }

    #[test]
    fn test_decide_redirect_without_location_fails() {
        let head = head_with(302, "http://example.com/a", &[]);
        assert!(matches!(decide_next_hop(&head), Err(FetchError::Redirect { .. })));
    }

    #[test]
    fn test_decide_other_3xx_is_terminal() {
        for status in [303, 304, 307, 308] {
            let head = head_with(status, "http://example.com/a", &[("Location", "/b")]);
            assert_eq!(decide_next_hop(&head).unwrap(), HopDecision::Terminal, "status {status}");
        }
    }

    #[test]
    fn test_decide_refresh_relative_target() {
        let head = head_with(200, "http://example.com:8080/a/b", &[("Refresh", "0; url=/c")]);
        assert_eq!(
            decide_next_hop(&head).unwrap(),
            HopDecision::Refresh(Url::parse("http://example.com:8080/c").unwrap())
        );
    }

    #[test]
    fn test_decide_refresh_quoted_targets() {
        for value in ["0; url='/d'", "0; url=\"/d\""] {
            let head = head_with(200, "http://example.com/", &[("refresh", value)]);
            assert_eq!(
                decide_next_hop(&head).unwrap(),
                HopDecision::Refresh(Url::parse("http://example.com/d").unwrap()),
                "value {value}"
            );
        }
    }

    #[test]
    fn test_decide_refresh_on_error_status_is_followed() {
        let head = head_with(404, "http://example.com/", &[("Refresh", "0; url=/home")]);
        assert!(matches!(decide_next_hop(&head).unwrap(), HopDecision::Refresh(_)));
    }

    #[test]
    fn test_decide_refresh_without_url_fails() {
        let head = head_with(200, "http://example.com/", &[("Refresh", "0;")]);
        assert!(matches!(decide_next_hop(&head), Err(FetchError::Refresh { .. })));
    }

    #[test]
    fn test_decide_plain_response_is_terminal() {
        let head = head_with(200, "http://example.com/", &[("Content-Type", "text/plain")]);
        assert_eq!(decide_next_hop(&head).unwrap(), HopDecision::Terminal);
    }

    #[test]
    fn test_parse_http_url_rejects_other_schemes() {
        assert!(parse_http_url("https://example.com/").is_ok());
        assert!(matches!(parse_http_url("ftp://example.com/"), Err(FetchError::InvalidUrl { .. })));
        assert!(matches!(parse_http_url("not a url"), Err(FetchError::InvalidUrl { .. })));
    }

    #[test]
    fn test_request_headers_defaults_and_overrides() {
        let engine = FetchEngine::new();
        let url = Url::parse("https://example.com:8443/p/x?q=1").unwrap();
        let options = FetchOptions::new().header("Accept", "text/html").unwrap();

        let headers = engine.request_headers(&url, &options).unwrap();
        assert_eq!(headers.get(ACCEPT).unwrap(), "text/html");
        assert!(headers.get(USER_AGENT).unwrap().to_str().unwrap().starts_with("urlfetch/"));
        assert_eq!(headers.get(ORIGIN).unwrap(), "https://example.com:8443");
        assert_eq!(headers.get(REFERER).unwrap(), "https://example.com:8443");
        assert!(headers.get(COOKIE).is_none());
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_request_headers_drop_stale_cookie_and_add_body_headers() {
        let engine = FetchEngine::new();
        let url = Url::parse("http://example.com/").unwrap();
        let options = FetchOptions::new()
            .header("Cookie", "stale=1")
            .unwrap()
            .data(b"hello".to_vec(), None);

        let headers = engine.request_headers(&url, &options).unwrap();
        assert!(headers.get(COOKIE).is_none(), "stale cookie must not be sent");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), DEFAULT_DATA_TYPE);
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "5");
    }

    #[test]
    fn test_request_headers_attach_jar_cookies() {
        let engine = FetchEngine::new();
        let url = Url::parse("http://example.com/p/y").unwrap();
        engine
            .cookie_jar()
            .write_cookie(&Url::parse("http://example.com/p/x").unwrap(), ["a=1; path=/p"]);

        let headers = engine.request_headers(&url, &FetchOptions::new()).unwrap();
        assert_eq!(headers.get(COOKIE).unwrap(), "a=1");
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        let config = FetchConfig::default().user_agent("bad\nagent");
        assert!(matches!(
            FetchEngine::with_config(config),
            Err(FetchError::InvalidHeader { .. })
        ));
    }
}
