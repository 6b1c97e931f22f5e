//! Default User-Agent string for outgoing requests.

/// Default User-Agent for fetch and download requests (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    format!("urlfetch/{}", env!("CARGO_PKG_VERSION"))
}
