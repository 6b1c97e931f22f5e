//! Constants for the fetch module (timeouts, hop cap, request defaults).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large downloads).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default cap on redirect + refresh hops within one operation.
pub const DEFAULT_MAX_HOPS: usize = 20;

/// Content type sent with a request body when the caller names none.
pub const DEFAULT_DATA_TYPE: &str = "application/octet-stream";

/// Prefix of the directory created for a download without an explicit output path.
pub const TEMP_DIR_PREFIX: &str = "down-";

/// File name used inside that directory.
pub const TEMP_FILE_NAME: &str = "~download";
