//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};

use urlfetch_core::fetch::{
    CONNECT_TIMEOUT_SECS, DEFAULT_MAX_HOPS, FetchConfig, FetchOptions, READ_TIMEOUT_SECS,
    parse_header_line,
};

/// Fetch or download a URL, following redirects, refresh headers and cookies.
#[derive(Parser, Debug)]
#[command(name = "urlfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a URL and print its body
    Fetch(RequestArgs),
    /// Stream a URL to a file and print the file path
    Download(DownloadArgs),
}

/// Request flags shared by both subcommands.
#[derive(clap::Args, Debug)]
pub struct RequestArgs {
    /// URL to request (http or https)
    pub url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET", value_parser = parse_method)]
    pub method: Method,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(HeaderName, HeaderValue)>,

    /// Request body, re-sent on every hop
    #[arg(short = 'd', long)]
    pub data: Option<String>,

    /// Content type for --data
    #[arg(long, requires = "data")]
    pub data_type: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout: u64,

    /// Per-hop timeout in seconds
    #[arg(long, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout: u64,

    /// Maximum redirect/refresh hops before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_HOPS)]
    pub max_hops: usize,

    /// Deadline for the whole operation in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Output file (a fresh temporary file when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RequestArgs {
    /// Engine configuration from the timeout and hop flags.
    pub fn config(&self) -> FetchConfig {
        FetchConfig::with_timeouts(self.connect_timeout, self.read_timeout).max_hops(self.max_hops)
    }

    /// Per-call options from the method, header, body and deadline flags.
    pub fn options(&self) -> FetchOptions {
        let mut options = FetchOptions::new().method(self.method.clone());
        for (name, value) in &self.headers {
            options.headers.insert(name.clone(), value.clone());
        }
        if let Some(data) = &self.data {
            options = options.data(data.clone().into_bytes(), self.data_type.as_deref());
        }
        if let Some(secs) = self.timeout {
            options = options.timeout(Duration::from_secs(secs));
        }
        options
    }
}

fn parse_method(value: &str) -> Result<Method, String> {
    Method::from_bytes(value.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method: {value}"))
}

fn parse_header(value: &str) -> Result<(HeaderName, HeaderValue), String> {
    parse_header_line(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(args: &Args) -> &RequestArgs {
        match &args.command {
            Command::Fetch(request) => request,
            Command::Download(download) => &download.request,
        }
    }

    #[test]
    fn test_cli_fetch_defaults() {
        let args = Args::try_parse_from(["urlfetch", "fetch", "http://example.com/"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        let req = request(&args);
        assert_eq!(req.url, "http://example.com/");
        assert_eq!(req.method, Method::GET);
        assert!(req.headers.is_empty());
        assert_eq!(req.connect_timeout, 30);
        assert_eq!(req.read_timeout, 300);
        assert_eq!(req.max_hops, 20);
        assert!(req.timeout.is_none());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["urlfetch", "-v", "fetch", "http://x/"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["urlfetch", "fetch", "http://x/", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["urlfetch", "--quiet", "fetch", "http://x/"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_missing_subcommand_is_error() {
        let result = Args::try_parse_from(["urlfetch"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["urlfetch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["urlfetch", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_method_headers_and_data() {
        let args = Args::try_parse_from([
            "urlfetch",
            "fetch",
            "http://x/",
            "-X",
            "post",
            "-H",
            "X-Token: abc",
            "--header",
            "Accept: text/html",
            "-d",
            "a=1",
            "--data-type",
            "application/x-www-form-urlencoded",
        ])
        .unwrap();
        let options = request(&args).options();
        assert_eq!(options.method, Method::POST);
        assert_eq!(options.headers.get("x-token").unwrap(), "abc");
        assert_eq!(options.headers.get("accept").unwrap(), "text/html");
        assert_eq!(options.data.as_deref(), Some(b"a=1".as_slice()));
        assert_eq!(
            options.data_type.as_deref(),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_cli_invalid_header_rejected() {
        let err = Args::try_parse_from(["urlfetch", "fetch", "http://x/", "-H", "no-colon"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_data_type_requires_data() {
        let result =
            Args::try_parse_from(["urlfetch", "fetch", "http://x/", "--data-type", "text/plain"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_zero_timeout_rejected() {
        let err = Args::try_parse_from(["urlfetch", "fetch", "http://x/", "--connect-timeout", "0"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_config_maps_flags() {
        let args = Args::try_parse_from([
            "urlfetch",
            "fetch",
            "http://x/",
            "--connect-timeout",
            "5",
            "--read-timeout",
            "60",
            "--max-hops",
            "3",
            "--timeout",
            "90",
        ])
        .unwrap();
        let req = request(&args);
        let config = req.config();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.max_hops, 3);
        assert_eq!(req.options().timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_cli_download_output() {
        let args =
            Args::try_parse_from(["urlfetch", "download", "http://x/f.bin", "-o", "out.bin"])
                .unwrap();
        match args.command {
            Command::Download(download) => {
                assert_eq!(download.output, Some(PathBuf::from("out.bin")));
                assert_eq!(download.request.url, "http://x/f.bin");
            }
            Command::Fetch(_) => panic!("expected download subcommand"),
        }
    }
}
