//! Streaming delivery to a file.
//!
//! [`FileSink`] writes every chunk straight to disk as it arrives and resolves
//! with a [`DownloadedFile`] instead of text, so it is binary-safe by
//! construction. The output stays open across the redirect hops of one
//! operation and is closed exactly once.

use std::fmt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use url::Url;

use super::constants::{TEMP_DIR_PREFIX, TEMP_FILE_NAME};
use super::error::FetchError;
use super::options::{FetchOptions, FinishCallback, ProgressCallback, StartCallback};
use super::sink::{BodySink, ResponseHead};

/// Produces a unique writable path when the caller names no output file.
pub trait Destination: Send + Sync + fmt::Debug {
    /// Creates a fresh destination and returns its path.
    ///
    /// # Errors
    ///
    /// Returns the IO error that prevented creating the destination.
    fn create(&self) -> std::io::Result<PathBuf>;

    /// Removes a destination created by [`create`](Self::create) after a failed operation.
    fn discard(&self, path: &Path) {
        if let Err(error) = std::fs::remove_file(path) {
            debug!(path = %path.display(), error = %error, "could not remove partial download");
        }
    }
}

/// Default destination: `~download` inside a new `down-*` directory under a root.
#[derive(Debug, Clone)]
pub struct TempDestination {
    root: PathBuf,
}

impl Default for TempDestination {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir(),
        }
    }
}

impl TempDestination {
    /// Creates destinations under `root` instead of the system temp directory.
    #[must_use]
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Destination for TempDestination {
    fn create(&self) -> std::io::Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir_in(&self.root)?
            .keep();
        Ok(dir.join(TEMP_FILE_NAME))
    }

    fn discard(&self, path: &Path) {
        let Some(dir) = path.parent() else {
            return;
        };
        if let Err(error) = std::fs::remove_dir_all(dir) {
            debug!(path = %dir.display(), error = %error, "could not remove download directory");
        }
    }
}

/// Handle describing a completed, closed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Where the body was written.
    pub path: PathBuf,
    /// Size of the terminal body in bytes.
    pub bytes_written: u64,
    /// Status code of the terminal response.
    pub status: u16,
    /// URL of the terminal hop.
    pub url: Url,
}

/// Snapshot passed to the progress callback after each completed write.
#[derive(Debug, Clone, Copy)]
pub struct DownloadProgress<'a> {
    /// The open output.
    pub path: &'a Path,
    /// Bytes of the current hop written so far.
    pub bytes_written: u64,
    /// `Content-Length` of the current hop, when the server sent one.
    pub content_length: Option<u64>,
}

struct OpenOutput {
    file: File,
    path: PathBuf,
    /// Whether `path` came from the [`Destination`] rather than the caller.
    generated: bool,
}

/// Streams response bodies to a file.
///
/// The output is opened when the first hop starts: the caller's `outfile`
/// when given, otherwise a fresh path from the [`Destination`]. Later hops of
/// the same operation truncate it rather than reopen it, so only the terminal
/// body remains.
pub struct FileSink {
    destination: Arc<dyn Destination>,
    outfile: Option<PathBuf>,
    on_start: Option<StartCallback>,
    on_progress: Option<ProgressCallback>,
    on_finish: Option<FinishCallback>,
    output: Option<OpenOutput>,
    bytes_written: u64,
    content_length: Option<u64>,
    last_head: Option<(u16, Url)>,
}

impl fmt::Debug for FileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSink")
            .field("destination", &self.destination)
            .field("outfile", &self.outfile)
            .field("open", &self.output.as_ref().map(|output| &output.path))
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

impl FileSink {
    /// Creates a sink for one operation, taking `outfile` and callbacks from `options`.
    #[must_use]
    pub fn new(destination: Arc<dyn Destination>, options: &FetchOptions) -> Self {
        Self {
            destination,
            outfile: options.outfile.clone(),
            on_start: options.on_start.clone(),
            on_progress: options.on_progress.clone(),
            on_finish: options.on_finish.clone(),
            output: None,
            bytes_written: 0,
            content_length: None,
            last_head: None,
        }
    }

    /// Path of the open output, if a hop has started.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.output.as_ref().map(|output| output.path.as_path())
    }

    async fn open(&mut self) -> Result<(), FetchError> {
        let (path, generated) = match &self.outfile {
            Some(path) => (path.clone(), false),
            None => {
                let path = self
                    .destination
                    .create()
                    .map_err(|e| FetchError::io(PathBuf::from("<destination>"), e))?;
                (path, true)
            }
        };
        let file = match File::create(&path).await {
            Ok(file) => file,
            Err(e) => {
                if generated {
                    self.destination.discard(&path);
                }
                return Err(FetchError::io(path, e));
            }
        };
        debug!(path = %path.display(), generated, "opened download output");
        self.output = Some(OpenOutput {
            file,
            path,
            generated,
        });
        Ok(())
    }
}

#[async_trait]
impl BodySink for FileSink {
    type Output = DownloadedFile;

    async fn on_hop_start(
        &mut self,
        head: &ResponseHead,
        _options: &FetchOptions,
    ) -> Result<(), FetchError> {
        match self.output.as_mut() {
            None => self.open().await?,
            Some(output) => {
                let path = output.path.clone();
                output
                    .file
                    .flush()
                    .await
                    .map_err(|e| FetchError::io(path.clone(), e))?;
                output
                    .file
                    .set_len(0)
                    .await
                    .map_err(|e| FetchError::io(path.clone(), e))?;
                output
                    .file
                    .seek(SeekFrom::Start(0))
                    .await
                    .map_err(|e| FetchError::io(path, e))?;
            }
        }
        self.bytes_written = 0;
        self.content_length = head
            .headers
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        self.last_head = Some((head.code(), head.url.clone()));

        if let Some(on_start) = &self.on_start {
            on_start(head.code(), &head.headers);
        }
        Ok(())
    }

    async fn on_chunk(&mut self, chunk: &[u8]) -> Result<(), FetchError> {
        let Some(output) = self.output.as_mut() else {
            return Err(FetchError::io(
                PathBuf::new(),
                std::io::Error::other("download output is not open"),
            ));
        };
        output
            .file
            .write_all(chunk)
            .await
            .map_err(|e| FetchError::io(output.path.clone(), e))?;
        self.bytes_written += chunk.len() as u64;

        if let Some(on_progress) = &self.on_progress {
            on_progress(&DownloadProgress {
                path: &output.path,
                bytes_written: self.bytes_written,
                content_length: self.content_length,
            });
        }
        Ok(())
    }

    async fn on_terminal(&mut self) -> Result<Self::Output, FetchError> {
        let (Some(mut output), Some((status, url))) = (self.output.take(), self.last_head.take())
        else {
            return Err(FetchError::io(
                PathBuf::new(),
                std::io::Error::other("download finished before any response"),
            ));
        };

        if let Err(e) = output.file.flush().await {
            let error = FetchError::io(output.path.clone(), e);
            self.output = Some(output);
            return Err(error);
        }
        let OpenOutput { file, path, .. } = output;
        drop(file);

        let downloaded = DownloadedFile {
            path,
            bytes_written: self.bytes_written,
            status,
            url,
        };
        info!(
            path = %downloaded.path.display(),
            bytes = downloaded.bytes_written,
            status = downloaded.status,
            "download complete"
        );
        if let Some(on_finish) = &self.on_finish {
            on_finish(&downloaded);
        }
        Ok(downloaded)
    }

    async fn on_abort(&mut self) {
        let Some(OpenOutput {
            file,
            path,
            generated,
        }) = self.output.take()
        else {
            return;
        };
        drop(file);
        warn!(path = %path.display(), "removing partial download after error");
        if generated {
            self.destination.discard(&path);
        } else if let Err(error) = tokio::fs::remove_file(&path).await {
            debug!(path = %path.display(), error = %error, "could not remove partial download");
        }
    }
}
