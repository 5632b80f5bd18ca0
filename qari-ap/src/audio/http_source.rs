//! Progressive HTTP media source
//!
//! The response body is downloaded by a tokio task into memory while the
//! decoder reads from the front. Reads and seeks past the downloaded range
//! block until the download catches up, completes, fails, or is cancelled.

use reqwest::{StatusCode, Url};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;
use symphonia::core::io::MediaSource;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

/// Longest wait for the next body chunk before the transfer is declared dead
const STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Re-check interval for blocked readers
const READ_POLL: Duration = Duration::from_millis(250);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 404 or 410 from the server
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection failure, timeout, stalled or truncated body
    #[error("Network error: {0}")]
    Network(String),

    /// Any other non-success status
    #[error("HTTP {0}")]
    Status(u16),

    #[error("Download cancelled")]
    Cancelled,
}

#[derive(Debug, Default)]
struct Progress {
    data: Vec<u8>,
    complete: bool,
    error: Option<FetchError>,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct Shared {
    progress: Mutex<Progress>,
    changed: Condvar,
}

/// Cloneable view of one download, used to cancel it or inspect its outcome
#[derive(Debug, Clone, Default)]
pub struct Download {
    shared: Arc<Shared>,
}

impl Download {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the transfer and wake every blocked reader
    pub fn cancel(&self) {
        self.update(|p| p.cancelled = true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Transfer failure, if any
    pub fn failure(&self) -> Option<FetchError> {
        self.lock().error.clone()
    }

    pub fn downloaded_bytes(&self) -> usize {
        self.lock().data.len()
    }

    pub fn is_complete(&self) -> bool {
        self.lock().complete
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        // A poisoned lock only means a reader panicked; the bytes are intact
        self.shared
            .progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut Progress)) {
        let mut progress = self.lock();
        f(&mut progress);
        drop(progress);
        self.shared.changed.notify_all();
    }
}

/// Seekable reader over a progressively downloaded HTTP body
pub struct HttpMediaSource {
    download: Download,
    content_length: Option<u64>,
    pos: u64,
}

impl HttpMediaSource {
    /// Issue the request and start streaming the body
    ///
    /// Blocks the calling thread until response headers arrive, so it must
    /// not be called from inside the runtime.
    pub fn open(
        runtime: &Handle,
        client: &reqwest::Client,
        url: &Url,
        download: Download,
    ) -> Result<Self, FetchError> {
        debug!(url = %url, "Opening audio stream");

        let response = runtime
            .block_on(client.get(url.clone()).send())
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if status.is_server_error() {
            return Err(FetchError::Network(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_length = response.content_length();
        debug!(url = %url, ?content_length, "Audio stream responding");

        runtime.spawn(pump_body(response, download.clone()));

        Ok(Self {
            download,
            content_length,
            pos: 0,
        })
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Block until `pos` is downloaded or the body ended; returns the
    /// number of bytes readable at `pos`
    fn wait_for(&self, pos: u64) -> io::Result<usize> {
        let mut progress = self.download.lock();
        loop {
            if progress.cancelled {
                return Err(io::Error::new(io::ErrorKind::ConnectionAborted, FetchError::Cancelled));
            }
            let len = progress.data.len() as u64;
            if pos < len {
                return Ok((len - pos) as usize);
            }
            if progress.complete {
                return Ok(0);
            }
            if let Some(err) = &progress.error {
                return Err(io::Error::new(io::ErrorKind::Other, err.clone()));
            }
            let (guard, _) = self
                .download
                .shared
                .changed
                .wait_timeout(progress, READ_POLL)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            progress = guard;
        }
    }
}

async fn pump_body(mut response: reqwest::Response, download: Download) {
    loop {
        if download.is_cancelled() {
            trace!("Download cancelled");
            return;
        }

        match tokio::time::timeout(STALL_TIMEOUT, response.chunk()).await {
            Ok(Ok(Some(chunk))) => download.update(|p| p.data.extend_from_slice(&chunk)),
            Ok(Ok(None)) => {
                download.update(|p| p.complete = true);
                debug!(bytes = download.downloaded_bytes(), "Download complete");
                return;
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Download failed");
                download.update(|p| p.error = Some(FetchError::Network(err.to_string())));
                return;
            }
            Err(_) => {
                warn!("Download stalled");
                download.update(|p| {
                    p.error = Some(FetchError::Network("transfer stalled".to_string()))
                });
                return;
            }
        }
    }
}

impl Read for HttpMediaSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let available = self.wait_for(self.pos)?;
        if available == 0 {
            return Ok(0);
        }

        let progress = self.download.lock();
        let start = self.pos as usize;
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&progress.data[start..start + n]);
        drop(progress);

        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpMediaSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
            SeekFrom::End(delta) => {
                let len = match self.content_length {
                    Some(len) => len,
                    None if self.download.is_complete() => self.download.downloaded_bytes() as u64,
                    None => {
                        return Err(io::Error::new(
                            io::ErrorKind::Unsupported,
                            "stream length unknown",
                        ))
                    }
                };
                len as i64 + delta
            }
        };

        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of stream",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl MediaSource for HttpMediaSource {
    fn is_seekable(&self) -> bool {
        self.content_length.is_some()
    }

    fn byte_len(&self) -> Option<u64> {
        self.content_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn open(server: &MockServer, route: &str) -> Result<HttpMediaSource, FetchError> {
        let url = Url::parse(&format!("{}{}", server.uri(), route)).unwrap();
        let runtime = Handle::current();
        tokio::task::spawn_blocking(move || {
            HttpMediaSource::open(&runtime, &reqwest::Client::new(), &url, Download::new())
        })
        .await
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_not_found_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.mp3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = open(&server, "/gone.mp3").await;
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_error_is_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let result = open(&server, "/x.mp3").await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reads_and_seeks_body() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0u8..=255).collect();
        Mock::given(method("GET"))
            .and(path("/1.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let mut source = open(&server, "/1.mp3").await.unwrap();
        assert_eq!(source.byte_len(), Some(256));
        assert!(source.is_seekable());

        let read = tokio::task::spawn_blocking(move || {
            let mut all = Vec::new();
            source.read_to_end(&mut all).unwrap();
            source.seek(SeekFrom::End(-6)).unwrap();
            let mut tail = [0u8; 6];
            source.read_exact(&mut tail).unwrap();
            (all, tail)
        })
        .await
        .unwrap();

        assert_eq!(read.0, body);
        assert_eq!(read.1, [250, 251, 252, 253, 254, 255]);
    }

    #[test]
    fn test_cancel_wakes_reader() {
        let download = Download::new();
        let mut source = HttpMediaSource {
            download: download.clone(),
            content_length: None,
            pos: 0,
        };
        download.cancel();

        let mut buf = [0u8; 4];
        let err = source.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }
}
