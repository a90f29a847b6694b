//! Streams one URL to one local file.
//!
//! The response body is written chunk by chunk, never buffered in full. The
//! target file is removed on every failure path, including a copy left by an
//! earlier download, so callers only ever observe either the complete file or
//! no file at all.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt as _;
use tokio::io::AsyncWriteExt as _;

use crate::{DownloadError, Downloader, remove_stale_target};

/// Downloads a URL to a file in a single streamed request.
///
/// Redirects are followed by the underlying [`reqwest::Client`]. Any
/// non-2xx final status is treated as a failure before the target file is
/// opened for writing.
#[derive(Debug, Clone, Default)]
pub struct SingleFileDownloader {
    client: reqwest::Client,
}

impl SingleFileDownloader {
    /// Creates a downloader with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a downloader that reuses an existing HTTP client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn transfer(&self, url: &str, target_file_path: &Path) -> Result<u64, DownloadError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut target = PartialFile::create(target_file_path).await?;

        log::info!("Transferring data from {url}");

        let mut stream = response.bytes_stream();
        let mut transferred: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            target.write_all(&chunk).await?;
            transferred += chunk.len() as u64;
        }

        target.persist().await?;

        Ok(transferred)
    }
}

#[async_trait]
impl Downloader for SingleFileDownloader {
    async fn download(&self, url: &str, target_file_path: &Path) -> bool {
        log::info!("Downloading content from URL {url}");

        match self.transfer(url, target_file_path).await {
            Ok(bytes) => {
                log::info!(
                    "Download completed: {bytes} bytes written to {}",
                    target_file_path.display()
                );
                true
            }
            Err(e) => {
                log::warn!("Exception while downloading file at URL {url}: {e}");
                remove_stale_target(target_file_path).await;
                false
            }
        }
    }
}

/// A target file that is deleted on drop unless [`PartialFile::persist`]
/// completed.
struct PartialFile {
    path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl PartialFile {
    async fn create(path: &Path) -> Result<Self, DownloadError> {
        let file = tokio::fs::File::create(path)
            .await
            .map_err(DownloadError::io(path))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), DownloadError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        file.write_all(bytes)
            .await
            .map_err(DownloadError::io(&self.path))
    }

    /// Flushes and closes the file, disarming the cleanup.
    async fn persist(mut self) -> Result<(), DownloadError> {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush().await {
                self.file = Some(file);
                return Err(DownloadError::io(&self.path)(e));
            }
        }
        self.path = PathBuf::new();
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        drop(self.file.take());

        if self.path.as_os_str().is_empty() {
            return;
        }

        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            log::warn!(
                "Could not delete partially downloaded file {}: {e}",
                self.path.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::test_server::{Reply, StubServer};

    const CSV: &str = "name;date;counts\nCompteur A;2023-08-11T10:00:00+02:00;12\nCompteur B;2023-08-11T11:00:00+02:00;7\n";

    #[tokio::test]
    async fn saves_file_to_target_location() {
        let server = StubServer::start(BTreeMap::from([(
            "/data.csv".to_string(),
            Reply::Ok(CSV.to_string()),
        )]))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("downloaded.csv");

        let result = SingleFileDownloader::new()
            .download(&server.url("/data.csv"), &target)
            .await;

        assert!(result);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), CSV);
    }

    #[tokio::test]
    async fn follows_redirects() {
        let server = StubServer::start(BTreeMap::from([
            (
                "/redirect.csv".to_string(),
                Reply::Redirect("/data.csv".to_string()),
            ),
            ("/data.csv".to_string(), Reply::Ok(CSV.to_string())),
        ]))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("redirected.csv");

        let result = SingleFileDownloader::new()
            .download(&server.url("/redirect.csv"), &target)
            .await;

        assert!(result);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), CSV);
        assert_eq!(server.hits(), vec!["/redirect.csv", "/data.csv"]);
    }

    #[tokio::test]
    async fn fails_on_not_found_without_creating_file() {
        let server = StubServer::start(BTreeMap::new()).await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("not-found.csv");

        let result = SingleFileDownloader::new()
            .download(&server.url("/not-found.csv"), &target)
            .await;

        assert!(!result);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn fails_on_server_error_without_creating_file() {
        let server = StubServer::start(BTreeMap::from([(
            "/server-error.csv".to_string(),
            Reply::Status(500),
        )]))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("server-error.csv");

        let result = SingleFileDownloader::new()
            .download(&server.url("/server-error.csv"), &target)
            .await;

        assert!(!result);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn removes_previous_download_when_server_rejects_request() {
        let server = StubServer::start(BTreeMap::from([(
            "/gone.csv".to_string(),
            Reply::Status(503),
        )]))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gone.csv");
        std::fs::write(&target, CSV).unwrap();

        let result = SingleFileDownloader::new()
            .download(&server.url("/gone.csv"), &target)
            .await;

        assert!(!result);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn removes_previous_download_when_host_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("unreachable.csv");
        std::fs::write(&target, CSV).unwrap();

        let result = SingleFileDownloader::new()
            .download("http://127.0.0.1:1/data.csv", &target)
            .await;

        assert!(!result);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn deletes_partial_file_when_connection_drops() {
        let server = StubServer::start(BTreeMap::from([(
            "/truncated.csv".to_string(),
            Reply::Truncated(CSV.to_string()),
        )]))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("truncated.csv");

        let result = SingleFileDownloader::new()
            .download(&server.url("/truncated.csv"), &target)
            .await;

        assert!(!result);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn fails_when_target_directory_is_missing() {
        let server = StubServer::start(BTreeMap::from([(
            "/data.csv".to_string(),
            Reply::Ok(CSV.to_string()),
        )]))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("data.csv");

        let result = SingleFileDownloader::new()
            .download(&server.url("/data.csv"), &target)
            .await;

        assert!(!result);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn fails_on_unreachable_host() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("unreachable.csv");

        let result = SingleFileDownloader::new()
            .download("http://127.0.0.1:1/data.csv", &target)
            .await;

        assert!(!result);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn releases_file_handle_after_success() {
        let server = StubServer::start(BTreeMap::from([(
            "/data.csv".to_string(),
            Reply::Ok(CSV.to_string()),
        )]))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("released.csv");

        assert!(
            SingleFileDownloader::new()
                .download(&server.url("/data.csv"), &target)
                .await
        );

        // The handle is closed, so the file can be replaced and removed.
        std::fs::write(&target, "overwritten").unwrap();
        std::fs::remove_file(&target).unwrap();
        assert!(!target.exists());
    }
}
