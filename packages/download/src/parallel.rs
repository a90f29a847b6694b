//! Runs the downloads of every configured data source concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use velocity_db_source_models::{DataSourceConfig, DownloadKind};

use crate::paginated::PaginatedBatchDownloader;
use crate::single_file::SingleFileDownloader;
use crate::Downloader;

/// Dispatches each data source to the downloader matching its
/// [`DownloadKind`] and runs them all at once.
#[derive(Clone)]
pub struct ParallelDownloadCoordinator {
    single_file: Arc<dyn Downloader>,
    paginated: Arc<dyn Downloader>,
}

impl std::fmt::Debug for ParallelDownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelDownloadCoordinator").finish_non_exhaustive()
    }
}

impl Default for ParallelDownloadCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelDownloadCoordinator {
    /// Creates a coordinator with the HTTP downloaders and the default page
    /// size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_downloaders(
            Arc::new(SingleFileDownloader::new()),
            Arc::new(PaginatedBatchDownloader::new()),
        )
    }

    /// Creates a coordinator whose paginated downloads request `page_size`
    /// records per page.
    #[must_use]
    pub fn with_page_size(page_size: u64) -> Self {
        Self::with_downloaders(
            Arc::new(SingleFileDownloader::new()),
            Arc::new(PaginatedBatchDownloader::new().with_page_size(page_size)),
        )
    }

    /// Creates a coordinator from explicit downloaders.
    #[must_use]
    pub fn with_downloaders(
        single_file: Arc<dyn Downloader>,
        paginated: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            single_file,
            paginated,
        }
    }

    fn downloader_for(&self, kind: DownloadKind) -> Arc<dyn Downloader> {
        match kind {
            DownloadKind::SingleFile => Arc::clone(&self.single_file),
            DownloadKind::PaginatedBatch => Arc::clone(&self.paginated),
        }
    }

    /// Downloads every source concurrently and waits for all of them.
    ///
    /// Returns `true` only if every download succeeded. A failure does not
    /// cancel the others.
    pub async fn download_all(&self, configs: &[DataSourceConfig]) -> bool {
        let all_succeeded = Arc::new(AtomicBool::new(true));

        let handles: Vec<_> = configs
            .iter()
            .cloned()
            .map(|config| {
                let downloader = self.downloader_for(config.download_kind);
                let all_succeeded = Arc::clone(&all_succeeded);

                tokio::spawn(async move {
                    log::info!(
                        "Starting {} download for city {}",
                        config.download_kind,
                        config.city
                    );

                    let succeeded = downloader
                        .download(&config.source_url, &config.target_file_path)
                        .await;

                    if succeeded {
                        log::info!(
                            "Successfully downloaded CSV file for city {} to {}",
                            config.city,
                            config.target_file_path.display()
                        );
                    } else {
                        log::warn!("Could not download CSV file for city {}", config.city);
                        all_succeeded.store(false, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                log::error!("Download task failed: {e}");
                all_succeeded.store(false, Ordering::SeqCst);
            }
        }

        all_succeeded.load(Ordering::SeqCst)
    }
}
