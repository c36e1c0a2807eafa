//! Drives the fetch → verify → install sequence for one repository.

use crate::config::RepositoryConfig;
use crate::digest::{DigestResolver, ExpectedDigest};
use crate::download::{download_image, StagedFile};
use crate::error::{SyncError, SyncOutcome, UpdateError};
use crate::install::install_image;
use crate::mount::{Mounter, SystemMounter};
use reqwest::{Client, Url};
use tracing::{error, info};

/// Runs complete sync attempts against one repository destination.
///
/// Every attempt is driven from scratch: resource names, the expected
/// digest and the mount state are all re-derived per call, so a run after
/// a partial failure completes the remaining steps from observed state.
///
/// Callers must serialize attempts per destination path; concurrent
/// attempts against the same location (or the same scratch file) are not
/// coordinated here.
pub struct SyncOrchestrator<M: Mounter = SystemMounter> {
    config: RepositoryConfig,
    client: Client,
    mounter: M,
}

impl SyncOrchestrator<SystemMounter> {
    /// Orchestrator backed by the real system mount table.
    pub fn new(config: RepositoryConfig) -> Self {
        Self::with_mounter(config, SystemMounter)
    }
}

impl<M: Mounter> SyncOrchestrator<M> {
    pub fn with_mounter(config: RepositoryConfig, mounter: M) -> Self {
        Self {
            config,
            client: Client::new(),
            mounter,
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Whether the repository location exists on disk, mounted or not.
    pub fn exists(&self) -> bool {
        self.config.location.exists()
    }

    /// Runs one full update: resolve digest, download, install, remount.
    pub async fn update(&self) -> SyncOutcome {
        match self.run_update().await {
            Ok(()) => {
                info!("Snapshot installed and mounted at {}", self.config.location.display());
                SyncOutcome::OK
            }
            Err(err) => {
                error!("{}", err);
                SyncOutcome::from(&err)
            }
        }
    }

    /// Bootstraps a repository: creates the destination directory when
    /// missing, then runs a normal update.
    pub async fn bootstrap(&self) -> SyncOutcome {
        if !self.config.location.exists() {
            if let Err(source) = std::fs::create_dir_all(&self.config.location) {
                let err = UpdateError::CreateDir {
                    path: self.config.location.clone(),
                    source,
                };
                error!("{}", err);
                return SyncOutcome::from(&err);
            }
            info!("Created new directory {}", self.config.location.display());
        }
        self.update().await
    }

    async fn run_update(&self) -> Result<(), UpdateError> {
        let staged = self.fetch_snapshot().await?;
        install_image(
            staged,
            &self.config.image_path(),
            &self.config.location,
            &self.config.mount_options(),
            &self.mounter,
        )
    }

    /// Resolves the expected digest (when verification is on) and streams
    /// the image into the scratch directory.
    async fn fetch_snapshot(&self) -> Result<StagedFile, SyncError> {
        let descriptor = self.config.descriptor();

        let expected: Option<ExpectedDigest> = if self.config.verify {
            let digest_url = self.resource_url(&descriptor.digest_file)?;
            let resolver = DigestResolver::from_config(&self.config);
            Some(
                resolver
                    .resolve(&self.client, digest_url.as_str(), &descriptor.image_file)
                    .await?,
            )
        } else {
            None
        };

        let image_url = self.resource_url(&descriptor.image_file)?;
        let tmp_path = descriptor.temp_path(&self.config.temp_dir());
        download_image(&self.client, image_url.as_str(), &tmp_path, expected.as_ref()).await
    }

    fn resource_url(&self, name: &str) -> Result<Url, SyncError> {
        let base = Url::parse(&self.config.sync_uri)
            .map_err(|err| SyncError::InvalidUri(format!("{}: {}", self.config.sync_uri, err)))?;
        base.join(name)
            .map_err(|err| SyncError::InvalidUri(format!("{}: {}", name, err)))
    }
}
