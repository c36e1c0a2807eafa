//! Streaming image download with incremental SHA-512.

use crate::digest::ExpectedDigest;
use crate::error::SyncError;
use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha512};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, info};

/// A fully written (and, when requested, digest-checked) download in the
/// scratch directory.
///
/// Whoever holds the value owns the file on disk; the installer takes it
/// over and is responsible for moving or abandoning it.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Streams `url` into `tmp_path`, hashing chunks as the body arrives.
///
/// With an expected digest supplied, a finished download whose SHA-512 does
/// not match is reported as [`SyncError::DigestMismatch`] and never staged;
/// the scratch file is left behind for the next attempt to overwrite. There
/// is no resume: a failed attempt restarts from scratch.
pub async fn download_image(
    client: &Client,
    url: &str,
    tmp_path: &Path,
    expected: Option<&ExpectedDigest>,
) -> Result<StagedFile, SyncError> {
    info!("Downloading new SquashFS file from {}", url);
    let response = client.get(url).send().await?.error_for_status()?;

    let pb = match response.content_length() {
        Some(len) => {
            let pb = indicatif::ProgressBar::new(len);
            pb.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} | {elapsed_precise} elapsed, ETA {eta_precise}")
                    .unwrap()
                    .progress_chars("█▓▒░ "),
            );
            pb
        }
        None => indicatif::ProgressBar::new_spinner(),
    };

    let mut file = BufWriter::new(tokio::fs::File::create(tmp_path).await?);
    let mut hasher = expected.map(|_| Sha512::new());

    let mut stream = response.bytes_stream();
    while let Some(piece) = stream.next().await {
        let chunk = piece?;
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&chunk);
        }
        file.write_all(&chunk).await?;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    pb.finish_and_clear();

    if let (Some(expected), Some(hasher)) = (expected, hasher) {
        let computed = format!("{:x}", hasher.finalize());
        if !expected.matches(&computed) {
            error!("Signature {} does not match!", computed);
            return Err(SyncError::DigestMismatch {
                expected: expected.as_str().to_string(),
                computed,
            });
        }
        info!("✅ SHA-512 verified for {}", tmp_path.display());
    }

    Ok(StagedFile::new(tmp_path.to_path_buf()))
}
