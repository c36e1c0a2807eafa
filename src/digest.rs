//! Expected-digest resolution from remote digest lists.

use crate::config::RepositoryConfig;
use crate::error::DigestError;
use crate::signature::{load_verifying_key, verify_envelope};
use reqwest::Client;
use std::path::PathBuf;
use tracing::{info, warn};

/// A SHA-512 digest published for a specific snapshot file, as 128 hex
/// characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest(String);

impl ExpectedDigest {
    /// Length of a SHA-512 digest in hex characters.
    pub const HEX_LEN: usize = 128;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares against a freshly computed lower-case hex digest.
    pub fn matches(&self, computed_hex: &str) -> bool {
        self.0 == computed_hex
    }
}

/// Strategy for resolving the expected digest of a snapshot file, selected
/// by configuration.
#[derive(Debug, Clone)]
pub enum DigestResolver {
    /// Trusts the fetched digest list as-is.
    Plain,
    /// Requires the digest list to carry a valid ed25519 signature made by
    /// the key at this path.
    Signed { key_path: PathBuf },
}

impl DigestResolver {
    /// Picks the strategy the configuration asks for: signed when a key
    /// path is set, plain otherwise.
    pub fn from_config(config: &RepositoryConfig) -> Self {
        match &config.key_path {
            Some(path) => DigestResolver::Signed {
                key_path: path.clone(),
            },
            None => DigestResolver::Plain,
        }
    }

    /// Resolves the expected digest for `filename` from the digest resource
    /// at `url`.
    ///
    /// Returns a definite digest or a definite error; a missing entry is
    /// [`DigestError::NoEntry`], never an empty digest.
    pub async fn resolve(
        &self,
        client: &Client,
        url: &str,
        filename: &str,
    ) -> Result<ExpectedDigest, DigestError> {
        info!("Fetching file signature from {}", url);
        let response = client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Status {
                url: url.to_string(),
                status,
            });
        }
        let raw = response.bytes().await?;

        let list = match self {
            DigestResolver::Plain => String::from_utf8_lossy(&raw).into_owned(),
            DigestResolver::Signed { key_path } => {
                let key = load_verifying_key(key_path)?;
                verify_envelope(&raw, &key)?
            }
        };
        find_digest(&list, filename)
    }
}

/// Scans a digest list for the first line naming `filename` and returns its
/// leading 128 hex characters.
///
/// Matching is by line suffix, the way sha512sum lists are laid out
/// (`<digest>  <name>`). A name that is itself a suffix of another listed
/// name can false-match; see DESIGN.md before changing this.
pub(crate) fn find_digest(list: &str, filename: &str) -> Result<ExpectedDigest, DigestError> {
    for line in list.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if line.ends_with(filename) {
            match line.get(..ExpectedDigest::HEX_LEN) {
                Some(digest) => return Ok(ExpectedDigest(digest.to_string())),
                None => {
                    warn!(
                        "Digest entry for {} is shorter than {} characters",
                        filename,
                        ExpectedDigest::HEX_LEN
                    );
                    break;
                }
            }
        }
    }
    Err(DigestError::NoEntry {
        filename: filename.to_string(),
    })
}
