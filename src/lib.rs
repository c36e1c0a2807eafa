//! sqfssync - keeps a mounted SquashFS repository snapshot in sync with an
//! upstream mirror.
//!
//! The crate fetches a compressed filesystem image, checks it against the
//! mirror's published SHA-512 digest list (optionally carried in a signed
//! envelope), atomically swaps it in for the previous image and remounts it
//! at the repository location.
//!
//! # Features
//!
//! - **Digest Verification**: incremental SHA-512 while the image streams in
//! - **Signed Digest Lists**: optional ed25519-signed digest resources
//! - **Atomic Replacement**: ordered stage/unmount/remove/rename/mount steps
//! - **Re-entrant Recovery**: a re-run completes a previously failed attempt
//!   from observed filesystem and mount state
//!
//! # Example
//!
//! ```no_run
//! use sqfssync::{RepositoryConfig, SyncOrchestrator};
//!
//! # async fn example() {
//! let config = RepositoryConfig::new(
//!     "/var/db/repos/gentoo",
//!     "https://mirror.example.org/snapshots/",
//! );
//! let sync = SyncOrchestrator::new(config);
//! let outcome = sync.update().await;
//! assert!(outcome.success);
//! # }
//! ```

pub mod config;
pub mod digest;
pub mod download;
pub mod error;
pub mod install;
pub mod mount;
pub mod orchestrator;
pub mod signature;

pub use config::{RepositoryConfig, SnapshotDescriptor};
pub use digest::{DigestResolver, ExpectedDigest};
pub use download::StagedFile;
pub use error::{DigestError, SyncError, SyncOutcome, UpdateError};
pub use install::install_image;
pub use mount::{Mounter, SystemMounter};
pub use orchestrator::SyncOrchestrator;
