//! Repository configuration and per-attempt snapshot naming.

use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use std::env;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default remote image file name.
pub const DEFAULT_IMAGE_FILE: &str = "gentoo-current.xz.sqfs";
/// Default digest-list resource name.
pub const DEFAULT_DIGEST_FILE: &str = "sha512sum.txt";

const TMPDIR_ENV: &str = "SQFSSYNC_TMPDIR";

/// Configuration for one synced repository.
///
/// Owned by the caller and read-only to the sync machinery; one value
/// describes one destination path and its upstream mirror.
///
/// # Example
///
/// ```
/// use sqfssync::RepositoryConfig;
///
/// let config = RepositoryConfig::new(
///     "/var/db/repos/gentoo",
///     "https://mirror.example.org/snapshots/",
/// );
/// assert!(config.verify);
/// ```
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Destination mount point for the snapshot.
    pub location: PathBuf,
    /// Base URL the image and digest resources are fetched from.
    pub sync_uri: String,
    /// Remote image file name; strftime date fields are substituted per
    /// attempt (e.g. `gentoo-%Y%m%d.xz.sqfs`).
    pub image_file: String,
    /// Whether downloads are checked against the published digest list.
    pub verify: bool,
    /// Remote digest-list resource name; supports date substitution.
    pub digest_file: String,
    /// Verifying key for the signed digest-list strategy. When unset the
    /// plain digest list is trusted as-is.
    pub key_path: Option<PathBuf>,
    /// `uid=` mount option value.
    pub uid: String,
    /// `gid=` mount option value.
    pub gid: String,
    /// `mode=` mount option value.
    pub mode: String,
    /// Extra mount options appended verbatim to the composed set.
    pub extra_mount_opts: Option<String>,
    /// Scratch directory for downloads; falls back to `SQFSSYNC_TMPDIR`,
    /// then `/tmp`.
    pub temp_dir: Option<PathBuf>,
}

impl RepositoryConfig {
    /// Creates a configuration with the stock option defaults.
    pub fn new(location: impl Into<PathBuf>, sync_uri: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            sync_uri: sync_uri.into(),
            image_file: DEFAULT_IMAGE_FILE.to_string(),
            verify: true,
            digest_file: DEFAULT_DIGEST_FILE.to_string(),
            key_path: None,
            uid: "portage".to_string(),
            gid: "portage".to_string(),
            mode: "0555".to_string(),
            extra_mount_opts: None,
            temp_dir: None,
        }
    }

    /// Resource names for this attempt. Date fields are substituted at call
    /// time, so descriptors must not be cached across attempts.
    pub fn descriptor(&self) -> SnapshotDescriptor {
        SnapshotDescriptor {
            image_file: substitute_date(&self.image_file),
            digest_file: substitute_date(&self.digest_file),
        }
    }

    /// Comma-joined mount option set.
    pub fn mount_options(&self) -> String {
        let mut opts = vec![
            format!("uid={}", self.uid),
            format!("gid={}", self.gid),
            format!("mode={}", self.mode),
        ];
        if let Some(extra) = &self.extra_mount_opts {
            opts.push(extra.clone());
        }
        opts.join(",")
    }

    /// Scratch directory downloads are written to.
    pub fn temp_dir(&self) -> PathBuf {
        match &self.temp_dir {
            Some(dir) => dir.clone(),
            None => env::var_os(TMPDIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp")),
        }
    }

    /// Final image path: `<location without trailing '/'>.sqfs`.
    pub fn image_path(&self) -> PathBuf {
        let location = self.location.to_string_lossy();
        PathBuf::from(format!("{}.sqfs", location.trim_end_matches('/')))
    }
}

/// Resource names derived for a single sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDescriptor {
    /// Remote image file name with dates substituted.
    pub image_file: String,
    /// Remote digest-list name with dates substituted.
    pub digest_file: String,
}

impl SnapshotDescriptor {
    /// Scratch path the image is downloaded to before staging.
    pub fn temp_path(&self, temp_dir: &Path) -> PathBuf {
        temp_dir.join(format!("{}.tmp", self.image_file))
    }
}

/// Expands strftime fields in a resource name against the current local
/// date. Names without `%` pass through untouched; an unparsable pattern is
/// used literally rather than failing the attempt.
fn substitute_date(name: &str) -> String {
    if !name.contains('%') {
        return name.to_string();
    }
    let items: Vec<Item<'_>> = StrftimeItems::new(name).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        warn!("Resource name {} has an invalid date pattern, using it as-is", name);
        return name.to_string();
    }
    Local::now().format_with_items(items.into_iter()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_path_strips_trailing_slash() {
        let config = RepositoryConfig::new("/var/db/repos/gentoo/", "https://mirror/");
        assert_eq!(
            config.image_path(),
            PathBuf::from("/var/db/repos/gentoo.sqfs")
        );

        let config = RepositoryConfig::new("/var/db/repos/gentoo", "https://mirror/");
        assert_eq!(
            config.image_path(),
            PathBuf::from("/var/db/repos/gentoo.sqfs")
        );
    }

    #[test]
    fn descriptor_substitutes_dates() {
        let mut config = RepositoryConfig::new("/repo", "https://mirror/");
        config.image_file = "gentoo-%Y%m%d.xz.sqfs".to_string();
        config.digest_file = "sha512sum-%Y%m%d.txt".to_string();

        let today = Local::now().format("%Y%m%d").to_string();
        let descriptor = config.descriptor();
        assert_eq!(descriptor.image_file, format!("gentoo-{}.xz.sqfs", today));
        assert_eq!(descriptor.digest_file, format!("sha512sum-{}.txt", today));
    }

    #[test]
    fn descriptor_leaves_plain_names_alone() {
        let config = RepositoryConfig::new("/repo", "https://mirror/");
        let descriptor = config.descriptor();
        assert_eq!(descriptor.image_file, DEFAULT_IMAGE_FILE);
        assert_eq!(descriptor.digest_file, DEFAULT_DIGEST_FILE);
    }

    #[test]
    fn invalid_date_pattern_is_used_literally() {
        assert_eq!(substitute_date("100%.sqfs"), "100%.sqfs");
    }

    #[test]
    fn mount_options_compose_with_extra() {
        let mut config = RepositoryConfig::new("/repo", "https://mirror/");
        assert_eq!(config.mount_options(), "uid=portage,gid=portage,mode=0555");

        config.extra_mount_opts = Some("ro,noatime".to_string());
        assert_eq!(
            config.mount_options(),
            "uid=portage,gid=portage,mode=0555,ro,noatime"
        );
    }

    #[test]
    fn temp_path_appends_tmp_suffix() {
        let config = RepositoryConfig::new("/repo", "https://mirror/");
        let descriptor = config.descriptor();
        assert_eq!(
            descriptor.temp_path(Path::new("/tmp")),
            PathBuf::from("/tmp/gentoo-current.xz.sqfs.tmp")
        );
    }

    #[test]
    fn temp_dir_prefers_explicit_override() {
        let mut config = RepositoryConfig::new("/repo", "https://mirror/");
        config.temp_dir = Some(PathBuf::from("/var/tmp/sqfs"));
        assert_eq!(config.temp_dir(), PathBuf::from("/var/tmp/sqfs"));
    }
}
