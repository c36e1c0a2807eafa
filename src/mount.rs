//! Mount-table queries and squashfs mount/unmount control.

use std::path::Path;
use std::process::Command;
use tracing::error;

const MOUNT_TABLE: &str = "/proc/self/mounts";
const FSTYPE: &str = "squashfs";

/// Mount control boundary.
///
/// The system implementation talks to the OS; tests substitute scripted
/// doubles. Mount and unmount log their cause and report failure as a
/// boolean; nothing propagates past this boundary.
pub trait Mounter {
    /// Whether `path` is currently a mount point. Queried fresh from the
    /// OS on every call, never cached.
    fn is_mounted(&self, path: &Path) -> bool;

    /// Mounts `source` on `target` as squashfs with the given option
    /// string. Returns `false` on failure.
    fn mount(&self, source: &Path, target: &Path, options: &str) -> bool;

    /// Unmounts `target`. Returns `false` on failure.
    fn unmount(&self, target: &Path) -> bool;
}

/// Talks to the real mount table via `/proc/self/mounts` and the mount(8)
/// and umount(8) tools. mount(8) sets up the loop device for image files
/// itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn is_mounted(&self, path: &Path) -> bool {
        match std::fs::read_to_string(MOUNT_TABLE) {
            Ok(table) => mount_table_contains(&table, path),
            Err(err) => {
                error!("Could not read {}: {}", MOUNT_TABLE, err);
                false
            }
        }
    }

    fn mount(&self, source: &Path, target: &Path, options: &str) -> bool {
        let result = Command::new("mount")
            .arg("-t")
            .arg(FSTYPE)
            .arg("-o")
            .arg(options)
            .arg(source)
            .arg(target)
            .output();
        match result {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                error!(
                    "Failed to mount {}: {}",
                    source.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(err) => {
                error!("Failed to mount {}: {}", source.display(), err);
                false
            }
        }
    }

    fn unmount(&self, target: &Path) -> bool {
        let result = Command::new("umount").arg(target).output();
        match result {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                error!(
                    "Failed to unmount {}: {}",
                    target.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(err) => {
                error!("Failed to unmount {}: {}", target.display(), err);
                false
            }
        }
    }
}

/// Scans mount-table text for `path` appearing as a mount point.
fn mount_table_contains(table: &str, path: &Path) -> bool {
    let wanted = path.to_string_lossy();
    let wanted = normalize(&wanted);
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|mount_point| normalize(&unescape_mount_path(mount_point)) == wanted)
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Decodes the octal escapes (`\040` for space etc.) procfs uses in
/// mount-point fields, per proc(5).
fn unescape_mount_path(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            if let Some(Ok(value)) = raw
                .get(i + 1..i + 4)
                .map(|octal| u8::from_str_radix(octal, 8))
            {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
