//! The ordered image-replacement sequence.

use crate::download::StagedFile;
use crate::error::UpdateError;
use crate::mount::Mounter;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Installs a staged image at `image_path` and mounts it on `mount_point`.
///
/// Steps run in strict order and stop at the first failure:
///
/// 1. move the staged file to `<image_path>.new`
/// 2. unmount `mount_point` if it is mounted
/// 3. remove the previous image file if present
/// 4. rename `<image_path>.new` to `image_path`
/// 5. mount `image_path` on `mount_point`
///
/// The sequence is not transactional and nothing already committed is
/// rolled back; a later attempt heals a partial run by re-observing mount
/// and file state instead of trusting any progress marker.
pub fn install_image<M: Mounter>(
    staged: StagedFile,
    image_path: &Path,
    mount_point: &Path,
    mount_opts: &str,
    mounter: &M,
) -> Result<(), UpdateError> {
    let new_path = new_image_path(image_path);
    info!("Replacing old SquashFS with new one...");

    let tmp_path = staged.into_path();
    move_file(&tmp_path, &new_path).map_err(|source| UpdateError::Stage {
        from: tmp_path.clone(),
        to: new_path.clone(),
        source,
    })?;

    if mounter.is_mounted(mount_point) && !mounter.unmount(mount_point) {
        return Err(UpdateError::Unmount(mount_point.to_path_buf()));
    }

    if image_path.exists() {
        std::fs::remove_file(image_path).map_err(|source| UpdateError::RemoveOld {
            path: image_path.to_path_buf(),
            source,
        })?;
    }

    std::fs::rename(&new_path, image_path).map_err(|source| UpdateError::Rename {
        from: new_path.clone(),
        to: image_path.to_path_buf(),
        source,
    })?;

    if !mounter.mount(image_path, mount_point, mount_opts) {
        return Err(UpdateError::Mount(image_path.to_path_buf()));
    }
    Ok(())
}

fn new_image_path(image_path: &Path) -> PathBuf {
    let mut path = image_path.as_os_str().to_os_string();
    path.push(".new");
    PathBuf::from(path)
}

/// Rename with a copy-and-remove fallback for scratch directories on a
/// different filesystem than the destination.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::PathBuf;

    /// Scripted mount double; failures are injected per call kind.
    struct FakeMounter {
        mounted: Cell<bool>,
        fail_unmount: bool,
        fail_mount: bool,
    }

    impl FakeMounter {
        fn new(mounted: bool) -> Self {
            Self {
                mounted: Cell::new(mounted),
                fail_unmount: false,
                fail_mount: false,
            }
        }
    }

    impl Mounter for FakeMounter {
        fn is_mounted(&self, _path: &Path) -> bool {
            self.mounted.get()
        }

        fn mount(&self, _source: &Path, _target: &Path, _options: &str) -> bool {
            if self.fail_mount {
                return false;
            }
            self.mounted.set(true);
            true
        }

        fn unmount(&self, _target: &Path) -> bool {
            if self.fail_unmount {
                return false;
            }
            self.mounted.set(false);
            true
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        image_path: PathBuf,
        mount_point: PathBuf,
        staged: StagedFile,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mount_point = dir.path().join("gentoo");
        std::fs::create_dir(&mount_point).unwrap();
        let image_path = dir.path().join("gentoo.sqfs");

        let tmp_path = dir.path().join("gentoo-current.xz.sqfs.tmp");
        std::fs::write(&tmp_path, b"new image").unwrap();

        Fixture {
            _dir: dir,
            image_path,
            mount_point,
            staged: StagedFile::new(tmp_path),
        }
    }

    #[test]
    fn replaces_old_image_and_remounts() {
        let f = fixture();
        std::fs::write(&f.image_path, b"old image").unwrap();
        let mounter = FakeMounter::new(true);

        install_image(f.staged, &f.image_path, &f.mount_point, "ro", &mounter).unwrap();

        assert_eq!(std::fs::read(&f.image_path).unwrap(), b"new image");
        assert!(!new_image_path(&f.image_path).exists());
        assert!(mounter.mounted.get());
    }

    #[test]
    fn unstageable_file_is_code_2() {
        let f = fixture();
        let missing = StagedFile::new(f._dir.path().join("no-such-file.tmp"));
        let mounter = FakeMounter::new(false);

        let err =
            install_image(missing, &f.image_path, &f.mount_point, "ro", &mounter).unwrap_err();
        assert_eq!(err.code(), 2);
        assert!(!f.image_path.exists());
    }

    #[test]
    fn unmount_failure_is_code_3_and_touches_nothing() {
        let f = fixture();
        std::fs::write(&f.image_path, b"old image").unwrap();
        let mut mounter = FakeMounter::new(true);
        mounter.fail_unmount = true;

        let err =
            install_image(f.staged, &f.image_path, &f.mount_point, "ro", &mounter).unwrap_err();
        assert_eq!(err.code(), 3);
        // The old image was neither removed nor replaced.
        assert_eq!(std::fs::read(&f.image_path).unwrap(), b"old image");
        assert!(new_image_path(&f.image_path).exists());
        assert!(mounter.mounted.get());
    }

    #[test]
    fn unremovable_old_image_is_code_4() {
        let f = fixture();
        // remove_file cannot remove a non-empty directory, even as root.
        std::fs::create_dir(&f.image_path).unwrap();
        std::fs::write(f.image_path.join("keep"), b"x").unwrap();
        let mounter = FakeMounter::new(false);

        let err =
            install_image(f.staged, &f.image_path, &f.mount_point, "ro", &mounter).unwrap_err();
        assert_eq!(err.code(), 4);
        assert!(new_image_path(&f.image_path).exists());
    }

    #[test]
    fn mount_failure_is_code_6_with_image_in_place() {
        let f = fixture();
        let mut mounter = FakeMounter::new(false);
        mounter.fail_mount = true;

        let err =
            install_image(f.staged, &f.image_path, &f.mount_point, "ro", &mounter).unwrap_err();
        assert_eq!(err.code(), 6);
        // Rename already happened; only the final mount failed.
        assert_eq!(std::fs::read(&f.image_path).unwrap(), b"new image");
        assert!(!mounter.mounted.get());
    }

    #[test]
    fn skips_unmount_and_remove_when_nothing_is_there() {
        let f = fixture();
        let mounter = FakeMounter::new(false);

        install_image(f.staged, &f.image_path, &f.mount_point, "ro", &mounter).unwrap();
        assert_eq!(std::fs::read(&f.image_path).unwrap(), b"new image");
        assert!(mounter.mounted.get());
    }
}
