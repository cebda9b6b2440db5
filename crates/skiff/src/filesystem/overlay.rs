//! OverlayFS union mounts.

use std::ffi::CString;
use std::path::{Path, PathBuf};

use skiff_common::{SkiffError, SkiffPaths, SkiffResult};

/// One container's overlay mount: a read-only image layer underneath a
/// writable layer, merged at a per-container mount point.
#[derive(Debug, Clone)]
pub struct OverlayFs {
    /// Read-only image layer.
    pub lower_dir: PathBuf,
    /// Writable layer.
    pub upper_dir: PathBuf,
    /// Scratch directory required by overlayfs.
    pub work_dir: PathBuf,
    /// Merged mount point; becomes the container's root.
    pub merged_dir: PathBuf,
}

impl OverlayFs {
    /// Overlay layout for a container over an image layer.
    #[must_use]
    pub fn for_container(paths: &SkiffPaths, container: &str, image: &str) -> Self {
        Self {
            lower_dir: paths.image_layer(image),
            upper_dir: paths.container_upper(container),
            work_dir: paths.container_work(container),
            merged_dir: paths.container_merged(container),
        }
    }

    /// Create the writable-layer and mount-point directories.
    pub fn create_dirs(&self) -> SkiffResult<()> {
        std::fs::create_dir_all(&self.upper_dir)?;
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(&self.merged_dir)?;
        Ok(())
    }

    /// Mount the overlay filesystem at the merged path.
    pub fn mount(&self) -> SkiffResult<()> {
        use rustix::mount::{mount, MountFlags};

        self.create_dirs()?;

        let options = self.mount_options();
        tracing::debug!(
            merged = %self.merged_dir.display(),
            options = %options,
            "Mounting overlayfs"
        );

        let fstype = CString::new("overlay").unwrap();
        let options_c = CString::new(options.as_str()).map_err(|_| SkiffError::Config {
            message: "invalid overlay options (contains null byte)".to_string(),
        })?;

        mount(
            "overlay",
            &self.merged_dir,
            fstype.as_c_str(),
            MountFlags::empty(),
            options_c.as_c_str(),
        )
        .map_err(|e| SkiffError::Io(e.into()))?;

        Ok(())
    }

    /// Unmount the merged view.
    pub fn unmount(&self) -> SkiffResult<()> {
        use rustix::mount::{unmount, UnmountFlags};

        tracing::debug!(merged = %self.merged_dir.display(), "Unmounting overlayfs");

        unmount(&self.merged_dir, UnmountFlags::DETACH).map_err(|e| SkiffError::Io(e.into()))?;
        Ok(())
    }

    /// The overlayfs mount-option string.
    #[must_use]
    pub fn mount_options(&self) -> String {
        format!(
            "lowerdir={},upperdir={},workdir={}",
            self.lower_dir.display(),
            self.upper_dir.display(),
            self.work_dir.display()
        )
    }
}

/// Bind-mount `source` onto `target`.
pub(crate) fn bind_mount(source: &Path, target: &Path) -> SkiffResult<()> {
    rustix::mount::mount_bind(source, target).map_err(|e| SkiffError::Io(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_mount_options() {
        let paths = SkiffPaths::with_root("/tmp/skiff-test");
        let overlay = OverlayFs::for_container(&paths, "c1", "busybox");

        let options = overlay.mount_options();
        assert_eq!(
            options,
            "lowerdir=/tmp/skiff-test/images/busybox,\
             upperdir=/tmp/skiff-test/overlay/c1/upper,\
             workdir=/tmp/skiff-test/overlay/c1/work"
        );
    }
}
