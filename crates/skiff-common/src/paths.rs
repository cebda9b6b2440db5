//! Standard filesystem paths for skiff.

use std::path::PathBuf;

use once_cell::sync::Lazy;

/// Default root directory for skiff data.
pub static SKIFF_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("SKIFF_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/lib/skiff"))
});

/// Default runtime directory for container records.
pub static SKIFF_RUNTIME_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("SKIFF_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/run/skiff"))
});

/// Standard paths used by the skiff runtime.
#[derive(Debug, Clone)]
pub struct SkiffPaths {
    /// Root data directory (default: /var/lib/skiff).
    pub root: PathBuf,
    /// Runtime directory for per-container records (default: /var/run/skiff).
    pub runtime: PathBuf,
}

impl SkiffPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom root directory.
    ///
    /// The runtime directory is placed under the root, which keeps tests
    /// self-contained.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let runtime = root.join("run");
        Self { root, runtime }
    }

    /// Directory holding image tarballs and extracted layers.
    #[must_use]
    pub fn images(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Tarball for a named image.
    #[must_use]
    pub fn image_tar(&self, image: &str) -> PathBuf {
        self.images().join(format!("{image}.tar"))
    }

    /// Extracted read-only layer for a named image.
    #[must_use]
    pub fn image_layer(&self, image: &str) -> PathBuf {
        self.images().join(image)
    }

    /// Overlay storage for a container.
    #[must_use]
    pub fn container_overlay(&self, container: &str) -> PathBuf {
        self.root.join("overlay").join(container)
    }

    /// Writable upper directory for a container.
    #[must_use]
    pub fn container_upper(&self, container: &str) -> PathBuf {
        self.container_overlay(container).join("upper")
    }

    /// Overlayfs work directory for a container.
    #[must_use]
    pub fn container_work(&self, container: &str) -> PathBuf {
        self.container_overlay(container).join("work")
    }

    /// Merged overlayfs mount point for a container.
    #[must_use]
    pub fn container_merged(&self, container: &str) -> PathBuf {
        self.container_overlay(container).join("merged")
    }

    /// Directory holding one JSON file per defined network.
    #[must_use]
    pub fn networks(&self) -> PathBuf {
        self.root.join("network").join("networks")
    }

    /// The IPAM subnet-allocation file.
    #[must_use]
    pub fn ipam_file(&self) -> PathBuf {
        self.root.join("network").join("ipam").join("subnet.json")
    }

    /// Runtime directory for a container's record and log.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.runtime.join(name)
    }

    /// Persisted container record.
    #[must_use]
    pub fn container_record(&self, name: &str) -> PathBuf {
        self.container_dir(name).join("config.json")
    }

    /// Container log file (stdout of detached containers).
    #[must_use]
    pub fn container_log(&self, name: &str) -> PathBuf {
        self.container_dir(name).join("container.log")
    }

    /// Create the base directories.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn create_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.runtime)?;
        std::fs::create_dir_all(self.images())?;
        std::fs::create_dir_all(self.networks())?;
        Ok(())
    }
}

impl Default for SkiffPaths {
    fn default() -> Self {
        Self {
            root: SKIFF_ROOT.clone(),
            runtime: SKIFF_RUNTIME_DIR.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_root() {
        let paths = SkiffPaths::with_root("/tmp/skiff-test");
        assert_eq!(
            paths.image_layer("busybox"),
            PathBuf::from("/tmp/skiff-test/images/busybox")
        );
        assert_eq!(
            paths.container_merged("c1"),
            PathBuf::from("/tmp/skiff-test/overlay/c1/merged")
        );
        assert_eq!(paths.runtime, PathBuf::from("/tmp/skiff-test/run"));
    }

    #[test]
    fn record_paths() {
        let paths = SkiffPaths::with_root("/tmp/skiff-test");
        assert_eq!(
            paths.container_record("web"),
            PathBuf::from("/tmp/skiff-test/run/web/config.json")
        );
        assert_eq!(
            paths.container_log("web"),
            PathBuf::from("/tmp/skiff-test/run/web/container.log")
        );
    }
}
