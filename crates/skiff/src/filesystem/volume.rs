//! Host-volume bind mounts.

use std::path::{Path, PathBuf};

use skiff_common::SkiffResult;

use super::overlay::bind_mount;

/// Parse a `hostPath:containerPath` volume spec. Returns `None` for
/// anything but exactly two non-empty segments.
#[must_use]
pub fn parse_volume_spec(spec: &str) -> Option<(String, String)> {
    let mut parts = spec.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(host), Some(container), None) if !host.is_empty() && !container.is_empty() => {
            Some((host.to_string(), container.to_string()))
        }
        _ => None,
    }
}

/// Bind-mount the host side of `spec` into the merged view.
///
/// A malformed spec is logged and skipped; the container still starts
/// without the volume. The host directory is created when absent.
pub fn mount_volume(merged: &Path, spec: &str) -> SkiffResult<()> {
    let Some((host, container)) = parse_volume_spec(spec) else {
        tracing::error!(spec, "Volume spec is not hostPath:containerPath, skipping");
        return Ok(());
    };

    let host_path = PathBuf::from(&host);
    if !host_path.exists() {
        std::fs::create_dir_all(&host_path)?;
    }

    let target = merged.join(container.trim_start_matches('/'));
    std::fs::create_dir_all(&target)?;

    bind_mount(&host_path, &target)?;
    tracing::info!(host = %host, container = %container, "Volume mounted");
    Ok(())
}

/// Unmount the volume of `spec` from the merged view.
///
/// Must run before the merged view itself is unmounted; failures are
/// logged and teardown continues.
pub fn unmount_volume(merged: &Path, spec: &str) {
    let Some((_, container)) = parse_volume_spec(spec) else {
        return;
    };

    let target = merged.join(container.trim_start_matches('/'));
    if let Err(err) = rustix::mount::unmount(&target, rustix::mount::UnmountFlags::DETACH) {
        tracing::warn!(target = %target.display(), %err, "Failed to unmount volume");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_nonempty_segments_parse() {
        assert_eq!(
            parse_volume_spec("/host/data:/container/data"),
            Some(("/host/data".to_string(), "/container/data".to_string()))
        );
    }

    #[test]
    fn malformed_specs_are_rejected() {
        assert_eq!(parse_volume_spec("/host/data"), None);
        assert_eq!(parse_volume_spec("/host/data:"), None);
        assert_eq!(parse_volume_spec(":/container/data"), None);
        assert_eq!(parse_volume_spec("/a:/b:/c"), None);
        assert_eq!(parse_volume_spec(""), None);
    }

    #[test]
    fn malformed_spec_does_not_abort_launch() {
        let dir = tempfile::tempdir().unwrap();
        // Skipping the volume is not an error.
        assert!(mount_volume(dir.path(), "/host-only").is_ok());
    }
}
