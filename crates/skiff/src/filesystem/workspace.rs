//! Per-container workspace assembly and teardown.

use std::path::PathBuf;

use skiff_common::{SkiffPaths, SkiffResult};

use super::layers::prepare_image_layer;
use super::overlay::OverlayFs;
use super::volume::{mount_volume, unmount_volume};

/// Build a container's root filesystem and return the merged path.
///
/// Extracts the image layer (idempotent), creates the writable layer,
/// mounts the overlay, then binds the volume if one was requested.
pub fn prepare(
    paths: &SkiffPaths,
    volume: &str,
    container: &str,
    image: &str,
) -> SkiffResult<PathBuf> {
    prepare_image_layer(paths, image)?;

    let overlay = OverlayFs::for_container(paths, container, image);
    overlay.mount()?;

    if !volume.is_empty() {
        mount_volume(&overlay.merged_dir, volume)?;
    }

    Ok(overlay.merged_dir)
}

/// Tear a container's root filesystem back down.
///
/// The volume bind is unmounted before the merged view (a bind still
/// mounted underneath would make the merged unmount fail), then the
/// mount point and the container's writable layer are removed. Every
/// step is best-effort; the image layer is shared and left alone.
pub fn teardown(paths: &SkiffPaths, volume: &str, container: &str, image: &str) {
    let overlay = OverlayFs::for_container(paths, container, image);

    if !volume.is_empty() {
        unmount_volume(&overlay.merged_dir, volume);
    }

    if let Err(err) = overlay.unmount() {
        tracing::warn!(merged = %overlay.merged_dir.display(), %err, "Failed to unmount overlay");
    }
    if let Err(err) = std::fs::remove_dir_all(&overlay.merged_dir) {
        tracing::warn!(merged = %overlay.merged_dir.display(), %err, "Failed to remove mount point");
    }

    let container_dir = paths.container_overlay(container);
    if let Err(err) = std::fs::remove_dir_all(&container_dir) {
        tracing::warn!(dir = %container_dir.display(), %err, "Failed to remove writable layer");
    }

    tracing::debug!(container, "Workspace torn down");
}
