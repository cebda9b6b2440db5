//! The layered container root filesystem.
//!
//! A container's root is assembled from a shared read-only image layer
//! (extracted once per image), a per-container writable layer, and an
//! overlayfs mount presenting the two as one tree, with optional host
//! volumes bind-mounted on top.

mod layers;
mod overlay;
mod volume;
mod workspace;

pub use layers::prepare_image_layer;
pub use overlay::OverlayFs;
pub use volume::{mount_volume, parse_volume_spec, unmount_volume};
pub use workspace::{prepare, teardown};
