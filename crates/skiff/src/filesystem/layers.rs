//! Read-only image layers.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use flate2::read::GzDecoder;
use skiff_common::{SkiffError, SkiffPaths, SkiffResult};

/// Extract the image tarball into its per-image layer directory.
///
/// The extracted directory is shared by every container using the
/// image; an existence check makes re-preparation a no-op, so calling
/// this twice for the same image leaves the filesystem unchanged.
pub fn prepare_image_layer(paths: &SkiffPaths, image: &str) -> SkiffResult<PathBuf> {
    let layer_dir = paths.image_layer(image);
    if layer_dir.exists() {
        tracing::debug!(image, layer = %layer_dir.display(), "Image layer already extracted");
        return Ok(layer_dir);
    }

    let tar_path = paths.image_tar(image);
    if !tar_path.exists() {
        return Err(SkiffError::Config {
            message: format!("image tarball not found: {}", tar_path.display()),
        });
    }

    std::fs::create_dir_all(&layer_dir)?;
    if let Err(err) = extract(&tar_path, &layer_dir) {
        // A half-extracted directory must not pass the existence check
        // on the next run.
        let _ = std::fs::remove_dir_all(&layer_dir);
        return Err(err);
    }

    tracing::info!(image, layer = %layer_dir.display(), "Image layer extracted");
    Ok(layer_dir)
}

fn extract(tar_path: &std::path::Path, dest: &std::path::Path) -> SkiffResult<()> {
    let mut magic = [0u8; 2];
    let gzipped = {
        let mut probe = File::open(tar_path)?;
        probe.read_exact(&mut magic).is_ok() && magic == [0x1f, 0x8b]
    };

    let file = File::open(tar_path)?;
    if gzipped {
        tar::Archive::new(GzDecoder::new(file)).unpack(dest)?;
    } else {
        tar::Archive::new(file).unpack(dest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture_tar(paths: &SkiffPaths, image: &str) {
        std::fs::create_dir_all(paths.images()).unwrap();
        let file = File::create(paths.image_tar(image)).unwrap();
        let mut builder = tar::Builder::new(file);

        let data = b"hello from the image";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "etc/greeting", &data[..]).unwrap();
        builder.finish().unwrap();
    }

    #[test]
    fn extraction_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SkiffPaths::with_root(dir.path());
        write_fixture_tar(&paths, "busybox");

        let layer = prepare_image_layer(&paths, "busybox").unwrap();
        let greeting = layer.join("etc/greeting");
        assert!(greeting.exists());

        // Scribble into the layer, then re-prepare: the existing layer
        // must be left alone, not re-extracted.
        std::fs::write(layer.join("marker"), "kept").unwrap();
        let again = prepare_image_layer(&paths, "busybox").unwrap();
        assert_eq!(again, layer);
        assert!(layer.join("marker").exists());
    }

    #[test]
    fn missing_tarball_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SkiffPaths::with_root(dir.path());

        let err = prepare_image_layer(&paths, "ghost").unwrap_err();
        assert!(err.to_string().contains("image tarball not found"));
    }

    #[test]
    fn corrupt_tarball_leaves_no_layer_behind() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SkiffPaths::with_root(dir.path());
        std::fs::create_dir_all(paths.images()).unwrap();
        std::fs::write(paths.image_tar("bad"), b"this is not a tarball").unwrap();

        assert!(prepare_image_layer(&paths, "bad").is_err());
        assert!(!paths.image_layer("bad").exists());
    }
}
